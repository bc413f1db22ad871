//! The polling loop.
//!
//! The scheduler owns every repository's cursor. It visits repositories one
//! at a time in configuration order, sleeping `interval / N` between visits,
//! until its cancellation token fires. A visit reconciles the repository's
//! issue events, persists the new cursor, and forwards each new rename to
//! the repository's `issues` subscribers.
//!
//! The cursor is written before any webhook is sent. A crash between the
//! two loses those deliveries rather than repeating them on restart.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::poll::PollConfig;
use super::reconcile::{CandidateEvent, Reconciliation, reconcile};
use crate::config::Config;
use crate::github::GitHubApi;
use crate::persistence::{Cursor, CursorStore};
use crate::types::RepoId;
use crate::webhooks::{
    DispatchTarget, ISSUES_EVENT, OutboundWebhook, WebhookDispatcher, repository_metadata,
    resolve_targets, synthesize,
};

/// Drives reconciliation for every configured repository.
///
/// `clients` maps each repository owner to the API client holding that
/// account's credentials.
pub struct Scheduler<A> {
    config: Arc<Config>,
    clients: HashMap<String, A>,
    repos: Vec<RepoId>,
    cursors: HashMap<RepoId, Cursor>,
    store: CursorStore,
    dispatcher: WebhookDispatcher,
    poll: PollConfig,
}

impl<A: GitHubApi + 'static> Scheduler<A> {
    /// Creates a scheduler, restoring each repository's cursor from `store`.
    pub fn new(
        config: Arc<Config>,
        clients: HashMap<String, A>,
        store: CursorStore,
        dispatcher: WebhookDispatcher,
        poll: PollConfig,
    ) -> Self {
        let repos = config.repositories();
        let cursors = repos
            .iter()
            .map(|repo| (repo.clone(), store.load(repo)))
            .collect();

        Scheduler {
            config,
            clients,
            repos,
            cursors,
            store,
            dispatcher,
            poll,
        }
    }

    /// Returns the in-memory cursor for `repo`.
    pub fn cursor(&self, repo: &RepoId) -> Option<&Cursor> {
        self.cursors.get(repo)
    }

    /// Runs the loop on a new task.
    ///
    /// The returned handle resolves once the loop has observed `shutdown`
    /// and exited; no cursor is written after that point.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Runs the loop until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let delay = self.poll.visit_delay(self.repos.len());
        info!(
            repos = self.repos.len(),
            interval = ?self.poll.poll_interval,
            "Poller started"
        );

        let repos = self.repos.clone();
        'outer: loop {
            if repos.is_empty() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => continue,
                }
            }

            for repo in &repos {
                if shutdown.is_cancelled() {
                    break 'outer;
                }

                self.visit(repo).await;

                tokio::select! {
                    _ = shutdown.cancelled() => break 'outer,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        info!("Poller stopped");
    }

    /// Reconciles one repository and forwards any new renames.
    ///
    /// Errors are logged; the cursor only moves when reconciliation succeeds.
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn visit(&mut self, repo: &RepoId) {
        let Some(api) = self.clients.get(&repo.owner) else {
            warn!("No GitHub client for repository owner");
            return;
        };
        let previous = self.cursors.get(repo).cloned().unwrap_or_default();

        let (cursor, events) = match reconcile(api, repo, &previous).await {
            Ok(Reconciliation::Unchanged) => return,
            Ok(Reconciliation::Updated {
                cursor,
                events,
                pages,
            }) => {
                debug!(pages, renames = events.len(), marker = %cursor.marker, "Issue events scanned");
                (cursor, events)
            }
            Err(e) => {
                warn!(error = %e, "Reconciliation failed, keeping cursor");
                return;
            }
        };

        if cursor != previous {
            if let Err(e) = self.store.save(repo, &cursor) {
                warn!(error = %e, "Failed to persist cursor");
            }
            self.cursors.insert(repo.clone(), cursor);
        }

        if events.is_empty() {
            return;
        }

        let targets = resolve_targets(&self.config, repo, ISSUES_EVENT);
        if targets.is_empty() {
            debug!(renames = events.len(), "No subscribers for issues events");
            return;
        }

        for event in &events {
            forward_rename(api, &self.dispatcher, repo, event, &targets).await;
        }
    }
}

async fn forward_rename<A: GitHubApi>(
    api: &A,
    dispatcher: &WebhookDispatcher,
    repo: &RepoId,
    event: &CandidateEvent,
    targets: &[DispatchTarget],
) {
    let repository = repository_metadata(api, repo).await;
    let body = match synthesize(event, &repository) {
        Ok(body) => body,
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "Failed to build rename payload");
            return;
        }
    };

    let webhook = OutboundWebhook::synthesized(ISSUES_EVENT, body);
    let delivered = dispatcher.dispatch_all(targets, &webhook).await;
    info!(
        event_id = %event.id,
        delivery_id = %webhook.delivery_id,
        delivered,
        targets = targets.len(),
        "Forwarded issue rename"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeGitHub, events_body};
    use crate::types::EventId;
    use crate::webhooks::{SIGNATURE_HEADER, sign_payload};
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> RepoId {
        RepoId::new("octocat", "hello-world")
    }

    fn config_for(url: &str) -> Arc<Config> {
        let json = format!(
            r#"[{{"user":"octocat","token":"t","hooks":[
                {{"repo":"hello-world","events":["issues"],"url":"{url}","secret":"s3cret"}},
                {{"repo":"hello-world","events":["push"],"url":"{url}/push-only"}}
            ]}}]"#
        );
        Arc::new(Config::from_json(&json).unwrap())
    }

    fn scheduler(
        config: Arc<Config>,
        fake: &FakeGitHub,
        store: CursorStore,
        interval: Duration,
    ) -> Scheduler<FakeGitHub> {
        let clients = HashMap::from([("octocat".to_string(), fake.clone())]);
        Scheduler::new(
            config,
            clients,
            store,
            WebhookDispatcher::new(Duration::from_secs(5)).unwrap(),
            PollConfig::with_interval(interval),
        )
    }

    async fn hook_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("x-github-event", "issues"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn rename_is_forwarded_once() {
        let server = hook_server().await;
        let dir = tempdir().unwrap();
        let fake = FakeGitHub::new()
            .with_etag("\"v1\"")
            .with_repository(r#"{"id":1,"name":"hello-world","node_id":"x"}"#)
            .with_pages(vec![events_body(&[(12, "renamed"), (11, "closed")])]);
        let mut scheduler = scheduler(
            config_for(&format!("{}/hook", server.uri())),
            &fake,
            CursorStore::new(dir.path()),
            Duration::from_secs(5),
        );

        scheduler.visit(&repo()).await;
        scheduler.visit(&repo()).await;

        // The second visit was answered 304.
        assert_eq!(
            fake.fetches(),
            vec![(1, None), (1, Some("\"v1\"".to_string()))]
        );

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);

        let request = &requests[0];
        let signature = request.headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
        assert_eq!(signature, sign_payload(&request.body, b"s3cret"));

        let payload: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(payload["action"], "updated");
        assert_eq!(payload["issue"]["number"], 12);
        assert_eq!(payload["sender"]["login"], "octocat");
        assert_eq!(payload["repository"], serde_json::json!({"id":1,"name":"hello-world"}));
    }

    #[tokio::test]
    async fn changed_validator_without_new_events_does_not_reemit() {
        let server = hook_server().await;
        let dir = tempdir().unwrap();
        let fake = FakeGitHub::new()
            .with_etag("\"v1\"")
            .with_pages(vec![events_body(&[(12, "renamed")])]);
        let mut scheduler = scheduler(
            config_for(&format!("{}/hook", server.uri())),
            &fake,
            CursorStore::new(dir.path()),
            Duration::from_secs(5),
        );

        scheduler.visit(&repo()).await;
        fake.set_etag("\"v2\"");
        scheduler.visit(&repo()).await;

        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert_eq!(scheduler.cursor(&repo()), Some(&Cursor::new("\"v2\"", 12)));
    }

    #[tokio::test]
    async fn cursor_is_persisted_and_restored() {
        let server = hook_server().await;
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path());
        let config = config_for(&format!("{}/hook", server.uri()));
        let fake = FakeGitHub::new()
            .with_etag("\"v1\"")
            .with_pages(vec![events_body(&[(40, "renamed")])]);

        let mut first = scheduler(config.clone(), &fake, store.clone(), Duration::from_secs(5));
        first.visit(&repo()).await;
        drop(first);

        assert_eq!(store.load(&repo()), Cursor::new("\"v1\"", 40));

        // A restarted scheduler resumes from the stored cursor.
        let mut second = scheduler(config, &fake, store, Duration::from_secs(5));
        second.visit(&repo()).await;

        assert_eq!(fake.fetches().last(), Some(&(1, Some("\"v1\"".to_string()))));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_reconciliation_keeps_cursor() {
        let server = hook_server().await;
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path());
        store.save(&repo(), &Cursor::new("\"v0\"", 5)).unwrap();
        let fake = FakeGitHub::new().failing_on_page(1);
        let mut scheduler = scheduler(
            config_for(&format!("{}/hook", server.uri())),
            &fake,
            store.clone(),
            Duration::from_secs(5),
        );

        scheduler.visit(&repo()).await;

        assert_eq!(scheduler.cursor(&repo()), Some(&Cursor::new("\"v0\"", 5)));
        assert_eq!(store.load(&repo()), Cursor::new("\"v0\"", 5));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_cursor_save_still_advances_in_memory_cursor() {
        let server = hook_server().await;
        let dir = tempdir().unwrap();
        // A plain file where the owner directory belongs makes every save fail.
        std::fs::write(dir.path().join("octocat"), "").unwrap();
        let store = CursorStore::new(dir.path());
        let fake = FakeGitHub::new()
            .with_etag("\"v1\"")
            .with_pages(vec![events_body(&[(12, "renamed")])]);
        let mut scheduler = scheduler(
            config_for(&format!("{}/hook", server.uri())),
            &fake,
            store.clone(),
            Duration::from_secs(5),
        );

        scheduler.visit(&repo()).await;
        assert!(store.save(&repo(), &Cursor::new("\"v1\"", 12)).is_err());
        scheduler.visit(&repo()).await;

        assert_eq!(scheduler.cursor(&repo()), Some(&Cursor::new("\"v1\"", 12)));
        assert_eq!(
            fake.fetches(),
            vec![(1, None), (1, Some("\"v1\"".to_string()))]
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_does_not_block_cursor() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path());
        let fake = FakeGitHub::new()
            .with_etag("\"v1\"")
            .with_pages(vec![events_body(&[(3, "renamed")])]);
        let mut scheduler = scheduler(
            config_for("http://127.0.0.1:9/hook"),
            &fake,
            store.clone(),
            Duration::from_secs(5),
        );

        scheduler.visit(&repo()).await;

        assert_eq!(store.load(&repo()).marker, EventId(3));
    }

    #[tokio::test]
    async fn run_polls_until_cancelled() {
        let server = hook_server().await;
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path());
        let fake = FakeGitHub::new()
            .with_etag("\"v1\"")
            .with_pages(vec![events_body(&[(8, "renamed")])]);
        let scheduler = scheduler(
            config_for(&format!("{}/hook", server.uri())),
            &fake,
            store.clone(),
            Duration::from_millis(20),
        );

        let shutdown = CancellationToken::new();
        let handle = scheduler.spawn(shutdown.clone());

        tokio::time::timeout(Duration::from_secs(5), async {
            while fake.fetches().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("poller should keep visiting");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller should stop promptly")
            .unwrap();

        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert_eq!(store.load(&repo()), Cursor::new("\"v1\"", 8));
    }

    #[tokio::test]
    async fn cancellation_interrupts_long_sleep() {
        let dir = tempdir().unwrap();
        let fake = FakeGitHub::new().with_pages(vec!["[]".to_string()]);
        let scheduler = scheduler(
            config_for("http://127.0.0.1:9/hook"),
            &fake,
            CursorStore::new(dir.path()),
            Duration::from_secs(3600),
        );

        let shutdown = CancellationToken::new();
        let handle = scheduler.spawn(shutdown.clone());

        tokio::time::timeout(Duration::from_secs(5), async {
            while fake.fetches().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancellation should interrupt the inter-visit sleep")
            .unwrap();

        let fetches = fake.fetches().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fake.fetches().len(), fetches);
    }

    #[tokio::test]
    async fn no_repositories_idles_until_cancelled() {
        let dir = tempdir().unwrap();
        let fake = FakeGitHub::new();
        let scheduler = scheduler(
            Arc::new(Config::default()),
            &fake,
            CursorStore::new(dir.path()),
            Duration::from_millis(10),
        );

        let shutdown = CancellationToken::new();
        let handle = scheduler.spawn(shutdown.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(fake.fetches().is_empty());
    }

    #[tokio::test]
    async fn repository_without_client_is_skipped() {
        let dir = tempdir().unwrap();
        let fake = FakeGitHub::new();
        let mut scheduler = Scheduler::new(
            config_for("http://127.0.0.1:9/hook"),
            HashMap::<String, FakeGitHub>::new(),
            CursorStore::new(dir.path()),
            WebhookDispatcher::new(Duration::from_secs(1)).unwrap(),
            PollConfig::new(),
        );

        scheduler.visit(&repo()).await;

        assert!(fake.fetches().is_empty());
        assert_eq!(scheduler.cursor(&repo()), Some(&Cursor::default()));
    }
}
