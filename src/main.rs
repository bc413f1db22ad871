use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hooksim::cli::Cli;
use hooksim::config::Config;
use hooksim::github::OctocrabClient;
use hooksim::persistence::CursorStore;
use hooksim::poller::{PollConfig, Scheduler};
use hooksim::server::{AppState, build_router};
use hooksim::webhooks::WebhookDispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let config = Arc::new(config);

    let mut clients = HashMap::new();
    for account in &config.accounts {
        let client = OctocrabClient::from_token(account.token.clone(), &cli.api_base)
            .with_context(|| format!("failed to create GitHub client for {}", account.user))?;
        clients.insert(account.user.clone(), client);
    }

    let dispatcher = WebhookDispatcher::new(cli.dispatch_timeout())
        .context("failed to create webhook dispatcher")?;

    let shutdown = CancellationToken::new();

    let scheduler = Scheduler::new(
        config.clone(),
        clients,
        CursorStore::new(&cli.data_dir),
        dispatcher.clone(),
        PollConfig::with_interval(cli.poll_interval()),
    );
    let poller = scheduler.spawn(shutdown.clone());

    let app = build_router(AppState::new(config, dispatcher));
    let addr = cli.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_shutdown.cancelled_owned())
            .await
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
        result = &mut server => {
            warn!(?result, "Server exited unexpectedly");
        }
    }
    shutdown.cancel();

    if !server.is_finished() {
        match tokio::time::timeout(cli.shutdown_grace(), &mut server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "Server error during shutdown"),
            Ok(Err(e)) => warn!(error = %e, "Server task failed"),
            Err(_) => {
                warn!("In-flight requests did not finish in time, aborting server");
                server.abort();
            }
        }
    }

    poller.await.context("poller task failed")?;
    info!("Stopped");
    Ok(())
}
