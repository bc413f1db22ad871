//! Pagination via the `Link` response header.
//!
//! GitHub paginates list endpoints and advertises the other pages in a
//! header such as:
//!
//! ```text
//! <https://api.github.com/repositories/1/issues/events?page=2>; rel="next",
//! <https://api.github.com/repositories/1/issues/events?page=9>; rel="last"
//! ```
//!
//! Only the last page number is needed: the reconciler walks pages in order
//! until it finds an event it has already seen or runs out of pages.

/// Extracts the final page number from a `Link` header.
///
/// Uses the `rel="last"` entry, falling back to the last comma-separated
/// entry. Returns `None` for malformed headers. Never panics.
pub fn last_page(link: &str) -> Option<u32> {
    let entries: Vec<&str> = link.split(',').collect();
    let entry = entries
        .iter()
        .find(|entry| entry.contains("rel=\"last\""))
        .or_else(|| entries.last())?;

    let target = entry.split(';').next()?.trim();
    let url = target.strip_prefix('<')?.strip_suffix('>')?;
    page_param(url)
}

/// Reads the `page` query parameter of a URL.
fn page_param(url: &str) -> Option<u32> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next()?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
}
