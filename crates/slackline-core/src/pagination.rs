//! Cursor-based pagination for Slack list endpoints.

use std::future::Future;

use tracing::debug;

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next call; empty means this was the last page.
    pub next_cursor: String,
}

/// Drive `fetch` from the empty cursor until a page returns the empty
/// cursor, concatenating items in page order.
///
/// There is no page limit: a server that never returns an empty cursor
/// keeps this looping, exactly as the list API's contract implies.
pub async fn list_all<T, E, F, Fut>(mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut items = Vec::new();
    let mut cursor = String::new();

    loop {
        debug!("Fetching page with cursor {:?}", cursor);
        let page = fetch(cursor).await?;
        let fetched = page.items.len();
        items.extend(page.items);
        debug!("Fetched {} items (total so far {})", fetched, items.len());

        if page.next_cursor.is_empty() {
            break;
        }
        cursor = page.next_cursor;
    }

    Ok(items)
}
