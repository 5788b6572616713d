//! Paged Collector
//!
//! Drains a paginated remote listing into a single ordered `Vec`.

use super::error::SyncError;
use super::index::index_by;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

/// Page size used when the configuration does not set one
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Cursor for one page of a listing. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub page_number: usize,
    pub page_size: usize,
}

impl PageOptions {
    /// Cursor for the first page
    pub fn first(page_size: usize) -> Self {
        Self {
            page_number: 1,
            page_size: page_size.max(1),
        }
    }

    /// Cursor for the page after this one
    pub fn next(self) -> Self {
        Self {
            page_number: self.page_number + 1,
            ..self
        }
    }
}

impl Default for PageOptions {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of items advertised by the server, if it sent one
    pub total_count: Option<usize>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: Option<usize>) -> Self {
        Self { items, total_count }
    }
}

/// Fetch all items of a listing (auto-paginate)
///
/// Stops on an empty page, on a page shorter than the requested size, or once
/// the advertised total has been collected. Any page error aborts the whole
/// collection: a partial listing is never returned.
///
/// A full page identical to the one before it means the server ignored the
/// page number; that fails the listing instead of looping forever.
pub async fn fetch_all<T, F, Fut>(kind: &str, page_size: usize, mut fetch: F) -> Result<Vec<T>, SyncError>
where
    T: PartialEq,
    F: FnMut(PageOptions) -> Fut,
    Fut: Future<Output = anyhow::Result<Page<T>>>,
{
    let mut all_items = Vec::new();
    let mut options = PageOptions::first(page_size);

    loop {
        let page = fetch(options).await.map_err(|source| SyncError::Listing {
            kind: kind.to_string(),
            page: options.page_number,
            source,
        })?;

        let received = page.items.len();
        all_items.extend(page.items);

        tracing::trace!(
            "{}: page {} returned {} item(s), total hint {:?}",
            kind,
            options.page_number,
            received,
            page.total_count
        );

        if received == 0 || received < options.page_size {
            break;
        }
        if matches!(page.total_count, Some(total) if all_items.len() >= total) {
            break;
        }
        if options.page_number > 1 && repeats_previous_page(&all_items, received) {
            return Err(SyncError::Listing {
                kind: kind.to_string(),
                page: options.page_number,
                source: anyhow::anyhow!("page {} repeats the previous page", options.page_number),
            });
        }
        options = options.next();
    }

    tracing::debug!(
        "Collected {} {} over {} page(s)",
        all_items.len(),
        kind,
        options.page_number
    );

    Ok(all_items)
}

/// True if the last `len` items equal the `len` items before them
fn repeats_previous_page<T: PartialEq>(items: &[T], len: usize) -> bool {
    items.len() >= 2 * len && items[items.len() - len..] == items[items.len() - 2 * len..items.len() - len]
}

/// Fetch all items of a listing and index them by natural key
pub async fn fetch_all_indexed<T, K, F, Fut, KF>(
    kind: &str,
    page_size: usize,
    fetch: F,
    key_of: KF,
) -> Result<HashMap<K, T>, SyncError>
where
    T: PartialEq,
    K: Eq + Hash,
    F: FnMut(PageOptions) -> Fut,
    Fut: Future<Output = anyhow::Result<Page<T>>>,
    KF: FnMut(&T) -> K,
{
    let items = fetch_all(kind, page_size, fetch).await?;
    Ok(index_by(items, key_of))
}
