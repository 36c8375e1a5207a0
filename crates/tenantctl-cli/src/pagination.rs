//! Page-by-page accumulation of server-side collections.

use std::future::Future;

use serde::Deserialize;

use crate::client::{CliError, CliResult};

/// Largest collection the list commands accept.
pub(crate) const MAX_ITEMS: usize = 1000;
/// Default `--number` for list commands.
pub(crate) const DEFAULT_ITEMS: usize = 50;
/// Largest page the management API serves.
pub(crate) const MAX_PAGE_SIZE: usize = 100;

/// Offsets handed to a page fetch callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageOptions {
    /// Zero-based page index.
    pub(crate) page: usize,
    /// Items requested per page.
    pub(crate) per_page: usize,
}

impl PageOptions {
    pub(crate) fn query_pairs(self) -> [(&'static str, String); 3] {
        [
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
            ("include_totals", "true".to_string()),
        ]
    }
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Page<T> {
    /// Items in server order.
    pub(crate) items: Vec<T>,
    /// Whether the server has further pages.
    pub(crate) has_more: bool,
}

/// Totals envelope returned with `include_totals=true`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PageTotals {
    #[serde(default)]
    pub(crate) start: usize,
    #[serde(default)]
    pub(crate) total: usize,
    #[serde(default)]
    pub(crate) next: Option<String>,
}

impl PageTotals {
    pub(crate) fn has_more(&self, returned: usize) -> bool {
        self.next.as_deref().is_some_and(|next| !next.is_empty())
            || self.start + returned < self.total
    }
}

/// Reject item budgets outside `[1, MAX_ITEMS]`.
///
/// # Errors
///
/// Returns a validation error naming the accepted range.
pub(crate) fn validate_budget(number: usize) -> CliResult<usize> {
    if (1..=MAX_ITEMS).contains(&number) {
        Ok(number)
    } else {
        Err(CliError::validation(format!(
            "number flag invalid, please pass a number between 1 and {MAX_ITEMS}"
        )))
    }
}

/// Fetch pages until the server runs out, `budget` items are collected,
/// or a page fails. Failures discard everything fetched so far.
///
/// # Errors
///
/// Propagates the first error returned by `fetch`, or a validation error
/// when `budget` is out of range.
pub(crate) async fn fetch_all<T, F, Fut>(budget: usize, mut fetch: F) -> CliResult<Vec<T>>
where
    F: FnMut(PageOptions) -> Fut,
    Fut: Future<Output = CliResult<Page<T>>>,
{
    let budget = validate_budget(budget)?;
    let per_page = budget.min(MAX_PAGE_SIZE);
    let mut items = Vec::with_capacity(budget);
    let mut page = 0;

    loop {
        let result = fetch(PageOptions { page, per_page }).await?;
        let returned = result.items.len();
        items.extend(result.items);
        tracing::trace!(page, returned, collected = items.len(), "fetched page");

        if !result.has_more || items.len() >= budget || returned == 0 {
            break;
        }
        page += 1;
    }

    items.truncate(budget);
    Ok(items)
}
