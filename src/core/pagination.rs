//! Page requests and page envelopes for listings.

use serde::{Deserialize, Serialize};

/// A client page request; both fields are optional on the wire.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    /// 1-based page number
    pub page: Option<u64>,
    /// Items per page
    pub per_page: Option<u64>,
}

impl Pagination {
    /// Resolves the request into a `(page, per_page)` pair, applying the
    /// default size and clamping to `max_per_page`.
    #[must_use]
    pub fn resolve(self, default_per_page: u64, max_per_page: u64) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(default_per_page)
            .clamp(1, max_per_page.max(1));
        (page, per_page)
    }
}

/// One page of results plus the numbers a paginator UI needs.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Total matching items across all pages
    pub total: u64,
    /// 1-based page number
    pub page: u64,
    /// Page size
    pub per_page: u64,
    /// Last page number (at least 1)
    pub last_page: u64,
}

impl<T> Page<T> {
    /// Builds a page, deriving `last_page` from `total` and `per_page`.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        let last_page = total.div_ceil(per_page.max(1)).max(1);
        Self {
            items,
            total,
            page,
            per_page,
            last_page,
        }
    }

    /// Converts the items while keeping the paging numbers.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }
}
