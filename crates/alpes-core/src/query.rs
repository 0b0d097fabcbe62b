//! Read-side paging shared by the list queries of every context.

use serde::{Deserialize, Serialize};

/// Default number of items returned by a list query.
pub const DEFAULT_LIMIT: usize = 100;

/// Upper bound on `limit`; larger requests are clamped.
pub const MAX_LIMIT: usize = 500;

/// Window requested by a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of matching items to skip.
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// One window of a filtered result set.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    /// Items inside the window.
    pub items: Vec<T>,
    /// Number of items matching the filter before paging.
    pub total: usize,
    /// Effective limit.
    pub limit: usize,
    /// Effective offset.
    pub offset: usize,
}

impl<T> Page<T> {
    /// Cuts the window described by `pagination` out of `matching`.
    #[must_use]
    pub fn slice(matching: Vec<T>, pagination: Pagination) -> Self {
        let limit = pagination.limit.min(MAX_LIMIT);
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(pagination.offset)
            .take(limit)
            .collect();
        Self {
            items,
            total,
            limit,
            offset: pagination.offset,
        }
    }

    /// Maps every item of the window, keeping the paging figures.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}
