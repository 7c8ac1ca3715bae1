//! List paging, sorting direction and text matching used by every list query.

use serde::{Deserialize, Serialize};

/// Default page size for list endpoints that don't override it.
pub const DEFAULT_LIMIT: u32 = 10;

/// Upper bound on a single page.
pub const MAX_LIMIT: u32 = 100;

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse `asc`/`desc` (case-insensitive); anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    /// Orient an ascending comparison result.
    pub fn apply(self, ordering: core::cmp::Ordering) -> core::cmp::Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Requested page (1-based) plus optional sort field and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl PageRequest {
    /// Build a request, falling back to page 1 and `default_limit`.
    ///
    /// Zero values are treated as absent; `limit` is capped at [`MAX_LIMIT`].
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit.filter(|l| *l > 0).unwrap_or(default_limit).min(MAX_LIMIT),
            sort_by: None,
            sort_order: None,
        }
    }

    pub fn with_sort(mut self, sort_by: Option<String>, sort_order: Option<SortOrder>) -> Self {
        self.sort_by = sort_by.filter(|s| !s.trim().is_empty());
        self.sort_order = sort_order;
        self
    }

    /// Number of records skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Sort field, or `default` when the caller didn't choose one.
    pub fn sort_field<'a>(&'a self, default: &'a str) -> &'a str {
        self.sort_by.as_deref().unwrap_or(default)
    }

    pub fn order_or(&self, default: SortOrder) -> SortOrder {
        self.sort_order.unwrap_or(default)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None, DEFAULT_LIMIT)
    }
}

/// Pagination block returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(request: &PageRequest, total: u64) -> Self {
        Self {
            page: request.page,
            limit: request.limit,
            total,
            pages: total.div_ceil(u64::from(request.limit)),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Cut a page out of an already filtered and sorted list.
    pub fn from_sorted(all: Vec<T>, request: &PageRequest) -> Self {
        let pagination = Pagination::new(request, all.len() as u64);
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit as usize)
            .collect();
        Self { items, pagination }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Case-insensitive substring match used by every `search` filter.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
