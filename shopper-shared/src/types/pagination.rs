use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

pub const MAX_LIMIT: i64 = 100;

/// Raw `?page=&limit=&sortBy=&order=` query parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

fn default_page() -> i64 { 1 }
fn default_limit() -> i64 { 20 }

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, limit: 20, sort_by: None, order: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Allow-list of sortable columns for one listing.
///
/// Unknown `sortBy` values resolve to [`SortKey::DEFAULT`] instead of failing,
/// so nothing the client sends ever reaches the ORDER BY clause verbatim.
pub trait SortKey: Sized + Copy {
    const DEFAULT: Self;
    const DEFAULT_ORDER: SortOrder;

    fn parse(column: &str) -> Option<Self>;
}

/// Validated page request with a whitelisted sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<K> {
    pub page: i64,
    pub limit: i64,
    pub sort: K,
    pub order: SortOrder,
}

impl<K> PageRequest<K> {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn map_sort<L>(self, f: impl FnOnce(K) -> L) -> PageRequest<L> {
        PageRequest {
            page: self.page,
            limit: self.limit,
            sort: f(self.sort),
            order: self.order,
        }
    }
}

impl PaginationParams {
    pub fn resolve<K: SortKey>(&self) -> AppResult<PageRequest<K>> {
        if self.page < 1 {
            return Err(AppError::field("page", "page must be at least 1"));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(AppError::field(
                "limit",
                format!("limit must be between 1 and {MAX_LIMIT}"),
            ));
        }
        if (self.page - 1).checked_mul(self.limit).is_none() {
            return Err(AppError::field("page", "page is out of range"));
        }

        let sort = self
            .sort_by
            .as_deref()
            .and_then(K::parse)
            .unwrap_or(K::DEFAULT);
        let order = self
            .order
            .as_deref()
            .and_then(SortOrder::parse)
            .unwrap_or(K::DEFAULT_ORDER);

        Ok(PageRequest {
            page: self.page,
            limit: self.limit,
            sort,
            order,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new<K>(total: i64, req: &PageRequest<K>) -> Self {
        let total_pages = if total == 0 { 0 } else { (total + req.limit - 1) / req.limit };
        Self {
            total,
            page: req.page,
            limit: req.limit,
            total_pages,
        }
    }
}
