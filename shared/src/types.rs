//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Largest page a client may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl Pagination {
    /// Clamp raw query values: page starts at 1, size is 1..=MAX_PAGE_SIZE
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        let d = Self::default();
        Self {
            page: page.unwrap_or(d.page).max(1),
            page_size: page_size.unwrap_or(d.page_size).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    pub fn meta(&self, total_items: u64) -> PaginationMeta {
        let size = u64::from(self.page_size);
        PaginationMeta {
            page: self.page,
            page_size: self.page_size,
            total_items,
            total_pages: total_items.div_ceil(size) as u32,
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

/// Lifecycle of a row that is never physically deleted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordState {
    #[default]
    Active,
    Deleted,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Active => "ACTIVE",
            RecordState::Deleted => "DELETED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_input() {
        let p = Pagination::new(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, MAX_PAGE_SIZE);
        assert_eq!(Pagination::new(None, None), Pagination::default());
    }

    #[test]
    fn offset_and_pages() {
        let p = Pagination::new(Some(3), Some(20));
        assert_eq!(p.offset(), 40);
        assert_eq!(p.meta(41).total_pages, 3);
        assert_eq!(p.meta(0).total_pages, 0);
    }
}
