//! Offset pagination helpers for list endpoints.

use serde::{Deserialize, Serialize};

/// Default page size for list endpoints.
pub const DEFAULT_PER_PAGE: i64 = 50;

/// Maximum page size a caller may request.
pub const MAX_PER_PAGE: i64 = 200;

/// Query parameters for paginated list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    /// Returns the 1-based page number, clamped to at least 1.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Returns the page size, clamped to `1..=MAX_PER_PAGE`.
    pub fn per_page(&self) -> i64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    /// Returns the row offset for the current page.
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PageInfo {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageInfo {
    /// Builds pagination metadata from a query and a total row count.
    pub fn new(query: &PageQuery, total: i64) -> Self {
        let per_page = query.per_page();
        let total_pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            page: query.page(),
            per_page,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let query = PageQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), DEFAULT_PER_PAGE);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_clamping() {
        let query = PageQuery {
            page: Some(0),
            per_page: Some(10_000),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), MAX_PER_PAGE);
    }

    #[test]
    fn test_offset() {
        let query = PageQuery {
            page: Some(3),
            per_page: Some(25),
        };
        assert_eq!(query.offset(), 50);
    }

    #[test]
    fn test_page_info_rounding() {
        let query = PageQuery {
            page: Some(1),
            per_page: Some(10),
        };
        let info = PageInfo::new(&query, 101);
        assert_eq!(info.total_pages, 11);

        let empty = PageInfo::new(&query, 0);
        assert_eq!(empty.total_pages, 0);
    }
}
