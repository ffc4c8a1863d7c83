//! Pagination and sorting shared by list endpoints.

use serde::{Deserialize, Serialize};

/// 1-based page request, as sent by the SPA (`?page=2&pageSize=50`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;

    #[must_use]
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }.normalized()
    }

    /// Clamp out-of-range values: page 0 becomes 1, page size 0 becomes the
    /// default, oversized pages are capped.
    #[must_use]
    pub fn normalized(self) -> Self {
        let page = self.page.max(1);
        let page_size = match self.page_size {
            0 => Self::DEFAULT_PAGE_SIZE,
            n => n.min(Self::MAX_PAGE_SIZE),
        };
        Self { page, page_size }
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.normalized().page_size)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        let n = self.normalized();
        i64::from(n.page - 1) * i64::from(n.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results plus the totals the SPA needs for its pager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        let request = request.normalized();
        let total = total.max(0);
        let size = i64::from(request.page_size);
        let total_pages = u32::try_from((total + size - 1) / size).unwrap_or(u32::MAX);
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages,
        }
    }

    /// Convert the items while keeping the paging metadata.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword for `ORDER BY`.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Lenient parse used for query strings; anything but `asc` is descending.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults_and_clamps() {
        let req = PageRequest::default();
        assert_eq!((req.limit(), req.offset()), (20, 0));

        let req = PageRequest { page: 0, page_size: 0 };
        assert_eq!((req.limit(), req.offset()), (20, 0));

        let req = PageRequest { page: 3, page_size: 500 };
        assert_eq!((req.limit(), req.offset()), (100, 200));
    }

    #[test]
    fn test_page_request_deserialize_partial() {
        let req: PageRequest = serde_json::from_str(r#"{"page":2}"#).expect("deserialize");
        assert_eq!(req.page, 2);
        assert_eq!(req.page_size, 20);
    }

    #[test]
    fn test_page_total_pages() {
        let page = Page::new(vec![1, 2, 3], 41, PageRequest::new(1, 20));
        assert_eq!(page.total_pages, 3);
        let empty: Page<i32> = Page::new(vec![], 0, PageRequest::default());
        assert_eq!(empty.total_pages, 0);
        let doubled = page.map(|n| n * 2);
        assert_eq!(doubled.items, vec![2, 4, 6]);
        assert_eq!(doubled.total, 41);
    }

    #[test]
    fn test_sort_order() {
        assert_eq!(SortOrder::from_query(Some("ASC")), SortOrder::Asc);
        assert_eq!(SortOrder::from_query(Some("bogus")), SortOrder::Desc);
        assert_eq!(SortOrder::from_query(None).as_sql(), "DESC");
    }
}
