//! Pagination helpers for bulk listings

use serde::{Deserialize, Serialize};

/// Pagination request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, 0-indexed.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// SQL OFFSET for this request.
    pub fn offset(&self) -> u32 {
        self.page * self.page_size
    }

    /// SQL LIMIT for this request.
    pub fn limit(&self) -> u32 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 50,
        }
    }
}

/// One page of results plus listing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in this page.
    pub items: Vec<T>,
    /// Total matching items across all pages.
    pub total: u64,
    /// This page's number.
    pub page: u32,
    /// Total page count.
    pub total_pages: u32,
    /// Items per page.
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = if request.page_size == 0 {
            0
        } else {
            total.div_ceil(request.page_size as u64) as u32
        };
        Self {
            items,
            total,
            page: request.page,
            total_pages,
            page_size: request.page_size,
        }
    }

    /// An empty page, used when a listing degrades rather than fails.
    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit() {
        let request = PageRequest::new(3, 20);
        assert_eq!(request.offset(), 60);
        assert_eq!(request.limit(), 20);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = Page::new(vec![1, 2, 3], 25, PageRequest::new(0, 10));
        assert_eq!(page.total_pages, 3);

        let exact = Page::<i32>::new(vec![], 30, PageRequest::new(0, 10));
        assert_eq!(exact.total_pages, 3);
    }

    #[test]
    fn test_navigation_flags() {
        let first = Page::new(vec![1], 25, PageRequest::new(0, 10));
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last = Page::new(vec![1], 25, PageRequest::new(2, 10));
        assert!(!last.has_next());
        assert!(last.has_previous());
    }

    #[test]
    fn test_empty_page() {
        let page = Page::<i32>::empty(PageRequest::default());
        assert!(page.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn test_zero_page_size() {
        let page = Page::new(vec![1, 2], 25, PageRequest::new(0, 0));
        assert_eq!(page.total_pages, 0);
    }
}
