//! Page requests and paged results shared by every list operation.

use serde::Serialize;
use utoipa::ToSchema;

/// Largest page size any list endpoint will return.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A 1-indexed page request. Construct through [`PageRequest::new`] so the
/// bounds are always clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Clamps `page` to at least 1 and `per_page` to `1..=100`.
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Current page number.
    #[must_use]
    pub const fn page(self) -> u32 {
        self.page
    }

    /// Page size.
    #[must_use]
    pub const fn per_page(self) -> u32 {
        self.per_page
    }

    /// Number of rows to skip.
    #[must_use]
    pub const fn offset(self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }

    /// Page size as a `LIMIT` value.
    #[must_use]
    pub const fn limit(self) -> i64 {
        self.per_page as i64
    }

    /// Slices an already ordered collection.
    #[must_use]
    pub fn apply<T>(self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let data = items
            .into_iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.per_page as usize)
            .collect();
        Page::new(data, total, self)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// One page of results plus the metadata needed to navigate.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Page<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub pagination: PageMeta,
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PageMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u64,
    /// Total number of pages.
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Assembles a page from its rows and the unpaged total.
    #[must_use]
    pub fn new(data: Vec<T>, total: u64, req: PageRequest) -> Self {
        let per_page = u64::from(req.per_page);
        Self {
            data,
            pagination: PageMeta {
                page: req.page,
                per_page: req.per_page,
                total,
                total_pages: total.div_ceil(per_page),
            },
        }
    }

    /// Maps every item, keeping the metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn request_is_clamped() {
        let req = PageRequest::new(0, 1_000);
        assert_eq!(req.page(), 1);
        assert_eq!(req.per_page(), MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(3, 0).per_page(), 1);
    }

    #[test]
    fn apply_slices_and_counts() {
        let page = PageRequest::new(2, 3).apply((1..=8).collect::<Vec<_>>());
        assert_eq!(page.data, vec![4, 5, 6]);
        assert_eq!(page.pagination.total, 8);
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[test]
    fn empty_collection_has_zero_pages() {
        let page = PageRequest::default().apply(Vec::<u8>::new());
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total_pages, 0);
    }
}
