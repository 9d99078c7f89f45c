//! Page arithmetic for infraction history queries.

/// Page size used when the caller does not pick one.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A 1-indexed page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    /// Clamps `page` to at least 1 and `per_page` to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip.
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }

    /// Page count for `total` rows. No rows is still one (empty) page.
    pub fn total_pages(&self, total: u64) -> u32 {
        if total == 0 {
            1
        } else {
            total.div_ceil(u64::from(self.per_page)) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        assert_eq!(Pagination::new(0, 0), Pagination { page: 1, per_page: 1 });
        assert_eq!(Pagination::new(3, 1000).per_page, MAX_PAGE_SIZE);
        assert_eq!(Pagination::default().per_page, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_offset_and_total_pages() {
        let p = Pagination::new(3, 10);
        assert_eq!(p.offset(), 20);
        assert_eq!(p.limit(), 10);
        assert_eq!(p.total_pages(0), 1);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
    }
}
