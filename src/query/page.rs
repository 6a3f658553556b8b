use serde::Serialize;

/// Pagination request: 1-indexed page, items per page.
/// `skip = (page - 1) * limit`.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: crate::config::config().api.default_page_size,
        }
    }
}

impl PageRequest {
    /// Build from raw query parameters, clamping to sane bounds. Page
    /// numbers below 1 become 1; limits are clamped to the configured
    /// maximum so a client cannot request the whole table.
    pub fn from_params(page: Option<i64>, limit: Option<i64>) -> Self {
        let config = &crate::config::config().api;
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// One page of results plus the filtered total, irrespective of pagination.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
        }
    }

    pub fn total_pages(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            (self.total + self.limit - 1) / self.limit
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_page_minus_one_times_limit() {
        let req = PageRequest::from_params(Some(2), Some(10));
        assert_eq!(req.offset(), 10);
        let req = PageRequest::from_params(Some(1), Some(25));
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn page_and_limit_are_clamped() {
        let req = PageRequest::from_params(Some(0), Some(0));
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 1);
        let req = PageRequest::from_params(Some(-3), None);
        assert_eq!(req.page, 1);
    }

    #[test]
    fn total_pages_is_ceiling_of_total_over_limit() {
        let page = Page::new(vec![1, 2, 3, 4, 5], 15, PageRequest { page: 2, limit: 10 });
        assert_eq!(page.total_pages(), 2);

        let page = Page::new(vec![0; 10], 20, PageRequest { page: 1, limit: 10 });
        assert_eq!(page.total_pages(), 2);

        let page: Page<i32> = Page::new(vec![], 0, PageRequest { page: 1, limit: 10 });
        assert_eq!(page.total_pages(), 0);
    }
}
