use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Raw page/limit as supplied by a caller. Absent or non-positive values fall
/// back to the defaults.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
            .filter(|p| *p > 0)
            .map(|p| p.min(u32::MAX as i64) as u32)
            .unwrap_or(DEFAULT_PAGE)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .filter(|l| *l > 0)
            .map(|l| l.min(MAX_LIMIT as i64) as u32)
            .unwrap_or(DEFAULT_LIMIT)
    }

    /// Row offset of the first item on the requested page.
    pub fn offset(&self) -> u64 {
        (self.page() as u64 - 1) * self.limit() as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        let limit = request.limit();
        Self {
            items,
            page: request.page(),
            limit,
            total_items,
            total_pages: total_items.div_ceil(limit as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_non_positive_values_use_defaults() {
        let req = PageRequest::default();
        assert_eq!((req.page(), req.limit()), (1, 10));

        let req = PageRequest::new(0, -5);
        assert_eq!((req.page(), req.limit()), (1, 10));
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(PageRequest::new(1, 10_000).limit(), MAX_LIMIT);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<()> = Page::new(vec![], PageRequest::new(1, 10), 21);
        assert_eq!(page.total_pages, 3);

        let empty: Page<()> = Page::new(vec![], PageRequest::new(1, 10), 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn offset_follows_page_and_limit() {
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }
}
