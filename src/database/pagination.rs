use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// `limit`/`offset` window requested by the caller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next_offset: Option<i64>,
    pub prev_offset: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(results: Vec<T>, total_rows: i64, page: Page) -> Self {
        if results.is_empty() {
            return Self::no_rows(total_rows, page);
        }

        let next_offset = page.offset + page.limit;
        let next_offset = (next_offset < total_rows).then_some(next_offset);
        let prev_offset = (page.offset > 0).then(|| (page.offset - page.limit).max(0));

        Self {
            count: total_rows,
            next_offset,
            prev_offset,
            results,
        }
    }

    /// An offset past the end still reports the total so clients can step back.
    pub fn no_rows(total_rows: i64, page: Page) -> Self {
        Self {
            count: total_rows,
            next_offset: None,
            prev_offset: (page.offset > 0 && total_rows > 0)
                .then(|| (total_rows - 1) / page.limit * page.limit),
            results: vec![],
        }
    }
}

/// The `COUNT(*) OVER()` total of the first fetched row. An empty page past the
/// start has no row to read it from, so `count` runs instead.
pub async fn window_total(
    first: Option<i64>,
    page: Page,
    count: impl Future<Output = Result<i64, potion::Error>>,
) -> Result<i64, potion::Error> {
    match first {
        Some(total) => Ok(total),
        None if page.offset > 0 => count.await,
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_requested_window() {
        assert_eq!(Page::new(Some(0), Some(-5)), Page { limit: 1, offset: 0 });
        assert_eq!(
            Page::new(Some(10_000), None),
            Page {
                limit: MAX_PAGE_SIZE,
                offset: 0
            }
        );
        assert_eq!(Page::default().limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn first_page_points_forward_only() {
        let page = PageContext::from_rows(vec![1, 2], 5, Page::new(Some(2), Some(0)));
        assert_eq!(page.count, 5);
        assert_eq!(page.next_offset, Some(2));
        assert_eq!(page.prev_offset, None);
    }

    #[test]
    fn last_page_points_back_only() {
        let page = PageContext::from_rows(vec![5], 5, Page::new(Some(2), Some(4)));
        assert_eq!(page.next_offset, None);
        assert_eq!(page.prev_offset, Some(2));
    }

    #[test]
    fn offset_past_the_end_steps_back_to_last_page() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 5, Page::new(Some(2), Some(8)));
        assert!(page.results.is_empty());
        assert_eq!(page.count, 5);
        assert_eq!(page.prev_offset, Some(4));
    }

    #[tokio::test]
    async fn total_is_counted_only_for_empty_pages_past_the_start() {
        let page = Page::new(Some(2), Some(8));
        let counted = window_total(None, page, async { Ok(5) }).await;
        assert_eq!(counted.ok(), Some(5));

        let from_row = window_total(Some(7), page, async { Ok(5) }).await;
        assert_eq!(from_row.ok(), Some(7));

        let first_page = window_total(None, Page::default(), async { Ok(5) }).await;
        assert_eq!(first_page.ok(), Some(0));
    }
}
