//! Filter → sort → paginate, derived from the cache on demand.

use serde::{Deserialize, Serialize};

use crate::model::{Record, SortOrder, ViewControl};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub rows: Vec<Record>,
    pub total_count: usize,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
}

impl Projection {
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    /// False on the last page, so the "next" control can be disabled there.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// 1-based `(first, last)` row numbers of the visible page, `(0, 0)` when empty.
    #[must_use]
    pub fn showing_range(&self) -> (usize, usize) {
        if self.rows.is_empty() {
            return (0, 0);
        }
        let first = (self.current_page as usize - 1) * self.page_size as usize + 1;
        (first, first + self.rows.len() - 1)
    }
}

#[must_use]
pub fn matches_search(record: &Record, needle_lower: &str) -> bool {
    needle_lower.is_empty()
        || record.title.to_lowercase().contains(needle_lower)
        || record.body.to_lowercase().contains(needle_lower)
}

/// Records matching the search term, sorted by id; no paging applied.
#[must_use]
pub fn filter_and_sort(records: &[Record], search_term: &str, order: SortOrder) -> Vec<Record> {
    let needle = search_term.to_lowercase();
    let mut filtered: Vec<Record> = records
        .iter()
        .filter(|r| matches_search(r, &needle))
        .cloned()
        .collect();

    match order {
        SortOrder::Ascending => filtered.sort_unstable_by_key(|r| r.id),
        SortOrder::Descending => filtered.sort_unstable_by(|a, b| b.id.cmp(&a.id)),
    }
    filtered
}

#[must_use]
pub fn total_pages(count: usize, page_size: u32) -> u32 {
    let page_size = page_size.max(1) as usize;
    u32::try_from(count.div_ceil(page_size)).unwrap_or(u32::MAX)
}

/// A `current_page` past the end yields no rows; clamping is the caller's call.
#[must_use]
pub fn project(records: &[Record], view: &ViewControl) -> Projection {
    let filtered = filter_and_sort(records, view.search_term(), view.sort_order());
    let total_count = filtered.len();
    let page_size = view.page_size().max(1);
    let current_page = view.current_page().max(1);

    let start = (current_page as usize - 1).saturating_mul(page_size as usize);
    let rows = filtered
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();

    Projection {
        rows,
        total_count,
        total_pages: total_pages(total_count, page_size),
        current_page,
        page_size,
    }
}
