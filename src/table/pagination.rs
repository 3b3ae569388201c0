//! Page index bookkeeping for client-side pagination.
//!
//! The page count is always derived from the row count and page size, and
//! the page index is re-clamped whenever either of them changes.

use crate::table::TableError;

/// Page size used when a table is not configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One of the four page navigation controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNavigation {
    First,
    Previous,
    Next,
    Last,
}

/// Enabled/disabled flag of every navigation control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationControls {
    pub first: bool,
    pub previous: bool,
    pub next: bool,
    pub last: bool,
}

/// Number of pages needed for `total_rows`; zero rows means zero pages.
pub fn page_count_for(total_rows: usize, page_size: usize) -> usize {
    if total_rows == 0 || page_size == 0 {
        0
    } else {
        total_rows.div_ceil(page_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_index: usize,
    page_size: usize,
    total_rows: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            total_rows: 0,
        }
    }
}

impl Pagination {
    /// Creates pagination over an empty dataset. A zero page size is rejected.
    pub fn new(page_size: usize) -> Result<Self, TableError> {
        if page_size == 0 {
            return Err(TableError::InvalidPageSize);
        }
        Ok(Self {
            page_size,
            ..Self::default()
        })
    }

    #[inline]
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        page_count_for(self.total_rows, self.page_size)
    }

    /// Updates the row count and clamps the page index into the new range.
    pub fn set_total_rows(&mut self, total_rows: usize) {
        self.total_rows = total_rows;
        self.clamp();
    }

    /// Changes the page size and clamps the page index into the new range.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), TableError> {
        if page_size == 0 {
            return Err(TableError::InvalidPageSize);
        }
        self.page_size = page_size;
        self.clamp();
        Ok(())
    }

    fn clamp(&mut self) {
        let page_count = self.page_count();
        if page_count <= self.page_index {
            self.page_index = page_count.saturating_sub(1);
        }
    }

    pub fn can_go_first(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_go_previous(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_go_next(&self) -> bool {
        self.page_index + 1 < self.page_count()
    }

    pub fn can_go_last(&self) -> bool {
        self.page_index + 1 < self.page_count()
    }

    /// Jumps to the first page. Returns whether the page changed.
    pub fn go_first(&mut self) -> bool {
        if !self.can_go_first() {
            return false;
        }
        self.page_index = 0;
        true
    }

    pub fn go_previous(&mut self) -> bool {
        if !self.can_go_previous() {
            return false;
        }
        self.page_index -= 1;
        true
    }

    pub fn go_next(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        self.page_index += 1;
        true
    }

    /// Jumps to the last page. Returns whether the page changed.
    pub fn go_last(&mut self) -> bool {
        if !self.can_go_last() {
            return false;
        }
        self.page_index = self.page_count() - 1;
        true
    }

    /// Applies a navigation control; disabled controls are no-ops.
    pub fn navigate(&mut self, navigation: PageNavigation) -> bool {
        match navigation {
            PageNavigation::First => self.go_first(),
            PageNavigation::Previous => self.go_previous(),
            PageNavigation::Next => self.go_next(),
            PageNavigation::Last => self.go_last(),
        }
    }

    pub fn controls(&self) -> NavigationControls {
        NavigationControls {
            first: self.can_go_first(),
            previous: self.can_go_previous(),
            next: self.can_go_next(),
            last: self.can_go_last(),
        }
    }

    /// Row range of the current page, clamped to the dataset.
    pub fn row_range(&self) -> std::ops::Range<usize> {
        let start = self.page_index.saturating_mul(self.page_size).min(self.total_rows);
        let end = start.saturating_add(self.page_size).min(self.total_rows);
        start..end
    }

    /// `"page X of Y"`, one-based.
    pub fn page_label(&self) -> String {
        format!("page {} of {}", self.page_index + 1, self.page_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pagination(total_rows: usize, page_size: usize) -> Pagination {
        let mut pagination = Pagination::new(page_size).unwrap();
        pagination.set_total_rows(total_rows);
        pagination
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert!(matches!(Pagination::new(0), Err(TableError::InvalidPageSize)));
        let mut pagination = Pagination::default();
        assert!(pagination.set_page_size(0).is_err());
        assert_eq!(pagination.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn eleven_rows_make_two_pages() {
        let mut pagination = pagination(11, 10);
        assert_eq!(pagination.page_count(), 2);
        assert!(!pagination.can_go_previous());

        let mut visited = 1;
        while pagination.go_next() {
            visited += 1;
        }
        assert_eq!(visited, 2);
        assert_eq!(pagination.page_index(), 1);
        assert!(!pagination.can_go_next());
        assert_eq!(pagination.row_range(), 10..11);
        assert_eq!(pagination.page_label(), "page 2 of 2");
    }

    #[test]
    fn empty_dataset_disables_everything() {
        let mut pagination = pagination(0, 10);
        assert_eq!(pagination.page_count(), 0);
        assert_eq!(pagination.controls(), NavigationControls::default());
        assert!(!pagination.go_next());
        assert!(!pagination.go_last());
        assert_eq!(pagination.page_index(), 0);
        assert_eq!(pagination.row_range(), 0..0);
    }

    #[test]
    fn shrinking_dataset_clamps_page_index() {
        let mut pagination = pagination(45, 10);
        assert!(pagination.go_last());
        assert_eq!(pagination.page_index(), 4);

        pagination.set_total_rows(12);
        assert_eq!(pagination.page_index(), 1);

        pagination.set_total_rows(0);
        assert_eq!(pagination.page_index(), 0);
    }

    #[test]
    fn resizing_pages_clamps_page_index() {
        let mut pagination = pagination(30, 5);
        assert!(pagination.go_last());
        pagination.set_page_size(25).unwrap();
        assert_eq!(pagination.page_index(), 1);
        assert_eq!(pagination.row_range(), 25..30);
    }

    #[test]
    fn navigation_controls_are_reported() {
        let mut pagination = pagination(25, 10);
        assert!(pagination.navigate(PageNavigation::Next));
        assert_eq!(
            pagination.controls(),
            NavigationControls { first: true, previous: true, next: true, last: true }
        );
        assert!(pagination.navigate(PageNavigation::First));
        assert!(!pagination.navigate(PageNavigation::Previous));
    }

    fn navigation() -> impl Strategy<Value = PageNavigation> {
        prop_oneof![
            Just(PageNavigation::First),
            Just(PageNavigation::Previous),
            Just(PageNavigation::Next),
            Just(PageNavigation::Last),
        ]
    }

    #[derive(Debug, Clone)]
    enum Step {
        Navigate(PageNavigation),
        Rows(usize),
        PageSize(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            navigation().prop_map(Step::Navigate),
            (0usize..500).prop_map(Step::Rows),
            (1usize..50).prop_map(Step::PageSize),
        ]
    }

    proptest! {
        #[test]
        fn page_count_is_ceiling(total_rows in 0usize..10_000, page_size in 1usize..200) {
            let expected = if total_rows == 0 { 0 } else { (total_rows + page_size - 1) / page_size };
            prop_assert_eq!(page_count_for(total_rows, page_size), expected);
        }

        #[test]
        fn page_index_stays_in_range(
            total_rows in 0usize..500,
            page_size in 1usize..50,
            steps in proptest::collection::vec(step(), 0..40),
        ) {
            let mut pagination = pagination(total_rows, page_size);
            for step in steps {
                match step {
                    Step::Navigate(navigation) => { pagination.navigate(navigation); }
                    Step::Rows(rows) => pagination.set_total_rows(rows),
                    Step::PageSize(size) => pagination.set_page_size(size).unwrap(),
                }
                let upper = pagination.page_count().saturating_sub(1);
                prop_assert!(pagination.page_index() <= upper);
                prop_assert!(pagination.row_range().len() <= pagination.page_size());
            }
        }
    }
}
