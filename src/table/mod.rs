//! Generic tabular data engine with client-side pagination.
//!
//! [`Columns`] describe how rows are read and rendered, [`Pagination`] owns
//! the page index, and [`render`] derives the visible page from both. A
//! [`Table`] bundles a dataset with them and keeps the pagination consistent
//! whenever the dataset is replaced.

pub mod column;
pub mod pagination;
pub mod view;

pub use column::Column;
pub use column::ColumnSizing;
pub use column::Columns;
pub use column::DisplayValue;
pub use pagination::NavigationControls;
pub use pagination::PageNavigation;
pub use pagination::Pagination;
pub use pagination::DEFAULT_PAGE_SIZE;
pub use view::render;
pub use view::DerivedPage;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableError {
    #[error("Duplicate column id '{0}'")]
    DuplicateColumnId(String),

    #[error("Column '{id}' has inconsistent widths: min {min:?}, default {default:?}, max {max:?}")]
    InvalidColumnWidth {
        id: String,
        min: Option<u16>,
        default: Option<u16>,
        max: Option<u16>,
    },

    #[error("Page size must be positive")]
    InvalidPageSize,
}

/// A dataset together with its columns and pagination.
pub struct Table<T> {
    rows: Vec<T>,
    columns: Columns<T>,
    pagination: Pagination,
}

impl<T> Table<T> {
    pub fn new(columns: Columns<T>, page_size: usize) -> Result<Self, TableError> {
        Ok(Self {
            rows: Vec::new(),
            columns,
            pagination: Pagination::new(page_size)?,
        })
    }

    /// Replaces the dataset wholesale and re-clamps the page index.
    pub fn set_rows(&mut self, rows: Vec<T>) {
        self.rows = rows;
        self.pagination.set_total_rows(self.rows.len());
    }

    pub fn clear(&mut self) {
        self.set_rows(Vec::new());
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &Columns<T> {
        &self.columns
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), TableError> {
        self.pagination.set_page_size(page_size)
    }

    pub fn navigate(&mut self, navigation: PageNavigation) -> bool {
        self.pagination.navigate(navigation)
    }

    /// Derives the current page.
    pub fn page(&self) -> DerivedPage<'_, T> {
        render(&self.rows, &self.columns, &self.pagination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table<String> {
        let columns = Columns::new(vec![Column::new("name", "Name", |name: &String| name.as_str().into())]).unwrap();
        Table::new(columns, 10).unwrap()
    }

    #[test]
    fn replacing_rows_keeps_pagination_consistent() {
        let mut table = table();
        table.set_rows((0..25).map(|n| format!("item {n}")).collect());
        assert!(table.navigate(PageNavigation::Last));
        assert_eq!(table.page().summary(), "showing 5 of 25");

        table.set_rows((0..3).map(|n| format!("item {n}")).collect());
        let page = table.page();
        assert_eq!(page.page_index, 0);
        assert_eq!(page.summary(), "showing 3 of 3");

        table.clear();
        assert_eq!(table.page().summary(), "showing 0 of 0");
    }

    #[test]
    fn zero_page_size_is_a_configuration_error() {
        let columns = Columns::new(Vec::<Column<String>>::new()).unwrap();
        assert_eq!(Table::new(columns, 0).err(), Some(TableError::InvalidPageSize));
    }
}
