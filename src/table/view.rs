//! Derivation of the visible page from a dataset, its columns and pagination.

use crate::table::column::Columns;
use crate::table::pagination::NavigationControls;
use crate::table::pagination::Pagination;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub column_id: String,
    pub header: String,
    pub width: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCell {
    /// `"{row}_{column_id}"`, unique within the page
    pub key: String,
    pub column_id: String,
    pub text: String,
}

/// The visible slice of a dataset plus everything the page chrome shows.
///
/// Recomputed from scratch on every [`render`] call.
#[derive(Debug)]
pub struct DerivedPage<'a, T> {
    pub visible_rows: &'a [T],
    pub page_index: usize,
    pub page_count: usize,
    pub total_rows: usize,
    pub page_size: usize,
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<Vec<RenderedCell>>,
    pub controls: NavigationControls,
}

impl<T> DerivedPage<'_, T> {
    /// `"showing K of N"`.
    pub fn summary(&self) -> String {
        format!("showing {} of {}", self.visible_rows.len(), self.total_rows)
    }

    /// `"page X of Y"`.
    pub fn page_label(&self) -> String {
        format!("page {} of {}", self.page_index + 1, self.page_count)
    }
}

/// Renders the current page. `pagination` is read as-is, its row count is
/// expected to match `dataset`; the slice is clamped either way.
pub fn render<'a, T>(dataset: &'a [T], columns: &Columns<T>, pagination: &Pagination) -> DerivedPage<'a, T> {
    let page_size = pagination.page_size();
    let start = pagination.page_index().saturating_mul(page_size).min(dataset.len());
    let end = start.saturating_add(page_size).min(dataset.len());
    let visible_rows = &dataset[start..end];

    let headers = columns
        .iter()
        .map(|column| HeaderCell {
            column_id: column.id().to_owned(),
            header: column.header().to_owned(),
            width: column.width(columns.sizing()),
        })
        .collect();
    let rows = visible_rows
        .iter()
        .enumerate()
        .map(|(offset, row)| {
            columns
                .iter()
                .map(|column| RenderedCell {
                    key: format!("{}_{}", start + offset, column.id()),
                    column_id: column.id().to_owned(),
                    text: column.render(row),
                })
                .collect()
        })
        .collect();

    DerivedPage {
        visible_rows,
        page_index: pagination.page_index(),
        page_count: pagination.page_count(),
        total_rows: dataset.len(),
        page_size,
        headers,
        rows,
        controls: pagination.controls(),
    }
}
