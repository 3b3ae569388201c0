use crate::error::DecodeError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::SpreadsheetError;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;

/// Upper bound on `rows * columns` of a laid out sheet. A few far apart
/// cells would otherwise allocate a huge, mostly empty grid.
const MAX_GRID_CELLS: usize = 1 << 24;

/// Cells collected from one worksheet, in the order the decoder produced them.
pub(crate) struct Sheet {
    pub(crate) name: String,
    pub(crate) cells: Vec<Cell>,
    /// Actual data range (determined from cell data)
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            cells: Vec::new(),
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    /// Adds a cell, ignoring empty values.
    pub(crate) fn push(&mut self, cell: Cell) {
        if cell.kind == CellType::Empty || cell.value.is_empty() {
            return;
        }
        self.update_bound(cell.col);
        self.cells.push(cell);
    }

    fn update_bound(&mut self, col: usize) {
        if self.col_lower_bound.map(|col_lower_bound| col < col_lower_bound).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|col_upper_bound| col_upper_bound < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Shared string indexes referenced by this sheet.
    pub(crate) fn shared_string_indexes(&self) -> HashSet<usize> {
        self.cells
            .iter()
            .filter(|cell| cell.kind == CellType::SharedString)
            .filter_map(|cell| cell.value.parse::<usize>().ok())
            .collect()
    }

    /// Lays the cells out as a header row plus data rows.
    ///
    /// The first row holding any value names the columns. Later cells of the
    /// same position overwrite earlier ones.
    pub(crate) fn into_table(self, shared_strings: &[String], mappings: &HashMap<usize, usize>) -> Result<SheetTable, DecodeError> {
        let (col_lower, col_upper) = match self.col_lower_bound.zip(self.col_upper_bound) {
            Some(bounds) => bounds,
            None => {
                return Ok(SheetTable {
                    sheet_name: self.name,
                    headers: Vec::new(),
                    rows: Vec::new(),
                })
            }
        };
        let width = col_upper - col_lower + 1;
        let row_count = self.cells.iter().map(|cell| cell.row).collect::<HashSet<_>>().len();
        let grid_cells = width.saturating_mul(row_count);
        if grid_cells > MAX_GRID_CELLS {
            return Err(SpreadsheetError::SheetTooLargeError(self.name, grid_cells).into());
        }

        let mut grid: BTreeMap<usize, Vec<CellValue>> = BTreeMap::new();
        for cell in &self.cells {
            let value = cell.to_value(shared_strings, mappings)?;
            if value.is_empty() {
                continue;
            }
            let row = grid.entry(cell.row).or_insert_with(|| vec![CellValue::Empty; width]);
            row[cell.col - col_lower] = value;
        }

        let mut rows = grid.into_values().filter(|row| row.iter().any(|value| !value.is_empty()));
        let headers = match rows.next() {
            Some(header_row) => to_headers(&header_row),
            None => Vec::new(),
        };
        Ok(SheetTable {
            sheet_name: self.name,
            headers,
            rows: rows.collect(),
        })
    }
}

/// Names header cells: blanks become `__EMPTY` and repeats get `_1`, `_2` suffixes.
fn to_headers(row: &[CellValue]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut headers = Vec::with_capacity(row.len());
    for value in row {
        let base = match value.to_string() {
            text if text.is_empty() => "__EMPTY".to_owned(),
            text => text,
        };
        let mut name = base.clone();
        while used.contains(&name) {
            let counter = seen.entry(base.clone()).or_insert(0);
            *counter += 1;
            name = format!("{base}_{counter}");
        }
        used.insert(name.clone());
        headers.push(name);
    }
    headers
}

/// First worksheet of a decoded file: header names plus the data rows beneath.
///
/// Every row has exactly `headers.len()` values; missing cells are
/// [`CellValue::Empty`].
#[derive(Clone, Debug, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTable {
    /// Iterates the data rows as header-keyed pairs, omitting empty cells.
    pub fn records(&self) -> impl Iterator<Item = Vec<(&str, &CellValue)>> + '_ {
        self.rows.iter().map(move |row| {
            self.headers
                .iter()
                .zip(row)
                .filter(|(_, value)| !value.is_empty())
                .map(|(header, value)| (header.as_str(), value))
                .collect()
        })
    }
}
