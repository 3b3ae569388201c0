//! Byte-level workbook decoders.
//!
//! Each supported format implements [`Spreadsheet`]; callers only ever see the
//! first worksheet, laid out as a [`SheetTable`] by [`decode_first_sheet`].

mod cell;
mod csv;
mod excel;
mod reference;
mod sheet;
pub(crate) mod xls;
mod xlsx;

pub use cell::CellValue;
pub use sheet::SheetTable;

use crate::error::DecodeError;
use crate::error::ResultMessage;
use crate::import::FileKind;
use crate::spreadsheet::csv::CsvSpreadsheet;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use bytes::Bytes;
use std::collections::HashMap;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Spreadsheet '{0}' contains no sheets")]
    SpreadsheetEmptyError(String),

    #[error("Spreadsheet '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Required part '{0}' is missing")]
    FileError(String),

    #[error("Invalid value '{1}' in cell {0}")]
    CellValueError(String, String),

    #[error("Sheet '{0}' spans {1} cells, more than the decoder lays out")]
    SheetTooLargeError(String, usize),

    #[error("'{0}' is not a spreadsheet format")]
    UnsupportedFormatError(String),
}

/// A decoded workbook.
pub(crate) trait Spreadsheet {
    fn name(&self) -> String;

    /// Sheet names in declared order.
    fn sheet_names(&self) -> Vec<String>;

    /// Loads the shared string table, optionally restricted to `indexes`.
    ///
    /// Returns the strings plus a mapping from original index to position in
    /// the returned vector (empty when nothing was filtered).
    fn load_shared_strings(&mut self, indexes: Option<HashSet<usize>>) -> Result<(Vec<String>, HashMap<usize, usize>), DecodeError>;

    /// Reads the sheet at declared position `index`.
    fn read_sheet(&mut self, index: usize) -> Result<Option<Sheet>, DecodeError>;
}

pub(crate) fn open_spreadsheet(kind: FileKind, file_name: &str, bytes: Bytes) -> Result<Box<dyn Spreadsheet>, DecodeError> {
    let spreadsheet: Box<dyn Spreadsheet> = match kind {
        FileKind::Csv => Box::new(CsvSpreadsheet::open(file_name, &bytes)?),
        FileKind::Xlsx => Box::new(XlsxSpreadsheet::open(file_name, bytes)?),
        FileKind::Xls => Box::new(XlsSpreadsheet::open(file_name, &bytes)?),
        FileKind::Unsupported => Err(SpreadsheetError::UnsupportedFormatError(file_name.to_owned()))?,
    };
    Ok(spreadsheet)
}

/// Decodes the first declared worksheet of a workbook.
///
/// Zero sheets, corrupt containers, password protection and malformed
/// records all end in a [`DecodeError`].
pub fn decode_first_sheet(kind: FileKind, file_name: &str, bytes: Bytes) -> Result<SheetTable, DecodeError> {
    let mut spreadsheet = open_spreadsheet(kind, file_name, bytes).with_prefix(file_name)?;
    let sheet_name = spreadsheet
        .sheet_names()
        .into_iter()
        .next()
        .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(spreadsheet.name()))?;
    let sheet = spreadsheet
        .read_sheet(0)
        .with_prefix(&format!("{file_name} sheet '{sheet_name}'"))?
        .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(spreadsheet.name()))?;

    let indexes = sheet.shared_string_indexes();
    let (shared_strings, mappings) = if indexes.is_empty() {
        (Vec::new(), HashMap::new())
    } else {
        spreadsheet.load_shared_strings(Some(indexes)).with_prefix(file_name)?
    };
    debug!(file_name, sheet = %sheet_name, cells = sheet.cells.len(), "decoded first sheet");

    sheet
        .into_table(&shared_strings, &mappings)
        .with_prefix(&format!("{file_name} sheet '{sheet_name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_csv_first_sheet() {
        let bytes = Bytes::from_static(b"id,descripcion,precio\n1,Product 1,10.0\n");
        let table = decode_first_sheet(FileKind::Csv, "items.csv", bytes).unwrap();
        assert_eq!(table.sheet_name, "Sheet1");
        assert_eq!(table.headers, vec!["id", "descripcion", "precio"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let bytes = Bytes::from_static(b"definitely not a workbook");
        let xlsx = decode_first_sheet(FileKind::Xlsx, "items.xlsx", bytes.clone()).unwrap_err();
        assert!(xlsx.to_string().starts_with("items.xlsx: "));
        assert!(decode_first_sheet(FileKind::Xls, "items.xls", bytes).is_err());
    }

    #[test]
    fn unsupported_kind_is_rejected() {
        let error = decode_first_sheet(FileKind::Unsupported, "report.txt", Bytes::new()).unwrap_err();
        assert!(error.to_string().contains("not a spreadsheet format"));
    }
}
