//! Comma separated values read as a single-sheet workbook.

use crate::error::DecodeError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::HashSet;
use tracing::debug;

const SHEET_NAME: &str = "Sheet1";
const BOM: &str = "\u{feff}";

pub(crate) struct CsvSpreadsheet {
    pub(crate) name: String,
    sheet: Option<Sheet>,
}

impl CsvSpreadsheet {
    /// Decodes the text (UTF-8, else Windows-1252) and types every field.
    pub(crate) fn open(file_name: &str, bytes: &[u8]) -> Result<CsvSpreadsheet, DecodeError> {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => {
                debug!(file_name, "csv is not valid UTF-8, decoding as Windows-1252");
                let (text, _, _) = WINDOWS_1252.decode(bytes);
                text
            }
        };
        let text = text.strip_prefix(BOM).unwrap_or(&text);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(sniff_delimiter(text))
            .from_reader(text.as_bytes());
        let mut sheet = Sheet::new(SHEET_NAME);
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            for (col, field) in record.iter().enumerate() {
                let (kind, value) = to_cell_value(field);
                sheet.push(Cell { row, col, kind, value });
            }
        }

        Ok(CsvSpreadsheet {
            name: file_name.to_owned(),
            sheet: Some(sheet),
        })
    }
}

impl Spreadsheet for CsvSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        vec![SHEET_NAME.to_owned()]
    }

    fn load_shared_strings(&mut self, _indexes: Option<HashSet<usize>>) -> Result<(Vec<String>, HashMap<usize, usize>), DecodeError> {
        Ok((Vec::new(), HashMap::new()))
    }

    fn read_sheet(&mut self, index: usize) -> Result<Option<Sheet>, DecodeError> {
        Ok(if index == 0 { self.sheet.take() } else { None })
    }
}

/// Semicolon separated exports are common in locales with a decimal comma.
fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    let commas = first_line.matches(',').count();
    let semicolons = first_line.matches(';').count();
    if semicolons > commas { b';' } else { b',' }
}

fn to_cell_value(field: &str) -> (CellType, String) {
    let trimmed = field.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        (CellType::Boolean, "1".to_owned())
    } else if trimmed.eq_ignore_ascii_case("false") {
        (CellType::Boolean, "0".to_owned())
    } else if !trimmed.is_empty() && trimmed.parse::<f64>().map(f64::is_finite).unwrap_or(false) {
        (CellType::Number, trimmed.to_owned())
    } else {
        (CellType::InlineString, field.to_owned())
    }
}
