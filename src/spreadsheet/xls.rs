//! Excel 97-2003 workbooks: a BIFF8 record stream inside a compound file.

use crate::error::DecodeError;
use crate::error::ResultOptionChain;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::resolve_style_formats;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use std::collections::HashMap;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Column `IV`, the last one a BIFF8 worksheet has.
const LAST_COLUMN: usize = 255;

/// Record type identifiers.
mod record {
    // Workbook globals
    pub(super) const DATE1904: u16 = 34;
    pub(super) const FILE_PASS: u16 = 47;
    pub(super) const CODE_PAGE: u16 = 66;
    pub(super) const BOUND_SHEET8: u16 = 133;
    pub(super) const XF: u16 = 224;
    pub(super) const SST: u16 = 252;
    pub(super) const FORMAT: u16 = 1054;

    // Substream delimiters
    pub(super) const EOF: u16 = 10;
    pub(super) const BOF: u16 = 2057;

    // Cells
    pub(super) const FORMULA: u16 = 6;
    pub(super) const MUL_RK: u16 = 189;
    pub(super) const LABEL_SST: u16 = 253;
    pub(super) const NUMBER: u16 = 515;
    pub(super) const LABEL: u16 = 516;
    pub(super) const BOOL_ERR: u16 = 517;
    pub(super) const RK: u16 = 638;

    // Formula companions
    pub(super) const STRING: u16 = 519;
    pub(super) const ARRAY: u16 = 545;
    pub(super) const TABLE: u16 = 566;
    pub(super) const SHR_FMLA: u16 = 1212;
}

/// UTF-16 marker; compressed strings of such workbooks keep the default code page.
const CODE_PAGE_UTF16: u16 = 1200;

#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),
}

/// Either a fixed cell type or an XF index to resolve it through.
type CellFormat = Either<CellType, usize>;

pub(crate) struct XlsSpreadsheet {
    pub(crate) name: String,
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    /// Cell type of every XF index
    number_formats: Vec<CellType>,
    /// Sheet names and the stream offsets of their BOF records
    sheets: Vec<(String, usize)>,
}

#[derive(Default)]
struct Globals {
    is_1904: bool,
    shared_strings: Vec<String>,
    custom_formats: HashMap<String, CellType>,
    format_indexes: Vec<String>,
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    pub(crate) fn open(file_name: &str, bytes: &[u8]) -> Result<XlsSpreadsheet, DecodeError> {
        let cfb = Cfb::new(bytes)?;
        let mut reader = cfb
            .read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .map(Biff8Reader::new)
            .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?;

        let globals = read_globals(&mut reader, file_name)?;
        if globals.sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
        }
        let number_formats = resolve_style_formats(&globals.format_indexes, &globals.custom_formats, globals.is_1904);
        debug!(
            file_name,
            sheets = globals.sheets.len(),
            shared_strings = globals.shared_strings.len(),
            "opened xls workbook"
        );

        Ok(XlsSpreadsheet {
            name: file_name.to_owned(),
            reader,
            shared_strings: globals.shared_strings,
            number_formats,
            sheets: globals.sheets,
        })
    }

    fn number_format(&self, index: usize) -> CellType {
        self.number_formats.get(index).copied().unwrap_or(CellType::Number)
    }

    fn resolve(&self, format: CellFormat) -> CellType {
        format.either(|kind| kind, |index| self.number_format(index))
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// The SST is read while opening; indexes map to themselves.
    fn load_shared_strings(&mut self, indexes: Option<HashSet<usize>>) -> Result<(Vec<String>, HashMap<usize, usize>), DecodeError> {
        let mappings = indexes
            .unwrap_or_default()
            .into_iter()
            .map(|index| (index, index))
            .collect();
        Ok((self.shared_strings.to_owned(), mappings))
    }

    fn read_sheet(&mut self, index: usize) -> Result<Option<Sheet>, DecodeError> {
        let Some((sheet_name, offset)) = self.sheets.get(index).cloned() else {
            return Ok(None);
        };

        // Skip the sheet's own BOF, stop at its EOF or at the next substream.
        self.reader.goto(offset);
        self.reader.next()?;
        let mut sheet = Sheet::new(&sheet_name);
        while let Some(tag) = self.reader.next()? {
            match tag {
                record::BOF | record::EOF => break,
                record::MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let first = self.reader.read_u16()? as usize;
                    let last = self.reader.get_u16_back(2)? as usize;
                    if last > LAST_COLUMN {
                        return Err(SpreadsheetError::CellValueError(index_to_reference(row, last), "MULRK".to_owned()).into());
                    }
                    for col in first..=last {
                        let xf = self.reader.read_u16()? as usize;
                        let kind = self.number_format(xf);
                        let value = self.reader.read_rk_number()?;
                        sheet.push(Cell { row, col, kind, value });
                    }
                }
                record::BOOL_ERR | record::NUMBER | record::RK | record::LABEL_SST | record::LABEL | record::FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let (format, value) = read_cell(&mut self.reader, tag)?;
                    if col > LAST_COLUMN {
                        return Err(SpreadsheetError::CellValueError(index_to_reference(row, col), value).into());
                    }
                    let kind = self.resolve(format);
                    sheet.push(Cell { row, col, kind, value });
                }
                _ => (),
            }
        }

        Ok(Some(sheet))
    }
}

/// Walks the globals substream up to its EOF.
fn read_globals(reader: &mut Biff8Reader, file_name: &str) -> Result<Globals, DecodeError> {
    let mut globals = Globals::default();
    match_biff8_record!(reader => {
        record::EOF => break,
        // XOR obfuscation and RC4 both announce themselves with FILEPASS.
        record::FILE_PASS => Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?,
        record::DATE1904 => globals.is_1904 = reader.read_u16()? == 1,
        record::CODE_PAGE => {
            let code_page = reader.read_u16()?;
            if code_page != CODE_PAGE_UTF16 {
                reader.encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
            }
        }
        record::FORMAT => {
            let id = reader.read_u16()?;
            let code = reader.read_xl_unicode_string()?;
            let kind = CellType::parse_custom_number_format(&code, globals.is_1904);
            globals.custom_formats.insert(id.to_string(), kind);
        }
        record::XF => {
            reader.skip(2)?;
            globals.format_indexes.push(reader.read_u16()?.to_string());
        }
        record::SST => {
            reader.skip(4)?;
            let unique = reader.read_usize()?;
            globals.shared_strings = (0..unique)
                .map(|_| reader.read_xl_unicode_rich_extended_string())
                .collect::<Result<_, _>>()?;
        }
        record::BOUND_SHEET8 => {
            let offset = reader.read_usize()?;
            reader.skip(2)?;
            let name = reader.read_short_xl_unicode_string()?;
            globals.sheets.push((name, offset));
        }
    });
    Ok(globals)
}

/// Reads the value part of a single-cell record, after its row and column.
fn read_cell(reader: &mut Biff8Reader, tag: u16) -> Result<(CellFormat, String), DecodeError> {
    match tag {
        record::BOOL_ERR => {
            reader.skip(2)?;
            let value = reader.read_u8()?;
            if reader.read_u8()? == 0 {
                Ok((Either::Left(CellType::Boolean), value.to_string()))
            } else {
                Ok((Either::Left(CellType::Error), to_error_value(value).to_owned()))
            }
        }
        record::NUMBER => {
            let xf = reader.read_u16()? as usize;
            Ok((Either::Right(xf), reader.read_f64()?.to_string()))
        }
        record::RK => {
            let xf = reader.read_u16()? as usize;
            Ok((Either::Right(xf), reader.read_rk_number()?))
        }
        record::LABEL_SST => {
            reader.skip(2)?;
            Ok((Either::Left(CellType::SharedString), reader.read_usize()?.to_string()))
        }
        record::LABEL => {
            reader.skip(2)?;
            Ok((Either::Left(CellType::InlineString), reader.read_xl_unicode_string()?))
        }
        _ => read_formula_result(reader),
    }
}

/// Decodes the cached result of a FORMULA record.
///
/// Numbers are stored inline. Other results set the top two bytes to 0xFFFF
/// and put their type in the low byte; a string result follows in the next
/// STRING record, possibly after the formula's shared or array body.
fn read_formula_result(reader: &mut Biff8Reader) -> Result<(CellFormat, String), DecodeError> {
    let xf = reader.read_u16()? as usize;
    let result = reader.read_u64()?;
    if result >> 48 != 0xFFFF {
        return Ok((Either::Right(xf), f64::from_bits(result).to_string()));
    }

    let payload = ((result >> 16) & 0xFF) as u8;
    match result & 0xFF {
        0 => {
            while let Some(tag) = reader.next()? {
                match tag {
                    record::STRING => return Ok((Either::Left(CellType::InlineString), reader.read_xl_unicode_string()?)),
                    record::SHR_FMLA | record::ARRAY | record::TABLE => continue,
                    _ => break,
                }
            }
            Err(XlsError::FormulaValueError(result))?
        }
        1 => Ok((Either::Left(CellType::Boolean), if payload > 0 { "1" } else { "0" }.to_owned())),
        2 => Ok((Either::Left(CellType::Error), to_error_value(payload).to_owned())),
        3 => Ok((Either::Left(CellType::InlineString), String::new())),
        _ => Err(XlsError::FormulaValueError(result))?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u16, body: &[u8]) -> Vec<u8> {
        let mut bytes = kind.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(body.len() as u16).to_le_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    /// A FORMULA record body after row and column: XF, result, then padding.
    fn formula(result: u64) -> Vec<u8> {
        let mut body = 0u16.to_le_bytes().to_vec();
        body.extend_from_slice(&result.to_le_bytes());
        body.extend_from_slice(&[0u8; 6]);
        body
    }

    fn read_formula(stream: Vec<u8>) -> Result<(CellFormat, String), DecodeError> {
        let mut reader = Biff8Reader::new(stream);
        reader.next()?;
        read_formula_result(&mut reader)
    }

    #[test]
    fn numeric_formula_result() {
        let (format, value) = read_formula(record(record::FORMULA, &formula(2.5f64.to_bits()))).unwrap();
        assert_eq!(format, Either::Right(0));
        assert_eq!(value, "2.5");
    }

    #[test]
    fn boolean_and_error_formula_results() {
        let (format, value) = read_formula(record(record::FORMULA, &formula(0xFFFF_0000_0001_0001))).unwrap();
        assert_eq!((format, value.as_str()), (Either::Left(CellType::Boolean), "1"));

        let (format, value) = read_formula(record(record::FORMULA, &formula(0xFFFF_0000_0007_0002))).unwrap();
        assert_eq!((format, value.as_str()), (Either::Left(CellType::Error), "#DIV/0!"));
    }

    #[test]
    fn string_formula_result_skips_shared_formula() {
        let mut stream = record(record::FORMULA, &formula(0xFFFF_0000_0000_0000));
        stream.extend(record(record::SHR_FMLA, &[0u8; 10]));
        stream.extend(record(record::STRING, &[2, 0, 0, b'o', b'k']));
        let (format, value) = read_formula(stream).unwrap();
        assert_eq!((format, value.as_str()), (Either::Left(CellType::InlineString), "ok"));
    }

    #[test]
    fn string_formula_without_string_record_is_an_error() {
        let mut stream = record(record::FORMULA, &formula(0xFFFF_0000_0000_0000));
        stream.extend(record(record::EOF, &[]));
        assert!(read_formula(stream).is_err());
    }

    #[test]
    fn rejects_non_compound_files() {
        assert!(XlsSpreadsheet::open("items.xls", b"id,price\n1,2\n").is_err());
    }
}
