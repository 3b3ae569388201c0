//! Excel 2007+ workbooks: SpreadsheetML parts inside a zip package.

use crate::error::DecodeError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::open_package;
use crate::spreadsheet::excel::resolve_style_formats;
use crate::spreadsheet::excel::worksheet_targets;
use crate::spreadsheet::excel::Package;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::reference::MAX_COL;
use crate::spreadsheet::reference::MAX_ROW;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use bytes::Bytes;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::BufRead;
use tracing::debug;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELATIONSHIPS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

mod tag {
    use quick_xml::name::QName;

    // workbook.xml
    pub(super) const SHEET: QName = QName(b"sheet");
    pub(super) const WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");

    // styles.xml
    pub(super) const NUMBER_FORMATS: QName = QName(b"numFmts");
    pub(super) const NUMBER_FORMAT: QName = QName(b"numFmt");
    pub(super) const CELL_FORMATS: QName = QName(b"cellXfs");
    pub(super) const CELL_FORMAT: QName = QName(b"xf");

    // sharedStrings.xml and inline strings
    pub(super) const STRING_ITEM: QName = QName(b"si");
    pub(super) const PHONETIC_RUN: QName = QName(b"rPh");
    pub(super) const TEXT: QName = QName(b"t");

    // worksheets
    pub(super) const ROW: QName = QName(b"row");
    pub(super) const CELL: QName = QName(b"c");
    pub(super) const INLINE_STRING: QName = QName(b"is");
    pub(super) const VALUE: QName = QName(b"v");
}

pub(crate) struct XlsxSpreadsheet {
    pub(crate) name: String,
    zip: Package,
    /// Cell type of every `cellXfs` entry
    number_formats: Vec<CellType>,
    /// `(name, part path)` in declared order
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    pub(crate) fn open(file_name: &str, bytes: Bytes) -> Result<XlsxSpreadsheet, DecodeError> {
        let mut zip = open_package(file_name, bytes)?;
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            return Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()).into());
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        debug!(file_name, sheets = sheets.len(), styles = number_formats.len(), "opened xlsx workbook");
        Ok(XlsxSpreadsheet {
            name: file_name.to_owned(),
            zip,
            number_formats,
            sheets,
        })
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// With `indexes`, only the listed items are read and `mappings` points
    /// each of them at its slot in the returned vector.
    fn load_shared_strings(&mut self, mut indexes: Option<HashSet<usize>>) -> Result<(Vec<String>, HashMap<usize, usize>), DecodeError> {
        let mut strings = Vec::<String>::new();
        let mut mappings = HashMap::<usize, usize>::new();
        let Some(mut reader) = self.zip.xml_reader(SHARED_STRINGS_PART)? else {
            return Ok((strings, mappings));
        };

        let mut position = 0usize;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == tag::STRING_ITEM => {
                let wanted = match &mut indexes {
                    Some(keys) => keys.remove(&position),
                    None => true,
                };
                if wanted {
                    let string = read_string_value(&mut reader, tag::STRING_ITEM, false)?;
                    if indexes.is_some() {
                        mappings.insert(position, strings.len());
                    }
                    strings.push(string);
                }
                if indexes.as_ref().is_some_and(HashSet::is_empty) {
                    break;
                }
                position += 1;
            }
        });
        Ok((strings, mappings))
    }

    fn read_sheet(&mut self, index: usize) -> Result<Option<Sheet>, DecodeError> {
        let Some((sheet_name, part)) = self.sheets.get(index).cloned() else {
            return Ok(None);
        };

        let mut sheet = Sheet::new(&sheet_name);
        // Rows and cells may omit `r`; positions then continue from the previous one.
        let (mut next_row, mut next_col) = (0usize, 0usize);
        let mut cell = Cell {
            row: 0,
            col: 0,
            kind: CellType::Number,
            value: String::new(),
        };
        let mut reader = self
            .zip
            .xml_reader(&part)?
            .ok_or_else(|| SpreadsheetError::FileError(part.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == tag::ROW => {
                if let Some(row) = event.get_attribute_value("r")?.filter(|row| !row.is_empty()) {
                    next_row = row_to_index(&row).ok_or_else(|| SpreadsheetError::CellValueError(format!("row {row}"), row.to_string()))?;
                }
                next_col = 0;
            }
            Event::End(event) if event.name() == tag::ROW => {
                next_row = next_row.checked_add(1).ok_or_else(|| out_of_range(next_row, next_col))?;
            }
            Event::Start(event) if event.name() == tag::CELL => {
                (cell.row, cell.col) = match event.get_attribute_value("r")? {
                    Some(reference) if !reference.is_empty() => reference_to_index(&reference)
                        .ok_or_else(|| SpreadsheetError::CellValueError(reference.to_string(), reference.to_string()))?,
                    _ if next_row <= MAX_ROW && next_col <= MAX_COL => (next_row, next_col),
                    _ => return Err(out_of_range(next_row, next_col).into()),
                };
                next_col = cell.col + 1;
                cell.value.clear();
                let style = event.parse_attribute_value::<usize>("s")?;
                cell.kind = cell_type(event.get_attribute_value("t")?.as_deref(), style, &self.number_formats);
            }
            Event::Start(event) if event.name() == tag::INLINE_STRING => {
                cell.value = read_string_value(&mut reader, tag::INLINE_STRING, false)?;
            }
            Event::Start(event) if event.name() == tag::VALUE => {
                cell.value = read_string_value(&mut reader, tag::VALUE, true)?;
            }
            Event::End(event) if event.name() == tag::CELL => {
                sheet.push(Cell {
                    row: cell.row,
                    col: cell.col,
                    kind: cell.kind,
                    value: std::mem::take(&mut cell.value),
                });
            }
        });

        Ok(Some(sheet))
    }
}

fn out_of_range(row: usize, col: usize) -> SpreadsheetError {
    let reference = index_to_reference(row, col);
    SpreadsheetError::CellValueError(reference.clone(), reference)
}

/// Type of a cell from its `t` and `s` attributes. Only plain numbers consult
/// the style, which is how dates are told apart.
fn cell_type(type_attribute: Option<&str>, style: Option<usize>, number_formats: &[CellType]) -> CellType {
    match type_attribute {
        Some("s") => CellType::SharedString,
        Some("inlineStr" | "str") => CellType::InlineString,
        Some("b") => CellType::Boolean,
        Some("d") => CellType::IsoDateTime,
        Some("e") => CellType::Error,
        _ => style
            .and_then(|style| number_formats.get(style).copied())
            .unwrap_or(CellType::Number),
    }
}

/// Reads workbook.xml: worksheets in declared order plus the date system.
fn load_workbook(zip: &mut Package) -> Result<(Vec<(String, String)>, bool), DecodeError> {
    let relationships = worksheet_targets(zip, WORKBOOK_RELATIONSHIPS_PART)?;
    let mut reader = zip
        .xml_reader(WORKBOOK_PART)?
        .ok_or_else(|| SpreadsheetError::FileError(WORKBOOK_PART.to_owned()))?;
    let mut sheets = Vec::<(String, String)>::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == tag::SHEET => {
            // The relationship id is namespaced (`r:id`), so match on local names.
            let mut name = None;
            let mut id = None;
            for attribute in event.attributes() {
                let attribute = attribute?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.get_value()?.into_owned()),
                    b"id" => id = Some(attribute.get_value()?.into_owned()),
                    _ => (),
                }
            }
            if let Some((name, path)) = name.zip(id.and_then(|id| relationships.get(&id))) {
                sheets.push((name, path.to_owned()));
            }
        }
        Event::Start(event) if event.name() == tag::WORKBOOK_PROPERTIES => {
            is_1904 = event
                .get_attribute_value("date1904")?
                .is_some_and(|value| value == "1" || value == "true");
        }
    });
    Ok((sheets, is_1904))
}

/// Reads styles.xml: the cell type implied by every `cellXfs` entry.
fn load_number_formats(zip: &mut Package, is_1904: bool) -> Result<Vec<CellType>, DecodeError> {
    #[derive(PartialEq)]
    enum Section {
        Other,
        NumberFormats,
        CellFormats,
    }

    let Some(mut reader) = zip.xml_reader(STYLES_PART)? else {
        return Ok(Vec::new());
    };
    let mut section = Section::Other;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_ids = Vec::<String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == tag::NUMBER_FORMATS => section = Section::NumberFormats,
        Event::Start(event) if event.name() == tag::CELL_FORMATS => section = Section::CellFormats,
        Event::End(event) if event.name() == tag::NUMBER_FORMATS => section = Section::Other,
        // numFmts always precedes cellXfs, nothing after it matters.
        Event::End(event) if event.name() == tag::CELL_FORMATS => break,
        Event::Start(event) if section == Section::NumberFormats && event.name() == tag::NUMBER_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let code = event.get_attribute_value("formatCode")?;
            if let Some((id, code)) = id.zip(code) {
                custom_formats.insert(id.into_owned(), CellType::parse_custom_number_format(&code, is_1904));
            }
        }
        Event::Start(event) if section == Section::CellFormats && event.name() == tag::CELL_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            format_ids.push(id.map_or_else(|| "0".to_owned(), |id| id.into_owned()));
        }
    });

    Ok(resolve_style_formats(&format_ids, &custom_formats, is_1904))
}

/// Collects the text of a string item up to `end_tag`, leaving out phonetic
/// runs. With `is_text_content` the element's own text counts, otherwise only
/// text inside `<t>`.
fn read_string_value<R: BufRead>(reader: &mut XmlReader<R>, end_tag: QName, is_text_content: bool) -> Result<String, DecodeError> {
    let mut in_phonetic_run = false;
    let mut in_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == tag::PHONETIC_RUN => in_phonetic_run = true,
        Event::End(event) if event.name() == tag::PHONETIC_RUN => in_phonetic_run = false,
        Event::Start(event) if !in_phonetic_run && event.name() == tag::TEXT => in_text = true,
        Event::End(event) if in_text && event.name() == tag::TEXT => in_text = false,
        Event::Text(event) if in_text => text.push_bytes_text(&event)?,
        Event::CData(event) if in_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if in_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
