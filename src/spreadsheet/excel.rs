//! Pieces shared by the two Excel readers: OOXML package opening and the
//! style index to cell type resolution that both file formats need.

use crate::error::DecodeError;
use crate::helpers::cfb::Cfb;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use bytes::Bytes;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::Cursor;
use zip::ZipArchive;

const RELATIONSHIP: &[u8] = b"Relationship";
const WORKSHEET_RELATIONSHIP_SUFFIX: &str = "/worksheet";

/// An OOXML package held in memory.
pub(super) type Package = ZipArchive<Cursor<Bytes>>;

/// Opens the zip container of an .xlsx upload.
///
/// Password protected workbooks arrive as a compound file holding an
/// `EncryptedPackage` stream and are reported as such instead of as a bad zip.
pub(super) fn open_package(file_name: &str, bytes: Bytes) -> Result<Package, DecodeError> {
    if is_encrypted_package(&bytes) {
        return Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()).into());
    }
    Ok(ZipArchive::new(Cursor::new(bytes))?)
}

fn is_encrypted_package(bytes: &[u8]) -> bool {
    Cfb::is_compound_file(bytes) && Cfb::new(bytes).is_ok_and(|cfb| cfb.exists("EncryptedPackage"))
}

/// Reads a `.rels` part and maps each worksheet relationship id to its part path.
pub(super) fn worksheet_targets(zip: &mut Package, rels_part: &str) -> Result<HashMap<String, String>, DecodeError> {
    let mut reader = zip
        .xml_reader(rels_part)?
        .ok_or_else(|| SpreadsheetError::FileError(rels_part.to_owned()))?;
    let mut targets = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == RELATIONSHIP => {
            // Some writers omit Type; treat those as worksheets too.
            let is_worksheet = event
                .get_attribute_value("Type")?
                .map_or(true, |kind| kind.ends_with(WORKSHEET_RELATIONSHIP_SUFFIX));
            if !is_worksheet {
                continue;
            }
            if let (Some(id), Some(target)) = (event.get_attribute_value("Id")?, event.get_attribute_value("Target")?) {
                targets.insert(id.into_owned(), part_path(&target));
            }
        }
    });
    Ok(targets)
}

/// Resolves the `numFmtId` of every cell format record into a cell type.
/// Ids without a custom definition fall back to the built-in table, then to
/// plain numbers.
pub(super) fn resolve_style_formats(format_ids: &[String], custom: &HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    let resolve = |id: &String| match custom.get(id) {
        Some(kind) => *kind,
        None => CellType::parse_builtin_number_format_id(id, is_1904).unwrap_or(CellType::Number),
    };
    format_ids.iter().map(resolve).collect()
}

/// Turns a relationship target, relative to `xl/` or absolute, into an archive path.
pub(super) fn part_path(target: &str) -> String {
    let relative = target.trim_start_matches('/');
    if relative.starts_with("xl/") {
        relative.to_owned()
    } else {
        format!("xl/{relative}")
    }
}
