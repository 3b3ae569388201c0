//! Validate, read, decode, convert: one selected file in, typed records out.

use crate::error::ImportError;
use crate::import::file::SelectedFile;
use crate::import::kind::FileKind;
use crate::import::record::ImportRecord;
use crate::spreadsheet::decode_first_sheet;
use bytes::Bytes;
use tracing::debug;
use tracing::warn;

/// A file that went through the whole pipeline.
///
/// `bytes` is the original content, kept so the upload re-sends exactly what
/// was previewed.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file_name: String,
    pub kind: FileKind,
    pub bytes: Bytes,
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub records: Vec<ImportRecord>,
}

/// Checks the extension before anything is read.
pub fn validate(file: &SelectedFile) -> Result<FileKind, ImportError> {
    let kind = file.kind();
    if kind.is_supported() {
        Ok(kind)
    } else {
        warn!(file_name = file.name(), "rejected file with unsupported extension");
        Err(ImportError::UnsupportedFileType {
            file_name: file.name().to_owned(),
        })
    }
}

/// Runs the full pipeline for one file.
pub async fn ingest(file: &SelectedFile) -> Result<ParsedFile, ImportError> {
    let kind = validate(file)?;
    let bytes = file.read().await?;
    parse_bytes(file.name(), kind, bytes)
}

/// Decodes already read bytes and converts the first sheet into records.
pub fn parse_bytes(file_name: &str, kind: FileKind, bytes: Bytes) -> Result<ParsedFile, ImportError> {
    let table = decode_first_sheet(kind, file_name, bytes.clone()).map_err(|source| {
        warn!(file_name, error = %source, "failed to decode workbook");
        ImportError::WorkbookDecodeError {
            file_name: file_name.to_owned(),
            source,
        }
    })?;
    let records: Vec<ImportRecord> = table.records().map(ImportRecord::from_fields).collect();
    debug!(file_name, sheet = %table.sheet_name, records = records.len(), "converted sheet to records");

    Ok(ParsedFile {
        file_name: file_name.to_owned(),
        kind,
        bytes,
        sheet_name: table.sheet_name,
        headers: table.headers,
        records,
    })
}
