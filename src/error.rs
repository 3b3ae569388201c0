use thiserror::Error;

/// Aggregated error for everything that can go wrong while turning raw file
/// bytes into a sheet table.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    // Helper module errors
    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    XlsError(#[from] crate::spreadsheet::xls::XlsError),
}

/// Errors surfaced by the bulk import workflow.
///
/// Every variant is recovered at the workflow boundary and handed to the
/// listener as a message; none of them is allowed to escape as a panic.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("unsupported file type '{file_name}', expected one of xlsx, xls, csv")]
    UnsupportedFileType { file_name: String },

    #[error("failed to read '{file_name}': {source}")]
    FileReadError {
        file_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode workbook '{file_name}': {source}")]
    WorkbookDecodeError {
        file_name: String,
        #[source]
        source: DecodeError,
    },

    #[error("upload rejected by server with status {status}")]
    UploadRejected { status: u16, body: String },

    #[error("upload failed: {0}")]
    UploadTransportError(String),
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, DecodeError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| DecodeError::WithContextError(format!("{}: {}", message, e)))
    }
}
