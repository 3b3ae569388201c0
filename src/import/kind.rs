//! File type dispatch, resolved once when a file is selected.

use std::fmt;
use std::fmt::Display;

/// Extensions accepted for bulk import, lowercase.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xls"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Csv,
    Xlsx,
    Xls,
    Unsupported,
}

impl FileKind {
    /// Classifies a file by the suffix after its last dot, ignoring case.
    pub fn from_file_name(file_name: &str) -> Self {
        let extension = match file_name.rsplit_once('.') {
            Some((_, extension)) => extension.to_ascii_lowercase(),
            None => return FileKind::Unsupported,
        };
        match extension.as_str() {
            "csv" => FileKind::Csv,
            "xlsx" => FileKind::Xlsx,
            "xls" => FileKind::Xls,
            _ => FileKind::Unsupported,
        }
    }

    pub fn is_supported(&self) -> bool {
        *self != FileKind::Unsupported
    }

    /// MIME type sent with the multipart upload.
    pub fn mime_type(&self) -> &'static str {
        match self {
            FileKind::Csv => "text/csv",
            FileKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            FileKind::Xls => "application/vnd.ms-excel",
            FileKind::Unsupported => "application/octet-stream",
        }
    }
}

impl Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::Csv => "csv",
            FileKind::Xlsx => "xlsx",
            FileKind::Xls => "xls",
            FileKind::Unsupported => "unsupported",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_extensions() {
        assert_eq!(FileKind::from_file_name("items.csv"), FileKind::Csv);
        assert_eq!(FileKind::from_file_name("ITEMS.XLSX"), FileKind::Xlsx);
        assert_eq!(FileKind::from_file_name("archive.2023.Xls"), FileKind::Xls);
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(FileKind::from_file_name("report.txt"), FileKind::Unsupported);
        assert_eq!(FileKind::from_file_name("items.csv.bak"), FileKind::Unsupported);
        assert_eq!(FileKind::from_file_name("csv"), FileKind::Unsupported);
        assert_eq!(FileKind::from_file_name("items."), FileKind::Unsupported);
        assert!(!FileKind::Unsupported.is_supported());
    }

    #[test]
    fn accepted_extensions_round_trip() {
        for extension in ACCEPTED_EXTENSIONS {
            let kind = FileKind::from_file_name(&format!("file.{extension}"));
            assert_eq!(kind.to_string(), extension);
        }
    }
}
