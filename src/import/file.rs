//! Files handed to the import workflow, either on disk or already in memory.

use crate::error::ImportError;
use crate::import::kind::FileKind;
use bytes::Bytes;
use std::path::Path;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum FileSource {
    /// Read with `tokio::fs` when ingested
    Local(PathBuf),
    Memory(Bytes),
}

/// A file the user picked for import.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    name: String,
    source: FileSource,
}

impl SelectedFile {
    /// The name is the last path component; the file is not touched yet.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            name,
            source: FileSource::Local(path.to_path_buf()),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Memory(bytes.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_file_name(&self.name)
    }

    /// Reads the whole file.
    pub async fn read(&self) -> Result<Bytes, ImportError> {
        match &self.source {
            FileSource::Local(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|source| ImportError::FileReadError {
                    file_name: self.name.to_owned(),
                    source,
                }),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_come_from_the_last_path_component() {
        let file = SelectedFile::from_path("/tmp/uploads/Items.XLSX");
        assert_eq!(file.name(), "Items.XLSX");
        assert_eq!(file.kind(), FileKind::Xlsx);
    }

    #[tokio::test]
    async fn reads_memory_and_disk() {
        let file = SelectedFile::from_bytes("items.csv", &b"id\n1\n"[..]);
        assert_eq!(file.read().await.unwrap(), Bytes::from_static(b"id\n1\n"));

        let path = std::env::temp_dir().join(format!("rusty_catalog_file_{}.csv", std::process::id()));
        tokio::fs::write(&path, b"id\n2\n").await.unwrap();
        let file = SelectedFile::from_path(&path);
        assert_eq!(file.read().await.unwrap(), Bytes::from_static(b"id\n2\n"));
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let file = SelectedFile::from_path("/definitely/not/here/items.csv");
        assert!(matches!(file.read().await, Err(ImportError::FileReadError { .. })));
    }
}
