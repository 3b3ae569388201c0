//! Settings of the bulk import workflow.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_UPLOAD_URL: &str = "http://localhost:8000/api/v1/upload/";
pub const DEFAULT_FILE_FIELD: &str = "file";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid upload url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Page size must be positive")]
    InvalidPageSize,

    #[error("Multipart field name must not be empty")]
    EmptyFieldName,

    #[error("{0}")]
    ParseError(#[from] toml::de::Error),
}

/// Where and how import files are uploaded, and how the preview is paged.
///
/// Every key is optional in TOML:
///
/// ```toml
/// upload_url = "https://catalog.example.com/api/v1/upload/"
/// file_field = "file"
/// page_size = 10
/// request_timeout_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub upload_url: String,
    pub file_field: String,
    pub page_size: usize,
    /// `None` or `0` disables the request timeout
    pub request_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            upload_url: DEFAULT_UPLOAD_URL.to_owned(),
            file_field: DEFAULT_FILE_FIELD.to_owned(),
            page_size: crate::table::DEFAULT_PAGE_SIZE,
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: Some(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned()),
        }
    }
}

impl ImportConfig {
    pub fn with_upload_url(mut self, upload_url: impl Into<String>) -> Self {
        self.upload_url = upload_url.into();
        self
    }

    pub fn with_file_field(mut self, file_field: impl Into<String>) -> Self {
        self.file_field = file_field.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the request timeout, rounded up to whole seconds so a short
    /// timeout never turns into no time at all.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_secs = timeout
            .filter(|timeout| !timeout.is_zero())
            .map(|timeout| timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0));
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.filter(|&secs| secs > 0).map(Duration::from_secs)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ImportConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file and validates it.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read import config '{}'", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid import config '{}'", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.upload_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.upload_url.to_owned(),
            source,
        })?;
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        if self.file_field.trim().is_empty() {
            return Err(ConfigError::EmptyFieldName);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ImportConfig::default();
        assert_eq!(config.upload_url, "http://localhost:8000/api/v1/upload/");
        assert_eq!(config.file_field, "file");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ImportConfig::from_toml_str("page_size = 25\nfile_field = \"upload\"\n").unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.file_field, "upload");
        assert_eq!(config.upload_url, DEFAULT_UPLOAD_URL);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            ImportConfig::from_toml_str("upload_url = \"not a url\""),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(ImportConfig::from_toml_str("page_size = 0"), Err(ConfigError::InvalidPageSize)));
        assert!(matches!(ImportConfig::from_toml_str("file_field = \" \""), Err(ConfigError::EmptyFieldName)));
        assert!(matches!(ImportConfig::from_toml_str("page_size = \"ten\""), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn load_reports_the_path() {
        let error = ImportConfig::load("/nowhere/import.toml").unwrap_err();
        assert!(error.to_string().contains("/nowhere/import.toml"));
    }

    #[test]
    fn sub_second_timeouts_round_up() {
        let config = ImportConfig::default().with_request_timeout(Some(Duration::from_millis(500)));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(1)));

        let config = ImportConfig::default().with_request_timeout(Some(Duration::from_millis(2_001)));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(3)));

        let config = ImportConfig::default().with_request_timeout(Some(Duration::from_secs(5)));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_timeout_disables_it() {
        assert_eq!(ImportConfig::default().with_request_timeout(Some(Duration::ZERO)).request_timeout(), None);
        assert_eq!(ImportConfig::from_toml_str("request_timeout_secs = 0").unwrap().request_timeout(), None);
    }

    #[test]
    fn builder_disables_timeout() {
        let config = ImportConfig::default().with_request_timeout(None).with_page_size(5);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.page_size, 5);
    }
}
