//! Multipart upload of the original import file.

use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::import::pipeline::ParsedFile;
use bytes::Bytes;
use reqwest::multipart::Form;
use reqwest::multipart::Part;
use reqwest::Body;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

/// What goes over the wire: the untouched file bytes under one form field.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub file_name: String,
    pub field_name: String,
    pub mime_type: &'static str,
    pub bytes: Bytes,
}

impl UploadPayload {
    pub fn from_parsed(parsed: &ParsedFile, field_name: &str) -> Self {
        Self {
            file_name: parsed.file_name.to_owned(),
            field_name: field_name.to_owned(),
            mime_type: parsed.kind.mime_type(),
            bytes: parsed.bytes.clone(),
        }
    }

    pub fn descriptor(&self) -> UploadDescriptor {
        UploadDescriptor {
            file_name: self.file_name.to_owned(),
            field_name: self.field_name.to_owned(),
            size: self.bytes.len(),
        }
    }
}

/// Handed to the success callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadDescriptor {
    pub file_name: String,
    pub field_name: String,
    pub size: usize,
}

/// The server's answer to a committed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub status: u16,
    pub message: Option<String>,
    pub processed: Option<u64>,
}

#[derive(Deserialize, Default)]
struct ReceiptBody {
    #[serde(alias = "mensaje")]
    message: Option<String>,
    #[serde(alias = "procesados")]
    processed: Option<u64>,
}

/// Classifies a finished HTTP exchange. Only 2xx commits; a 2xx body that
/// is not a JSON receipt still commits, with nothing but the status.
pub fn interpret_response(status: u16, body: &str) -> Result<UploadReceipt, ImportError> {
    if !(200..300).contains(&status) {
        return Err(ImportError::UploadRejected {
            status,
            body: body.to_owned(),
        });
    }
    let receipt: ReceiptBody = serde_json::from_str(body).unwrap_or_else(|error| {
        debug!(status, %error, "upload response is not a receipt");
        ReceiptBody::default()
    });
    Ok(UploadReceipt {
        status,
        message: receipt.message,
        processed: receipt.processed,
    })
}

/// Sends an upload payload somewhere.
#[allow(async_fn_in_trait)]
pub trait Uploader {
    async fn upload(&self, payload: &UploadPayload) -> Result<UploadReceipt, ImportError>;
}

/// `multipart/form-data` POST to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    url: String,
}

impl HttpUploader {
    pub fn new(config: &ImportConfig) -> Result<Self, ImportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let client = builder.build().map_err(transport_error)?;
        Ok(Self {
            client,
            url: config.upload_url.to_owned(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Uploader for HttpUploader {
    async fn upload(&self, payload: &UploadPayload) -> Result<UploadReceipt, ImportError> {
        let part = Part::stream_with_length(Body::from(payload.bytes.clone()), payload.bytes.len() as u64)
            .file_name(payload.file_name.to_owned())
            .mime_str(payload.mime_type)
            .map_err(transport_error)?;
        let form = Form::new().part(payload.field_name.to_owned(), part);

        debug!(url = %self.url, file_name = %payload.file_name, size = payload.bytes.len(), "uploading import file");
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_else(|error| {
            debug!(status, %error, "failed to read upload response body");
            String::new()
        });
        interpret_response(status, &body)
    }
}

fn transport_error(error: reqwest::Error) -> ImportError {
    warn!(%error, "upload transport failure");
    ImportError::UploadTransportError(error.to_string())
}
