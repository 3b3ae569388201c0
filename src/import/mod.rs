//! Bulk import of catalog spreadsheets.
//!
//! A [`SelectedFile`] goes through [`pipeline`] (extension check, read,
//! decode, record conversion) and is previewed in a paginated table owned by
//! a [`BulkImportWorkflow`]; on confirmation the original bytes are uploaded
//! by an [`Uploader`].

pub mod file;
pub mod kind;
pub mod pipeline;
pub mod record;
pub mod upload;
pub mod workflow;

pub use file::FileSource;
pub use file::SelectedFile;
pub use kind::FileKind;
pub use kind::ACCEPTED_EXTENSIONS;
pub use pipeline::ParsedFile;
pub use record::preview_columns;
pub use record::ImportRecord;
pub use upload::HttpUploader;
pub use upload::UploadDescriptor;
pub use upload::UploadPayload;
pub use upload::UploadReceipt;
pub use upload::Uploader;
pub use workflow::BulkImportWorkflow;
pub use workflow::FnListener;
pub use workflow::ImportListener;
pub use workflow::SelectionResult;
pub use workflow::SelectionTicket;
pub use workflow::SubmitOutcome;
