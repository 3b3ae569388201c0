//! The bulk import workflow: select a file, preview it, upload it.
//!
//! Selection and submission are both split in three steps so the caller
//! decides where the awaiting happens:
//!
//! - [`BulkImportWorkflow::begin_selection`] validates synchronously and hands
//!   out a [`SelectionTicket`] tagged with a generation number,
//! - [`SelectionTicket::ingest`] reads and decodes without touching the
//!   workflow,
//! - [`BulkImportWorkflow::finish_selection`] applies the result, unless a
//!   newer selection or a cancel happened in between.
//!
//! [`BulkImportWorkflow::select_file`] and [`BulkImportWorkflow::submit`]
//! compose the steps for callers that await in place.

use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::import::file::SelectedFile;
use crate::import::pipeline;
use crate::import::pipeline::ParsedFile;
use crate::import::record::preview_columns;
use crate::import::record::ImportRecord;
use crate::import::upload::UploadDescriptor;
use crate::import::upload::UploadPayload;
use crate::import::upload::UploadReceipt;
use crate::import::upload::Uploader;
use crate::table::DerivedPage;
use crate::table::PageNavigation;
use crate::table::Table;
use crate::table::TableError;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Receives the outcome of the workflow.
pub trait ImportListener {
    fn on_committed(&mut self, descriptor: &UploadDescriptor, receipt: &UploadReceipt);

    fn on_error(&mut self, message: &str);
}

/// An [`ImportListener`] made of two closures.
pub struct FnListener<C, E> {
    on_committed: C,
    on_error: E,
}

impl<C, E> FnListener<C, E>
where
    C: FnMut(&UploadDescriptor, &UploadReceipt),
    E: FnMut(&str),
{
    pub fn new(on_committed: C, on_error: E) -> Self {
        Self { on_committed, on_error }
    }
}

impl<C, E> ImportListener for FnListener<C, E>
where
    C: FnMut(&UploadDescriptor, &UploadReceipt),
    E: FnMut(&str),
{
    fn on_committed(&mut self, descriptor: &UploadDescriptor, receipt: &UploadReceipt) {
        (self.on_committed)(descriptor, receipt)
    }

    fn on_error(&mut self, message: &str) {
        (self.on_error)(message)
    }
}

/// A validated selection waiting to be read and decoded.
#[derive(Debug)]
pub struct SelectionTicket {
    generation: u64,
    file: SelectedFile,
}

impl SelectionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }

    pub async fn ingest(self) -> SelectionResult {
        let result = pipeline::ingest(&self.file).await;
        SelectionResult {
            generation: self.generation,
            result,
        }
    }
}

/// The outcome of [`SelectionTicket::ingest`], tagged with its generation.
#[derive(Debug)]
pub struct SelectionResult {
    generation: u64,
    result: Result<ParsedFile, ImportError>,
}

impl SelectionResult {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Committed(UploadReceipt),
    /// The message passed to [`ImportListener::on_error`]
    Failed(String),
    /// Nothing to submit, or the submission was cancelled meanwhile
    NotReady,
}

pub struct BulkImportWorkflow<U, L> {
    config: ImportConfig,
    uploader: U,
    listener: L,
    generation: u64,
    pending: Option<u64>,
    staged: Option<ParsedFile>,
    preview: Table<ImportRecord>,
    /// The upload in flight, as announced to the listener once it settles.
    submitting: Option<UploadDescriptor>,
    open: bool,
}

impl<U: Uploader, L: ImportListener> BulkImportWorkflow<U, L> {
    pub fn new(config: ImportConfig, uploader: U, listener: L) -> Result<Self, TableError> {
        let preview = Table::new(preview_columns()?, config.page_size)?;
        Ok(Self {
            config,
            uploader,
            listener,
            generation: 0,
            pending: None,
            staged: None,
            preview,
            submitting: None,
            open: true,
        })
    }

    /// Starts a new selection. Older selections still in flight become stale.
    ///
    /// A file with an unsupported extension is reported right away, clears
    /// the staged file and yields no ticket. While an upload is in flight the
    /// staged file is locked and no ticket is issued either.
    pub fn begin_selection(&mut self, file: SelectedFile) -> Option<SelectionTicket> {
        if self.submitting.is_some() {
            debug!(file_name = file.name(), "selection ignored while an upload is in flight");
            return None;
        }
        self.generation += 1;
        self.open = true;
        self.clear_staged();
        match pipeline::validate(&file) {
            Ok(kind) => {
                debug!(file_name = file.name(), %kind, generation = self.generation, "selection accepted");
                self.pending = Some(self.generation);
                Some(SelectionTicket {
                    generation: self.generation,
                    file,
                })
            }
            Err(error) => {
                self.pending = None;
                self.listener.on_error(&error.to_string());
                None
            }
        }
    }

    /// Applies a finished selection. Returns `false` when the result was stale
    /// and got discarded.
    pub fn finish_selection(&mut self, selection: SelectionResult) -> bool {
        if self.pending != Some(selection.generation) {
            debug!(
                generation = selection.generation,
                current = self.generation,
                "discarding stale selection result"
            );
            return false;
        }
        self.pending = None;

        match selection.result {
            Ok(parsed) => {
                info!(
                    file_name = %parsed.file_name,
                    sheet = %parsed.sheet_name,
                    records = parsed.records.len(),
                    "import file staged"
                );
                self.preview.set_rows(parsed.records.clone());
                self.staged = Some(parsed);
            }
            Err(error) => {
                warn!(%error, "import file rejected");
                self.clear_staged();
                self.listener.on_error(&error.to_string());
            }
        }
        true
    }

    /// Selects, reads and decodes a file in one go.
    pub async fn select_file(&mut self, file: SelectedFile) -> bool {
        match self.begin_selection(file) {
            Some(ticket) => {
                let selection = ticket.ingest().await;
                self.finish_selection(selection)
            }
            None => false,
        }
    }

    pub fn can_submit(&self) -> bool {
        self.open && self.staged.is_some() && self.pending.is_none() && self.submitting.is_none()
    }

    /// Packages the staged file for upload and marks the submission in flight.
    pub fn begin_submit(&mut self) -> Option<UploadPayload> {
        if !self.can_submit() {
            return None;
        }
        let payload = UploadPayload::from_parsed(self.staged.as_ref()?, &self.config.file_field);
        self.submitting = Some(payload.descriptor());
        Some(payload)
    }

    /// Applies the upload result. Success closes the workflow, failure keeps
    /// the staged file so the user can retry or cancel.
    pub fn finish_submit(&mut self, result: Result<UploadReceipt, ImportError>) -> SubmitOutcome {
        let Some(descriptor) = self.submitting.take() else {
            debug!("discarding upload result of a cancelled submission");
            return SubmitOutcome::NotReady;
        };
        match result {
            Ok(receipt) => {
                info!(file_name = %descriptor.file_name, status = receipt.status, "import file uploaded");
                self.listener.on_committed(&descriptor, &receipt);
                self.close();
                SubmitOutcome::Committed(receipt)
            }
            Err(error) => {
                warn!(file_name = %descriptor.file_name, %error, "import upload failed");
                let message = error.to_string();
                self.listener.on_error(&message);
                SubmitOutcome::Failed(message)
            }
        }
    }

    pub async fn submit(&mut self) -> SubmitOutcome {
        let Some(payload) = self.begin_submit() else {
            return SubmitOutcome::NotReady;
        };
        let result = self.uploader.upload(&payload).await;
        self.finish_submit(result)
    }

    /// Closes the workflow, drops its state and invalidates every selection
    /// and submission in flight.
    pub fn cancel(&mut self) {
        debug!(generation = self.generation, "import cancelled");
        self.close();
    }

    pub fn reopen(&mut self) {
        self.open = true;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.is_some()
    }

    pub fn staged(&self) -> Option<&ParsedFile> {
        self.staged.as_ref()
    }

    pub fn preview(&self) -> &Table<ImportRecord> {
        &self.preview
    }

    pub fn preview_page(&self) -> DerivedPage<'_, ImportRecord> {
        self.preview.page()
    }

    pub fn navigate_preview(&mut self, navigation: PageNavigation) -> bool {
        self.preview.navigate(navigation)
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    fn clear_staged(&mut self) {
        self.staged = None;
        self.preview.clear();
    }

    fn close(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.submitting = None;
        self.open = false;
        self.clear_staged();
    }
}
