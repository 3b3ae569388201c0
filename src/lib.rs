//! # Rusty Catalog
//!
//! A paginated table engine and a spreadsheet bulk import workflow for priced
//! item catalogs.
//!
//! ## Features
//!
//! - **Generic tables**: [`table::Table`] pages any row type through declared
//!   [`table::Column`]s, with first/previous/next/last navigation and a
//!   `"showing K of N"` summary
//! - **Spreadsheet decoding**: `.csv`, `.xlsx` and `.xls` files are read into
//!   natively typed cells, first sheet only, first row as headers
//! - **Bulk import**: [`import::BulkImportWorkflow`] validates a selected file,
//!   previews its records and uploads the original bytes as
//!   `multipart/form-data`; stale selections are discarded, last one wins
//! - **Configuration**: [`config::ImportConfig`] from TOML or builder setters
//!
//! ## Example
//!
//! ```no_run
//! use rusty_catalog::config::ImportConfig;
//! use rusty_catalog::import::{BulkImportWorkflow, FnListener, HttpUploader, SelectedFile};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ImportConfig::default();
//! let uploader = HttpUploader::new(&config)?;
//! let listener = FnListener::new(
//!     |descriptor: &_, _receipt: &_| println!("uploaded {descriptor:?}"),
//!     |message: &str| eprintln!("{message}"),
//! );
//! let mut workflow = BulkImportWorkflow::new(config, uploader, listener)?;
//! if workflow.select_file(SelectedFile::from_path("catalog.xlsx")).await {
//!     println!("{}", workflow.preview_page().summary());
//!     workflow.submit().await;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The crate logs through `tracing` and installs no subscriber.

pub mod config;
pub mod error;
pub(crate) mod helpers;
pub mod import;
pub mod spreadsheet;
pub mod table;
