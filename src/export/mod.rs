//! Paginated, memory-bounded export pipeline
//!
//! # Architecture
//!
//! 1. **IndexPaginator**: reads the index view page by page with a (key, id) cursor
//! 2. **KeyDerivation**: turns each page into the keys of the documents to export
//! 3. **BatchFetcher**: retrieves those documents in bounded, strictly sequential batches
//! 4. **DocDerivation**: picks the document out of every retrieved row
//!
//! These are orchestrated by the **ExportCoordinator**, which formats every
//! document with a [`RowFormatter`](crate::formatter::RowFormatter) and
//! streams the lines into a [`Sink`](crate::sink::Sink).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use couchexport::export::{export, DocsOptions, ExportOptions, IndexOptions};
//! use couchexport::formatter::{Column, OutputFormat};
//! use couchexport::sink::FileSink;
//! use couchexport::transport::MongoTransport;
//!
//! # async fn run() -> couchexport::Result<()> {
//! let client = MongoTransport::connect("mongodb://localhost:27017", "docs").await?;
//! let options = ExportOptions {
//!     index: IndexOptions::new("people", "index", "by_name"),
//!     docs: DocsOptions::direct("people"),
//! };
//! let formatter = OutputFormat::Csv.formatter(vec![Column::pointer("Name", "/name")]);
//! let mut sink = FileSink::create("people.csv").await?;
//! let summary = export(Arc::new(client), &options, formatter, &mut sink).await?;
//! println!("{} documents", summary.documents_exported);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod derive;
pub mod fetcher;
pub mod paginator;
pub mod plan;
pub mod progress;

pub use coordinator::{ExportCoordinator, ExportSummary, export};
pub use derive::{DocDerivation, KeyDerivation};
pub use fetcher::BatchFetcher;
pub use paginator::{IndexPaginator, PageBoundary};
pub use plan::{DEFAULT_FETCH_SIZE, DocsOptions, ExportOptions, ExportPlan, IndexOptions};
pub use progress::ProgressTracker;
