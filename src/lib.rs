//! couchexport library
//!
//! Exports every document referenced by a database index view into a
//! delimited text file, one page of the index and one batch of documents
//! at a time.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Pagination, batch retrieval and the export coordinator
//! - `formatter`: Delimited row formatting
//! - `sink`: Output destinations
//! - `transport`: View queries against the database
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use couchexport::export::{DocsOptions, ExportOptions, IndexOptions};
//! use couchexport::formatter::OutputFormat;
//! use couchexport::sink::FileSink;
//! use couchexport::transport::MongoTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MongoTransport::connect("mongodb://localhost:27017", "docs").await?;
//!     let options = ExportOptions {
//!         index: IndexOptions::new("orders", "reports", "by_date"),
//!         docs: DocsOptions::direct("orders"),
//!     };
//!     let mut sink = FileSink::create("orders.csv").await?;
//!     let summary = couchexport::export(
//!         Arc::new(client),
//!         &options,
//!         OutputFormat::Csv.formatter(Vec::new()),
//!         &mut sink,
//!     )
//!     .await?;
//!     println!("Exported {} documents", summary.documents_exported);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod formatter;
pub mod sink;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, Result};
pub use export::{ExportCoordinator, ExportOptions, ExportSummary, export};
pub use formatter::{Column, OutputFormat, RowFormatter};
pub use sink::Sink;
pub use transport::ViewClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
