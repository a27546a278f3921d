//! Error handling for export operations.
//!
//! Every failure the pipeline can produce is one of four kinds:
//! - [`TransportError`]: an index query or document retrieval failed
//! - [`SinkError`]: the output destination rejected a write or close
//! - [`ConfigError`]: the export was misconfigured, detected before any I/O
//! - I/O errors raised outside of the sink (config file reads and the like)
//!
//! # Example
//!
//! ```rust,no_run
//! use couchexport::error::{ExportError, Result, TransportError};
//!
//! fn check(result: Result<()>) {
//!     if let Err(ExportError::Transport(TransportError::QueryFailed { target, .. })) = result {
//!         eprintln!("query against {target} failed");
//!     }
//! }
//! ```

pub mod kinds;

pub use kinds::{ConfigError, ExportError, Result, SinkError, TransportError};
