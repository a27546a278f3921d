//! Output destinations for exported lines
//!
//! A [`Sink`] accepts formatted lines in order and is closed exactly once
//! when the export finishes. Writes may suspend while the destination
//! applies backpressure.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::error::SinkError;

pub mod writer;

pub use writer::{FileSink, WriterSink};

/// Append-only output destination
#[async_trait]
pub trait Sink: Send {
    /// Append one chunk of output
    ///
    /// # Arguments
    /// * `chunk` - Formatted text, usually one line
    async fn write(&mut self, chunk: &str) -> Result<(), SinkError>;

    /// Flush and finalize the destination; any later call fails
    async fn close(&mut self) -> Result<(), SinkError>;

    /// Bytes accepted so far
    fn bytes_written(&self) -> u64;
}

/// Helper function to create a buffered file writer
///
/// # Arguments
/// * `path` - File path to create (truncated if it exists)
///
/// # Returns
/// * `Result<BufWriter<File>, SinkError>` - Buffered writer or error
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>, SinkError> {
    validate_path(path)?;
    let file = File::create(path).await?;
    Ok(BufWriter::with_capacity(8 * 1024 * 1024, file)) // 8MB buffer
}

/// Check that the parent directory of `path` exists
pub(crate) fn validate_path(path: &Path) -> Result<(), SinkError> {
    if path.as_os_str().is_empty() {
        return Err(SinkError::InvalidPath("empty path".to_string()));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(SinkError::InvalidPath(format!(
                "Directory does not exist: {}",
                parent.display()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path(Path::new("out.csv")).is_ok());
        assert!(matches!(
            validate_path(Path::new("/definitely/not/here/out.csv")),
            Err(SinkError::InvalidPath(_))
        ));
        assert!(validate_path(Path::new("")).is_err());
    }

    #[test]
    fn test_sink_trait_object() {
        fn _accepts_sink(_sink: Box<dyn Sink>) {}
    }
}
