//! Sink over any async writer
//!
//! [`WriterSink`] buffers writes into an [`AsyncWrite`] and flushes and
//! shuts it down on close. [`FileSink`] is the file-backed variant used for
//! export files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter, Stdout};
use tracing::{debug, info};

use crate::error::SinkError;

use super::{Sink, create_writer};

/// Sink writing into an async writer
pub struct WriterSink<W> {
    /// Underlying writer, `None` once closed
    writer: Option<W>,
    /// Label for log lines
    label: String,
    /// Bytes accepted so far
    written: u64,
    /// Chunks accepted so far
    chunks: u64,
}

/// Sink writing to a file on disk
pub type FileSink = WriterSink<BufWriter<File>>;

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    /// Wrap a writer
    ///
    /// # Arguments
    /// * `writer` - Destination writer
    /// * `label` - Name used in log lines
    pub fn new(writer: W, label: impl Into<String>) -> Self {
        Self {
            writer: Some(writer),
            label: label.into(),
            written: 0,
            chunks: 0,
        }
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

impl WriterSink<BufWriter<File>> {
    /// Create (or truncate) the file at `path`
    ///
    /// # Returns
    /// * `Result<Self, SinkError>` - New sink or error
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let writer = create_writer(&path).await?;
        info!("Start streaming file {}", path.display());
        Ok(Self::new(writer, path.display().to_string()))
    }
}

impl WriterSink<BufWriter<Stdout>> {
    /// Sink writing to standard output
    pub fn stdout() -> Self {
        Self::new(BufWriter::new(tokio::io::stdout()), "<stdout>")
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Sink for WriterSink<W> {
    async fn write(&mut self, chunk: &str) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        writer.write_all(chunk.as_bytes()).await?;
        self.written += chunk.len() as u64;
        self.chunks += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        let mut writer = self.writer.take().ok_or(SinkError::Closed)?;
        writer.flush().await?;
        writer.shutdown().await?;
        debug!("Closed sink {} ({} chunks)", self.label, self.chunks);
        info!("Finish streaming {} ({} bytes)", self.label, self.written);
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    #[tokio::test]
    async fn test_file_sink_writes_in_order() {
        let path = std::env::temp_dir().join("couchexport_sink_order.csv");
        let mut sink = FileSink::create(&path).await.unwrap();

        sink.write("\"a\"\n").await.unwrap();
        sink.write("\"b\"\n").await.unwrap();
        sink.write("\"c\"\n").await.unwrap();
        sink.close().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "\"a\"\n\"b\"\n\"c\"\n");
        assert_eq!(sink.bytes_written(), content.len() as u64);

        fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_closed_sink_rejects_calls() {
        let mut sink = WriterSink::new(Vec::<u8>::new(), "memory");
        sink.write("x").await.unwrap();
        sink.close().await.unwrap();

        assert!(sink.is_closed());
        assert!(matches!(sink.write("y").await, Err(SinkError::Closed)));
        assert!(matches!(sink.close().await, Err(SinkError::Closed)));
        assert_eq!(sink.bytes_written(), 1);
    }

    #[tokio::test]
    async fn test_file_sink_truncates_existing() {
        let path = std::env::temp_dir().join("couchexport_sink_truncate.csv");
        fs::write(&path, "old content that is long").await.unwrap();

        let mut sink = FileSink::create(&path).await.unwrap();
        sink.write("new\n").await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "new\n");
        fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_missing_directory_rejected() {
        let result = FileSink::create("/no/such/dir/out.csv").await;
        assert!(matches!(result, Err(SinkError::InvalidPath(_))));
    }
}
