//! Export coordinator for orchestrating export operations
//!
//! Drives the whole pipeline one step at a time: read an index page, derive
//! its keys, retrieve the documents batch by batch, format every document
//! and hand the line to the sink. Nothing is requested before the previous
//! step has finished, so memory stays bounded by one page plus one batch.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SinkError};
use crate::formatter::RowFormatter;
use crate::sink::Sink;
use crate::transport::{ViewClient, ViewRow};

use super::fetcher::BatchFetcher;
use super::paginator::IndexPaginator;
use super::plan::{ExportOptions, ExportPlan};
use super::progress::ProgressTracker;

/// Result of an export operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Index pages read
    pub pages: u64,
    /// Index rows delivered by the paginator
    pub index_rows: u64,
    /// Document retrieval requests
    pub batches: u64,
    /// Documents written to the sink
    pub documents_exported: u64,
    /// Retrieved rows without a document
    pub documents_skipped: u64,
    /// Bytes accepted by the sink
    pub bytes_written: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
    /// Whether the export was cancelled
    pub cancelled: bool,
}

/// Coordinator for export operations
pub struct ExportCoordinator {
    /// Database transport
    client: Arc<dyn ViewClient>,
    /// Validated export plan
    plan: ExportPlan,
    /// Row formatter for output lines
    formatter: Box<dyn RowFormatter>,
    /// Progress tracker for user feedback
    tracker: ProgressTracker,
    /// Whether to write the header line first
    write_header: bool,
    /// Cancellation token for aborting export
    cancel_token: Option<CancellationToken>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(
        client: Arc<dyn ViewClient>,
        plan: ExportPlan,
        formatter: Box<dyn RowFormatter>,
    ) -> Self {
        Self {
            client,
            plan,
            formatter,
            tracker: ProgressTracker::hidden(),
            write_header: true,
            cancel_token: None,
        }
    }

    pub fn with_progress(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Write the header line before any data (only when columns are configured)
    pub fn with_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Execute the export operation
    ///
    /// On success the sink is closed. On failure the error is returned as
    /// raised and the sink is left open; whatever was written stays in place.
    /// A cancelled export closes the sink and reports `cancelled`.
    ///
    /// # Returns
    /// * `Result<ExportSummary>` - Export statistics or error
    pub async fn execute(&self, sink: &mut dyn Sink) -> Result<ExportSummary> {
        let start_time = Instant::now();
        let result = self.run(sink, start_time).await;
        self.tracker.finish();

        match &result {
            Ok(summary) if summary.cancelled => info!(
                "Export cancelled: {} documents, {} bytes, {} ms",
                summary.documents_exported, summary.bytes_written, summary.elapsed_ms
            ),
            Ok(summary) => info!(
                "Export completed: {} documents, {} bytes, {} ms",
                summary.documents_exported, summary.bytes_written, summary.elapsed_ms
            ),
            Err(e) => warn!("Export failed: {}", e),
        }
        result
    }

    async fn run(&self, sink: &mut dyn Sink, start_time: Instant) -> Result<ExportSummary> {
        let mut stats = ExportSummary::default();
        let client = self.client.as_ref();

        info!(
            "Starting export from index {} with documents from {}",
            self.plan.index, self.plan.source
        );

        if self.write_header && self.formatter.columns() > 0 {
            sink.write(&self.formatter.header()).await?;
        }

        let mut pages = IndexPaginator::new(client, &self.plan.index, self.plan.page_size)
            .with_boundary(self.plan.boundary)
            .with_page_delay(self.plan.page_delay);

        loop {
            if self.is_cancelled() {
                return self.finish_cancelled(sink, stats, start_time).await;
            }

            let Some(page) = pages.next_page().await? else {
                break;
            };
            stats.pages += 1;
            stats.index_rows += page.len() as u64;

            let keys = self.plan.key_derivation.derive(&page);
            drop(page);
            debug!("Index page #{} yielded {} keys", stats.pages, keys.len());

            let mut batches =
                BatchFetcher::new(client, &self.plan.source, &keys, self.plan.batch_size);
            loop {
                if self.is_cancelled() {
                    return self.finish_cancelled(sink, stats, start_time).await;
                }

                let Some(rows) = batches.next_batch().await? else {
                    break;
                };
                stats.batches += 1;
                debug!("Received batch of {} rows", rows.len());

                self.write_rows(&rows, sink, &mut stats).await?;
                self.tracker.update(stats.documents_exported, stats.pages);
            }

            if stats.pages % 10 == 0 {
                info!(
                    "Progress: {} documents exported ({} index pages)",
                    stats.documents_exported, stats.pages
                );
            }
        }

        debug!("Closing sink");
        sink.close().await?;

        stats.bytes_written = sink.bytes_written();
        stats.elapsed_ms = start_time.elapsed().as_millis() as u64;
        Ok(stats)
    }

    /// Format and write one batch
    ///
    /// A failed write does not stop the batch: remaining rows are still
    /// formatted and offered to the sink, and the first failure is returned
    /// once the batch is done.
    async fn write_rows(
        &self,
        rows: &[ViewRow],
        sink: &mut dyn Sink,
        stats: &mut ExportSummary,
    ) -> Result<()> {
        let mut failure: Option<SinkError> = None;

        for row in rows {
            let Some(doc) = self.plan.doc_derivation.derive(row) else {
                stats.documents_skipped += 1;
                continue;
            };

            let line = self.formatter.format(&doc);
            match sink.write(&line).await {
                Ok(()) => stats.documents_exported += 1,
                Err(e) => {
                    warn!("Sink write failed: {}", e);
                    failure.get_or_insert(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    async fn finish_cancelled(
        &self,
        sink: &mut dyn Sink,
        mut stats: ExportSummary,
        start_time: Instant,
    ) -> Result<ExportSummary> {
        info!("Export operation cancelled by user");
        sink.close().await?;

        stats.bytes_written = sink.bytes_written();
        stats.elapsed_ms = start_time.elapsed().as_millis() as u64;
        stats.cancelled = true;
        Ok(stats)
    }
}

/// Run a complete export
///
/// Validates `options` before any I/O, then streams every exported document
/// through `formatter` into `sink`, writing the header first when columns
/// are configured.
pub async fn export(
    client: Arc<dyn ViewClient>,
    options: &ExportOptions,
    formatter: Box<dyn RowFormatter>,
    sink: &mut dyn Sink,
) -> Result<ExportSummary> {
    let plan = ExportPlan::from_options(options)?;
    ExportCoordinator::new(client, plan, formatter)
        .execute(sink)
        .await
}
