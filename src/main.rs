//! couchexport command-line tool
//!
//! Exports every document referenced by a database index view into a CSV
//! or TSV file without holding more than one index page and one document
//! batch in memory.
//!
//! # Usage
//!
//! ```bash
//! couchexport --index-db people --index-design index --index-view by_name \
//!     --docs-db people --field Name=/name --field City=/address/city -o people.csv
//! ```

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{Level, warn};
use tracing_subscriber::EnvFilter;

use couchexport::cli::{CliInterface, OutputTarget};
use couchexport::error::Result;
use couchexport::export::{ExportCoordinator, ExportPlan, ExportSummary, ProgressTracker};
use couchexport::sink::{FileSink, Sink, WriterSink};
use couchexport::transport::MongoTransport;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands or run the export
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(());
    }

    run_export(&cli).await
}

/// Plan, connect and stream the export into the selected output
async fn run_export(cli: &CliInterface) -> Result<()> {
    let config = cli.config();
    config.validate()?;

    // Validate everything before connecting or touching the output
    let plan = ExportPlan::from_options(&config.export_options()?)?;
    let formatter = config.output.format.formatter(config.columns()?);

    let client = MongoTransport::connect(&config.connection.uri, &config.connection.docs_collection)
        .await?;

    let cancel_token = CancellationToken::new();
    let ctrl_c_handle = spawn_ctrl_c_handler(cancel_token.clone());

    let coordinator = ExportCoordinator::new(Arc::new(client), plan, formatter)
        .with_header(config.output.header)
        .with_progress(ProgressTracker::new(cli.show_progress()))
        .with_cancellation(cancel_token);

    let target = cli.output_target();
    let result = match &target {
        OutputTarget::Stdout => execute_into(&coordinator, WriterSink::stdout()).await,
        OutputTarget::File(path) => execute_into(&coordinator, FileSink::create(path).await?).await,
    };

    ctrl_c_handle.abort();

    match result {
        Ok(summary) => {
            if !cli.args().quiet {
                report(&summary, &target);
            }
            Ok(())
        }
        Err(e) => {
            if let OutputTarget::File(path) = &target {
                eprintln!("Partial output left in {}", path.display());
            }
            Err(e)
        }
    }
}

/// Run the export and flush a sink the coordinator left open after a failure
async fn execute_into<W>(
    coordinator: &ExportCoordinator,
    mut sink: WriterSink<W>,
) -> Result<ExportSummary>
where
    W: AsyncWrite + Unpin + Send,
{
    let result = coordinator.execute(&mut sink).await;
    if result.is_err() && !sink.is_closed() {
        if let Err(e) = sink.close().await {
            warn!("Failed to flush partial output: {}", e);
        }
    }
    result
}

/// Cancel the export on Ctrl+C
fn spawn_ctrl_c_handler(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => token.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    })
}

/// Print the export summary on stderr
fn report(summary: &ExportSummary, target: &OutputTarget) {
    let destination = match target {
        OutputTarget::Stdout => "stdout".to_string(),
        OutputTarget::File(path) => path.display().to_string(),
    };
    let status = if summary.cancelled {
        "Export cancelled"
    } else {
        "Export complete"
    };
    eprintln!(
        "{}: {} documents ({} skipped) from {} index pages in {} batches, {} bytes to {} in {} ms",
        status,
        summary.documents_exported,
        summary.documents_skipped,
        summary.pages,
        summary.batches,
        summary.bytes_written,
        destination,
        summary.elapsed_ms
    );
}

/// Initialize logging system based on verbosity level
///
/// `RUST_LOG` takes precedence when set.
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level: Level = cli.config().logging.level.to_tracing_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
