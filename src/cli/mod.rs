//! Command-line interface for couchexport
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and merging of arguments over the file
//! - Subcommands (shell completion, configuration inspection)
//! - Output destination selection

pub mod completion;

use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, LogLevel};
use crate::error::Result;
use crate::export::PageBoundary;
use crate::formatter::OutputFormat;

/// Export the documents of a database index view into a delimited file
#[derive(Parser, Debug)]
#[command(
    name = "couchexport",
    version,
    about = "Export documents referenced by an index view into CSV or TSV",
    long_about = "Reads an index view page by page, retrieves the referenced documents in
bounded batches and streams one delimited line per document into the output file."
)]
pub struct CliArgs {
    /// MongoDB connection URI
    #[arg(long, value_name = "URI")]
    pub uri: Option<String>,

    /// Database holding the index view
    #[arg(long, value_name = "DB")]
    pub index_db: Option<String>,

    /// Design document of the index view
    #[arg(long, value_name = "NAME")]
    pub index_design: Option<String>,

    /// Name of the index view
    #[arg(long, value_name = "NAME")]
    pub index_view: Option<String>,

    /// Rows per index page
    #[arg(long, value_name = "N")]
    pub index_fetch_size: Option<usize>,

    /// Database holding the documents
    #[arg(long, value_name = "DB")]
    pub docs_db: Option<String>,

    /// Design document of the retrieval view
    #[arg(long, value_name = "NAME")]
    pub docs_design: Option<String>,

    /// Name of the retrieval view
    #[arg(long, value_name = "NAME")]
    pub docs_view: Option<String>,

    /// Keys per document retrieval request
    #[arg(long, value_name = "N")]
    pub docs_fetch_size: Option<usize>,

    /// Document key source: key, id, value or a /pointer into the row value
    #[arg(long, value_name = "SOURCE")]
    pub key_from: Option<String>,

    /// Document source in retrieved rows: doc or value
    #[arg(long, value_name = "SOURCE")]
    pub doc_from: Option<String>,

    /// Output column as TITLE=/json/pointer (repeatable, in order)
    #[arg(long = "field", value_name = "TITLE=/PTR")]
    pub fields: Vec<String>,

    /// Output format (csv, tsv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Do not write the header line
    #[arg(long)]
    pub no_header: bool,

    /// Page boundary handling (lookahead, overlap)
    #[arg(long, value_name = "MODE")]
    pub boundary: Option<PageBoundary>,

    /// Pause between index page requests in milliseconds
    #[arg(long, value_name = "MS")]
    pub page_delay_ms: Option<u64>,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,

    /// Output file, `-` for stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (minimal output)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for couchexport
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// Where exported lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        Self::from_args(args)
    }

    /// Build the interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Configuration file path in use (explicit or default)
    pub fn config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    /// Resolve the output destination
    ///
    /// `-` selects stdout. Without `-o` a timestamped file name is
    /// generated in the current directory.
    pub fn output_target(&self) -> OutputTarget {
        match self.args.output.as_deref() {
            Some("-") => OutputTarget::Stdout,
            Some(path) => OutputTarget::File(PathBuf::from(path)),
            None => OutputTarget::File(PathBuf::from(default_filename(self.config.output.format))),
        }
    }

    /// Whether to show the progress spinner
    pub fn show_progress(&self) -> bool {
        self.config.output.progress
            && !self.args.quiet
            && self.output_target() != OutputTarget::Stdout
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_connection_args(config, args);
        Self::apply_index_args(config, args);
        Self::apply_docs_args(config, args);
        Self::apply_output_args(config, args);
        Self::apply_logging_args(config, args);
    }

    fn apply_connection_args(config: &mut Config, args: &CliArgs) {
        if let Some(uri) = &args.uri {
            config.connection.uri = uri.clone();
        }
    }

    fn apply_index_args(config: &mut Config, args: &CliArgs) {
        let index = &mut config.index;
        override_with(&mut index.db, &args.index_db);
        override_with(&mut index.design, &args.index_design);
        override_with(&mut index.view, &args.index_view);
        override_with(&mut index.fetch_size, &args.index_fetch_size);
        override_with(&mut index.key_from, &args.key_from);
        override_with(&mut index.boundary, &args.boundary);
        override_with(&mut index.page_delay_ms, &args.page_delay_ms);
    }

    fn apply_docs_args(config: &mut Config, args: &CliArgs) {
        let docs = &mut config.docs;
        override_with(&mut docs.db, &args.docs_db);
        override_with(&mut docs.fetch_size, &args.docs_fetch_size);
        override_with(&mut docs.doc_from, &args.doc_from);
        if args.docs_design.is_some() {
            docs.design = args.docs_design.clone();
        }
        if args.docs_view.is_some() {
            docs.view = args.docs_view.clone();
        }
    }

    fn apply_output_args(config: &mut Config, args: &CliArgs) {
        override_with(&mut config.output.format, &args.format);
        if !args.fields.is_empty() {
            config.output.fields = args.fields.clone();
        }
        if args.no_header {
            config.output.header = false;
        }
        if args.no_progress {
            config.output.progress = false;
        }
    }

    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Completion { shell }) => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config()?;
        }

        if show || !validate {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate the effective configuration
    fn validate_config(&self) -> Result<()> {
        let path = self.config_path();
        println!("Validating configuration: {}", display_source(&path));

        self.config.validate()?;
        println!("Configuration is valid");
        Ok(())
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("# Configuration file: {}", display_source(&self.config_path()));
        println!("{}", self.config.to_toml()?);
        Ok(())
    }
}

/// Replace `target` when the argument was given
fn override_with<T: Clone>(target: &mut T, arg: &Option<T>) {
    if let Some(value) = arg {
        *target = value.clone();
    }
}

fn display_source(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    }
}

/// Get suggested filename for format
pub fn default_filename(format: OutputFormat) -> String {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("export-{}.{}", timestamp, format.extension())
}
