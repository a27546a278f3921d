//! Configuration management for couchexport
//!
//! Configuration is read from a TOML file and then overridden by
//! command-line arguments. Precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::export::{
    DEFAULT_FETCH_SIZE, DocDerivation, DocsOptions, ExportOptions, IndexOptions, KeyDerivation,
    PageBoundary,
};
use crate::formatter::{Column, OutputFormat};
use crate::transport::mongo::DEFAULT_DOCS_COLLECTION;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Index retrieval
    #[serde(default)]
    pub index: IndexConfig,

    /// Document retrieval
    #[serde(default)]
    pub docs: DocsConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// MongoDB connection URI
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Collection holding the documents of each database
    #[serde(default = "default_docs_collection")]
    pub docs_collection: String,
}

/// Index view configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub db: String,
    #[serde(default)]
    pub design: String,
    #[serde(default)]
    pub view: String,

    /// Rows per index page
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,

    /// `key`, `id`, `value` or a `/pointer` into the row value
    #[serde(default = "default_key_from")]
    pub key_from: String,

    /// Page boundary handling
    #[serde(default)]
    pub boundary: PageBoundary,

    /// Pause between index page requests in milliseconds
    #[serde(default)]
    pub page_delay_ms: u64,
}

/// Document retrieval configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocsConfig {
    #[serde(default)]
    pub db: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    /// Keys per retrieval request
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,

    /// `doc` or `value`
    #[serde(default = "default_doc_from")]
    pub doc_from: String,
}

/// Output file configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Row format
    #[serde(default)]
    pub format: OutputFormat,

    /// Write the header line when fields are configured
    #[serde(default = "default_true")]
    pub header: bool,

    /// Show a progress spinner
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Output columns as `Title=/json/pointer`, in order
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_docs_collection() -> String {
    DEFAULT_DOCS_COLLECTION.to_string()
}

fn default_fetch_size() -> usize {
    DEFAULT_FETCH_SIZE
}

fn default_key_from() -> String {
    "key".to_string()
}

fn default_doc_from() -> String {
    "doc".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            docs_collection: default_docs_collection(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db: String::new(),
            design: String::new(),
            view: String::new(),
            fetch_size: default_fetch_size(),
            key_from: default_key_from(),
            boundary: PageBoundary::default(),
            page_delay_ms: 0,
        }
    }
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            db: String::new(),
            design: None,
            view: None,
            fetch_size: default_fetch_size(),
            doc_from: default_doc_from(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            header: true,
            progress: true,
            fields: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string()).into()
            } else {
                crate::error::ExportError::Io(e)
            }
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration, falling back to defaults
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".couchexport")
            .join("config.toml")
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// Checks value syntax only; required locators are checked when the
    /// export is planned.
    pub fn validate(&self) -> Result<()> {
        if self.connection.uri.trim().is_empty() {
            return Err(ConfigError::MissingField("connection.uri".into()).into());
        }
        if self.connection.docs_collection.trim().is_empty() {
            return Err(ConfigError::MissingField("connection.docs_collection".into()).into());
        }
        self.export_options()?;
        self.columns()?;
        Ok(())
    }

    /// Build export options from the index and docs sections
    pub fn export_options(&self) -> Result<ExportOptions> {
        let index = IndexOptions {
            db: self.index.db.clone(),
            design: self.index.design.clone(),
            view: self.index.view.clone(),
            fetch_size: self.index.fetch_size,
            key_from: self.index.key_from.parse::<KeyDerivation>()?,
            boundary: self.index.boundary,
            page_delay: self.page_delay(),
        };
        let docs = DocsOptions {
            db: self.docs.db.clone(),
            design: self.docs.design.clone(),
            view: self.docs.view.clone(),
            fetch_size: self.docs.fetch_size,
            doc_from: self.docs.doc_from.parse::<DocDerivation>()?,
        };
        Ok(ExportOptions { index, docs })
    }

    /// Parse the configured output columns
    pub fn columns(&self) -> Result<Vec<Column>> {
        self.output
            .fields
            .iter()
            .map(|f| f.parse::<Column>().map_err(Into::into))
            .collect()
    }

    /// Pause between index pages, if any
    pub fn page_delay(&self) -> Option<Duration> {
        (self.index.page_delay_ms > 0).then(|| Duration::from_millis(self.index.page_delay_ms))
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use crate::export::ExportPlan;
    use crate::transport::DocSource;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.connection.uri, "mongodb://localhost:27017");
        assert_eq!(config.connection.docs_collection, "docs");
        assert_eq!(config.index.fetch_size, 1000);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert!(config.output.header);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_parse_full_file() {
        let config = Config::from_toml(
            r#"
            [connection]
            uri = "mongodb://db.internal:27017"

            [index]
            db = "people"
            design = "index"
            view = "by_name"
            fetch_size = 500
            key_from = "id"
            boundary = "overlap"
            page_delay_ms = 25

            [docs]
            db = "people"
            design = "docs"
            view = "all"
            fetch_size = 50

            [output]
            format = "tsv"
            header = false
            fields = ["Name=/name", "City=/address/city"]

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.index.boundary, PageBoundary::Overlap);
        assert_eq!(config.page_delay(), Some(Duration::from_millis(25)));
        assert_eq!(config.output.format, OutputFormat::Tsv);
        assert_eq!(config.columns().unwrap().len(), 2);
        assert_eq!(config.logging.level.to_tracing_level(), tracing::Level::DEBUG);
        assert!(config.logging.timestamps);

        let plan = ExportPlan::from_options(&config.export_options().unwrap()).unwrap();
        assert_eq!(plan.page_size, 500);
        assert_eq!(plan.batch_size, 50);
        assert!(matches!(plan.source, DocSource::ViaView(_)));
        assert!(matches!(plan.key_derivation, KeyDerivation::Id));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml("[index]\ndb = \"people\"\n").unwrap();
        assert_eq!(config.index.db, "people");
        assert_eq!(config.index.fetch_size, DEFAULT_FETCH_SIZE);
        assert_eq!(config.docs.doc_from, "doc");
        assert_eq!(config.connection, ConnectionConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[index\n").unwrap_err();
        assert!(matches!(err, ExportError::Config(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.index.key_from = "row".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.fields = vec!["no-pointer".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.index.db = "people".into();
        config.docs.view = Some("all".into());
        config.output.fields = vec!["Name=/name".into()];

        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load_from_file(Some(Path::new("/nonexistent/couchexport.toml")))
            .unwrap_err();
        assert!(matches!(err, ExportError::Config(ConfigError::FileNotFound(_))));
    }
}
