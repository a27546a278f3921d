use std::{error::Error as StdError, fmt, io};

/// Crate-wide `Result` type using [`ExportError`] as the error.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
///
/// The wrapped kind is carried as-is so callers can match on the original
/// cause (a failed view query stays a [`TransportError`] all the way up).
#[derive(Debug)]
pub enum ExportError {
    /// Index or document query failed.
    Transport(TransportError),

    /// The destination failed to accept a write or close.
    Sink(SinkError),

    /// Invalid or incomplete configuration.
    Config(ConfigError),

    /// I/O errors outside of the sink.
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Failures of the database query transport.
#[derive(Debug)]
pub enum TransportError {
    /// MongoDB driver errors.
    Driver(mongodb::error::Error),

    /// A value could not be converted between JSON and the backend format.
    Conversion(String),

    /// The backend rejected or could not answer a query.
    QueryFailed { target: String, message: String },
}

/// Failures of the output destination.
#[derive(Debug)]
pub enum SinkError {
    /// Underlying write, flush or shutdown failed.
    Io(io::Error),

    /// Write or close attempted after the sink was closed.
    Closed,

    /// The output location cannot be used.
    InvalidPath(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, value: impl fmt::Display) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Transport(e) => write!(f, "Transport error: {e}"),
            ExportError::Sink(e) => write!(f, "Sink error: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Driver(e) => write!(f, "{e}"),
            TransportError::Conversion(msg) => write!(f, "Conversion failed: {msg}"),
            TransportError::QueryFailed { target, message } => {
                write!(f, "Query against '{target}' failed: {message}")
            }
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "{e}"),
            SinkError::Closed => write!(f, "Sink already closed"),
            SinkError::InvalidPath(msg) => write!(f, "Invalid output path: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl StdError for ExportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ExportError::Transport(e) => Some(e),
            ExportError::Sink(e) => Some(e),
            ExportError::Config(e) => Some(e),
            ExportError::Io(e) => Some(e),
            ExportError::Generic(_) => None,
        }
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TransportError::Driver(e) => Some(e),
            _ => None,
        }
    }
}

impl StdError for SinkError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl StdError for ConfigError {}

/* ========================= Conversions ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<TransportError> for ExportError {
    fn from(err: TransportError) -> Self {
        ExportError::Transport(err)
    }
}

impl From<SinkError> for ExportError {
    fn from(err: SinkError) -> Self {
        ExportError::Sink(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<String> for ExportError {
    fn from(msg: String) -> Self {
        ExportError::Generic(msg)
    }
}

impl From<&str> for ExportError {
    fn from(msg: &str) -> Self {
        ExportError::Generic(msg.to_owned())
    }
}

impl From<mongodb::error::Error> for TransportError {
    fn from(err: mongodb::error::Error) -> Self {
        TransportError::Driver(err)
    }
}

impl From<mongodb::bson::ser::Error> for TransportError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        TransportError::Conversion(err.to_string())
    }
}

impl From<io::Error> for SinkError {
    fn from(err: io::Error) -> Self {
        SinkError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_kept_as_source() {
        let err: ExportError = TransportError::QueryFailed {
            target: "people/by_name".to_string(),
            message: "timeout".to_string(),
        }
        .into();

        assert!(matches!(err, ExportError::Transport(_)));
        assert_eq!(
            err.to_string(),
            "Transport error: Query against 'people/by_name' failed: timeout"
        );
        let source = err.source().unwrap();
        assert!(source.downcast_ref::<TransportError>().is_some());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("index.fetch_size", 0);
        assert_eq!(
            err.to_string(),
            "Invalid value '0' for field 'index.fetch_size'"
        );
        assert_eq!(
            ConfigError::MissingField("docs.db".into()).to_string(),
            "Missing required field: docs.db"
        );
    }

    #[test]
    fn test_sink_error_from_io() {
        let err: SinkError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed").into();
        let top: ExportError = err.into();
        assert_eq!(top.to_string(), "Sink error: pipe closed");
    }
}
