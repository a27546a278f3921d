//! Row formatting for exported documents
//!
//! A [`RowFormatter`] turns one document into one output line and produces
//! the matching header line. Columns are described by an ordered list of
//! [`Column`]s, each pairing a title with a [`FieldExtractor`]. Without
//! columns, every top-level field of the document is exported in the
//! document's own key order.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

pub mod csv;

pub use csv::{DelimitedFormatter, unquote_field};

/// Formats documents into delimited lines
pub trait RowFormatter: Send + Sync {
    /// Header line, empty when no columns are configured
    fn header(&self) -> String;

    /// One `\n`-terminated line for `doc`
    fn format(&self, doc: &Value) -> String;

    /// Number of configured columns
    fn columns(&self) -> usize;
}

/// Custom extraction function
pub type ExtractFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Produces one column value from a document
#[derive(Clone)]
pub enum FieldExtractor {
    /// JSON pointer into the document, e.g. `/address/city`
    Pointer(String),
    /// Caller-supplied function
    Custom(ExtractFn),
}

impl FieldExtractor {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        FieldExtractor::Custom(Arc::new(f))
    }

    /// Extract the value, `None` when missing
    pub fn extract(&self, doc: &Value) -> Option<Value> {
        match self {
            FieldExtractor::Pointer(ptr) => doc.pointer(ptr).cloned(),
            FieldExtractor::Custom(f) => f(doc),
        }
    }
}

impl fmt::Debug for FieldExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldExtractor::Pointer(ptr) => write!(f, "Pointer({ptr:?})"),
            FieldExtractor::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// A titled output column
#[derive(Debug, Clone)]
pub struct Column {
    pub title: String,
    pub extractor: FieldExtractor,
}

impl Column {
    pub fn new(title: impl Into<String>, extractor: FieldExtractor) -> Self {
        Self {
            title: title.into(),
            extractor,
        }
    }

    /// Column reading a JSON pointer
    pub fn pointer(title: impl Into<String>, ptr: impl Into<String>) -> Self {
        Self::new(title, FieldExtractor::Pointer(ptr.into()))
    }
}

impl FromStr for Column {
    type Err = ConfigError;

    /// Parse `Title=/json/pointer`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (title, ptr) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::invalid("field", s))?;
        let title = title.trim();
        let ptr = ptr.trim();
        if title.is_empty() || !(ptr.is_empty() || ptr.starts_with('/')) {
            return Err(ConfigError::invalid("field", s));
        }
        Ok(Column::pointer(title, ptr))
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Quoted, comma-separated values
    #[default]
    Csv,
    /// Quoted, tab-separated values
    Tsv,
}

impl OutputFormat {
    /// Field delimiter of the format
    pub fn delimiter(&self) -> char {
        match self {
            OutputFormat::Csv => ',',
            OutputFormat::Tsv => '\t',
        }
    }

    /// File extension used for generated file names
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
        }
    }

    /// Build the formatter for this format
    pub fn formatter(&self, columns: Vec<Column>) -> Box<dyn RowFormatter> {
        Box::new(DelimitedFormatter::new(self.delimiter(), columns))
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            _ => Err(ConfigError::invalid("format", s)),
        }
    }
}

/// Plain string form of a column value
///
/// Null renders empty, strings verbatim, numbers and booleans in display
/// form, arrays and objects as compact JSON.
pub fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(None), "");
        assert_eq!(render_value(Some(&json!(null))), "");
        assert_eq!(render_value(Some(&json!("x"))), "x");
        assert_eq!(render_value(Some(&json!(0))), "0");
        assert_eq!(render_value(Some(&json!(false))), "false");
        assert_eq!(render_value(Some(&json!([1, "a"]))), "[1,\"a\"]");
        assert_eq!(render_value(Some(&json!({"k": 1}))), "{\"k\":1}");
    }

    #[test]
    fn test_column_from_str() {
        let column: Column = "City = /address/city".parse().unwrap();
        assert_eq!(column.title, "City");
        assert_eq!(
            column.extractor.extract(&json!({"address": {"city": "Oslo"}})),
            Some(json!("Oslo"))
        );

        assert!("NoPointer".parse::<Column>().is_err());
        assert!("=/x".parse::<Column>().is_err());
        assert!("Bad=x".parse::<Column>().is_err());
    }

    #[test]
    fn test_custom_extractor() {
        let extractor = FieldExtractor::custom(|doc| doc.get("n")?.as_i64().map(|n| json!(n * 2)));
        assert_eq!(extractor.extract(&json!({"n": 4})), Some(json!(8)));
        assert_eq!(extractor.extract(&json!({})), None);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("tsv".parse::<OutputFormat>().unwrap().delimiter(), '\t');
        assert!("xlsx".parse::<OutputFormat>().is_err());
    }
}
