//! Delimited (CSV/TSV) row formatter
//!
//! Every field is wrapped in double quotes and quotes inside the value are
//! doubled, so any delimiter or newline in a value stays inside its field.

use serde_json::Value;

use super::{Column, RowFormatter, render_value};

/// Formatter producing quoted, delimiter-separated lines
#[derive(Debug, Clone)]
pub struct DelimitedFormatter {
    /// Field delimiter
    delimiter: char,
    /// Configured columns, in output order
    columns: Vec<Column>,
}

impl DelimitedFormatter {
    /// Create a new formatter
    ///
    /// # Arguments
    /// * `delimiter` - Field delimiter
    /// * `columns` - Output columns; empty exports every top-level field
    pub fn new(delimiter: char, columns: Vec<Column>) -> Self {
        Self { delimiter, columns }
    }

    /// Comma-separated formatter
    pub fn csv(columns: Vec<Column>) -> Self {
        Self::new(',', columns)
    }

    /// Quote a field value, doubling inner quotes
    fn quote(value: &str) -> String {
        format!("\"{}\"", value.replace('"', "\"\""))
    }

    fn line<I>(&self, fields: I) -> String
    where
        I: IntoIterator<Item = String>,
    {
        let mut line = String::new();
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                line.push(self.delimiter);
            }
            line.push_str(&Self::quote(&field));
        }
        line.push('\n');
        line
    }
}

impl RowFormatter for DelimitedFormatter {
    fn header(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }
        self.line(self.columns.iter().map(|c| c.title.clone()))
    }

    fn format(&self, doc: &Value) -> String {
        if self.columns.is_empty() {
            return match doc {
                Value::Object(fields) => self.line(fields.values().map(|v| render_value(Some(v)))),
                other => self.line(std::iter::once(render_value(Some(other)))),
            };
        }

        self.line(
            self.columns
                .iter()
                .map(|c| render_value(c.extractor.extract(doc).as_ref())),
        )
    }

    fn columns(&self) -> usize {
        self.columns.len()
    }
}

/// Inverse of the quoting rule: strip the surrounding quotes and collapse
/// doubled quotes
///
/// # Returns
/// * `Option<String>` - The original value, or None if `field` is not a quoted field
pub fn unquote_field(field: &str) -> Option<String> {
    let inner = field.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' && chars.next_if_eq(&'"').is_none() {
            return None;
        }
        out.push(c);
    }
    Some(out)
}
