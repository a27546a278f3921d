//! Database query transport
//!
//! The export pipeline talks to the database through [`ViewClient`]: one call
//! to read a page of a sorted index, and two shapes of document retrieval
//! (directly by identifier, or through a view with documents included).
//!
//! Two implementations ship with the crate:
//! - [`MemoryTransport`]: in-process databases and views, used by tests and embedders
//! - [`MongoTransport`]: MongoDB-backed views and documents

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;

pub mod collation;
pub mod memory;
pub mod mongo;

pub use memory::{MemoryTransport, Request};
pub use mongo::MongoTransport;

/// Identifies a view (sorted index) inside a database
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewLocator {
    pub db: String,
    pub design: String,
    pub view: String,
}

impl ViewLocator {
    pub fn new(db: impl Into<String>, design: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            design: design.into(),
            view: view.into(),
        }
    }
}

impl fmt::Display for ViewLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.db, self.design, self.view)
    }
}

/// Options of a single index page request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewQuery {
    /// Inclusive start key, `None` to read from the beginning
    pub start_key: Option<Value>,
    /// Tie-break on the document id among rows sharing `start_key`
    pub start_doc_id: Option<String>,
    /// Maximum number of rows to return
    pub limit: usize,
}

/// One row returned by a view query or document retrieval
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewRow {
    /// Identifier of the document that emitted the row
    #[serde(default)]
    pub id: Option<String>,
    /// Sort key of the row
    #[serde(default)]
    pub key: Value,
    /// Emitted value
    #[serde(default)]
    pub value: Value,
    /// Included document, when requested and found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

impl ViewRow {
    pub fn new(id: impl Into<String>, key: Value, value: Value) -> Self {
        Self {
            id: Some(id.into()),
            key,
            value,
            doc: None,
        }
    }

    pub fn with_doc(mut self, doc: Value) -> Self {
        self.doc = Some(doc);
        self
    }
}

/// Document retrieval strategy, chosen once when an export is planned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocSource {
    /// Fetch documents by identifier straight from a database
    Direct { db: String },
    /// Query a view by key with documents included
    ViaView(ViewLocator),
}

impl fmt::Display for DocSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocSource::Direct { db } => write!(f, "database {db}"),
            DocSource::ViaView(view) => write!(f, "view {view}"),
        }
    }
}

/// Query interface of the document database
#[async_trait]
pub trait ViewClient: Send + Sync {
    /// Read rows of a view ordered by (key, id), starting inclusively at the
    /// query's start position and returning at most `query.limit` rows
    ///
    /// Keys are ordered by the backend's own collation, which must compare
    /// whole keys of any type the same way in the filter and in the sort.
    async fn query_view(
        &self,
        view: &ViewLocator,
        query: &ViewQuery,
    ) -> Result<Vec<ViewRow>, TransportError>;

    /// Fetch documents by identifier, one row per key; missing documents
    /// yield a row without `doc`
    async fn fetch_docs(&self, db: &str, keys: &[Value]) -> Result<Vec<ViewRow>, TransportError>;

    /// Read the rows of a view whose key is one of `keys`, with documents included
    async fn query_view_with_docs(
        &self,
        view: &ViewLocator,
        keys: &[Value],
    ) -> Result<Vec<ViewRow>, TransportError>;

    /// Retrieve documents for `keys` using the given strategy
    async fn retrieve(
        &self,
        source: &DocSource,
        keys: &[Value],
    ) -> Result<Vec<ViewRow>, TransportError> {
        match source {
            DocSource::Direct { db } => self.fetch_docs(db, keys).await,
            DocSource::ViaView(view) => self.query_view_with_docs(view, keys).await,
        }
    }
}

/// Render a key for log lines
pub(crate) fn display_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_view_locator_display() {
        let view = ViewLocator::new("people", "index", "by_city");
        assert_eq!(view.to_string(), "people/index/by_city");
    }

    #[test]
    fn test_view_row_deserialize_couch_shape() {
        let row: ViewRow =
            serde_json::from_value(json!({"id": "1", "key": ["a", 1], "value": null})).unwrap();
        assert_eq!(row.id.as_deref(), Some("1"));
        assert_eq!(row.key, json!(["a", 1]));
        assert!(row.doc.is_none());
    }

    #[test]
    fn test_display_key() {
        assert_eq!(display_key(&json!("abc")), "abc");
        assert_eq!(display_key(&json!([1, "x"])), "[1,\"x\"]");
    }
}
