//! In-process transport
//!
//! Keeps databases and views in memory with the same query semantics as a
//! real backend. Every request served is recorded so callers can observe how
//! many queries were issued and in which order.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::error::TransportError;

use super::collation::{collate, collate_position};
use super::{ViewClient, ViewLocator, ViewQuery, ViewRow};

/// A request served by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    QueryView { view: ViewLocator, query: ViewQuery },
    FetchDocs { db: String, keys: Vec<Value> },
    QueryViewWithDocs { view: ViewLocator, keys: Vec<Value> },
}

/// In-memory databases and views
#[derive(Debug, Default)]
pub struct MemoryTransport {
    /// Documents per database, keyed by `_id`
    databases: HashMap<String, BTreeMap<String, Value>>,
    /// View rows, kept sorted by (key, id)
    views: HashMap<ViewLocator, Vec<ViewRow>>,
    /// Requests served so far
    requests: Mutex<Vec<Request>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document; its `_id` must be a string
    ///
    /// # Returns
    /// * `Option<String>` - The stored id, or None if the document has no string `_id`
    pub fn insert_doc(&mut self, db: &str, doc: Value) -> Option<String> {
        let id = doc.get("_id")?.as_str()?.to_string();
        self.databases
            .entry(db.to_string())
            .or_default()
            .insert(id.clone(), doc);
        Some(id)
    }

    /// Define a view from explicit rows
    pub fn define_view(&mut self, view: ViewLocator, mut rows: Vec<ViewRow>) {
        rows.sort_by(|a, b| collate_position(&a.key, a.id.as_deref(), &b.key, b.id.as_deref()));
        self.views.insert(view, rows);
    }

    /// Build a view by running `map` over every document of the view's database
    ///
    /// `map` returns the (key, value) pairs to emit for one document.
    pub fn build_view<F>(&mut self, view: ViewLocator, map: F)
    where
        F: Fn(&Value) -> Vec<(Value, Value)>,
    {
        let rows = self
            .databases
            .get(&view.db)
            .map(|docs| {
                docs.iter()
                    .flat_map(|(id, doc)| {
                        map(doc)
                            .into_iter()
                            .map(move |(key, value)| ViewRow::new(id.clone(), key, value))
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.define_view(view, rows);
    }

    /// Requests served so far, oldest first
    pub fn requests(&self) -> Vec<Request> {
        self.log().clone()
    }

    fn log(&self) -> MutexGuard<'_, Vec<Request>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, request: Request) {
        trace!("memory transport request: {:?}", request);
        self.log().push(request);
    }

    fn view_rows(&self, view: &ViewLocator) -> Result<&[ViewRow], TransportError> {
        self.views
            .get(view)
            .map(Vec::as_slice)
            .ok_or_else(|| TransportError::QueryFailed {
                target: view.to_string(),
                message: "view not found".to_string(),
            })
    }

    fn database(&self, db: &str) -> Result<&BTreeMap<String, Value>, TransportError> {
        self.databases
            .get(db)
            .ok_or_else(|| TransportError::QueryFailed {
                target: db.to_string(),
                message: "database not found".to_string(),
            })
    }
}

#[async_trait]
impl ViewClient for MemoryTransport {
    async fn query_view(
        &self,
        view: &ViewLocator,
        query: &ViewQuery,
    ) -> Result<Vec<ViewRow>, TransportError> {
        self.record(Request::QueryView {
            view: view.clone(),
            query: query.clone(),
        });
        let rows = self.view_rows(view)?;

        let start = match &query.start_key {
            Some(key) => rows.partition_point(|row| {
                collate_position(
                    &row.key,
                    row.id.as_deref(),
                    key,
                    query.start_doc_id.as_deref(),
                )
                .is_lt()
            }),
            None => 0,
        };

        Ok(rows.iter().skip(start).take(query.limit).cloned().collect())
    }

    async fn fetch_docs(&self, db: &str, keys: &[Value]) -> Result<Vec<ViewRow>, TransportError> {
        self.record(Request::FetchDocs {
            db: db.to_string(),
            keys: keys.to_vec(),
        });
        let docs = self.database(db)?;

        Ok(keys
            .iter()
            .map(|key| {
                let found = key.as_str().and_then(|id| docs.get(id));
                ViewRow {
                    id: found.and(key.as_str().map(str::to_string)),
                    key: key.clone(),
                    value: Value::Null,
                    doc: found.cloned(),
                }
            })
            .collect())
    }

    async fn query_view_with_docs(
        &self,
        view: &ViewLocator,
        keys: &[Value],
    ) -> Result<Vec<ViewRow>, TransportError> {
        self.record(Request::QueryViewWithDocs {
            view: view.clone(),
            keys: keys.to_vec(),
        });
        let rows = self.view_rows(view)?;
        let docs = self.databases.get(&view.db);

        let mut out = Vec::new();
        for key in keys {
            for row in rows.iter().filter(|row| collate(&row.key, key).is_eq()) {
                let doc = row
                    .id
                    .as_deref()
                    .and_then(|id| docs.and_then(|d| d.get(id)))
                    .cloned();
                out.push(ViewRow {
                    doc,
                    ..row.clone()
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> MemoryTransport {
        let mut transport = MemoryTransport::new();
        transport.insert_doc("people", json!({"_id": "1", "name": "Ann", "city": "Oslo"}));
        transport.insert_doc("people", json!({"_id": "2", "name": "Bob", "city": "Oslo"}));
        transport.insert_doc("people", json!({"_id": "3", "name": "Cid", "city": "Bergen"}));
        transport.build_view(ViewLocator::new("people", "index", "by_city"), |doc| {
            vec![(doc["city"].clone(), Value::Null)]
        });
        transport
    }

    #[tokio::test]
    async fn test_query_view_sorted_with_limit() {
        let transport = people();
        let view = ViewLocator::new("people", "index", "by_city");
        let rows = transport
            .query_view(&view, &ViewQuery { limit: 2, ..Default::default() })
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, json!("Bergen"));
        assert_eq!(rows[1].id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_query_view_start_is_inclusive() {
        let transport = people();
        let view = ViewLocator::new("people", "index", "by_city");
        let query = ViewQuery {
            start_key: Some(json!("Oslo")),
            start_doc_id: Some("2".to_string()),
            limit: 10,
        };
        let rows = transport.query_view(&view, &query).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_start_key_without_doc_id() {
        let transport = people();
        let view = ViewLocator::new("people", "index", "by_city");
        let query = ViewQuery {
            start_key: Some(json!("Oslo")),
            start_doc_id: None,
            limit: 10,
        };
        let rows = transport.query_view(&view, &query).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_docs_marks_missing() {
        let transport = people();
        let rows = transport
            .fetch_docs("people", &[json!("3"), json!("404")])
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].doc.as_ref().unwrap()["name"], "Cid");
        assert!(rows[1].doc.is_none());
        assert!(rows[1].id.is_none());
    }

    #[tokio::test]
    async fn test_query_view_with_docs() {
        let transport = people();
        let view = ViewLocator::new("people", "index", "by_city");
        let rows = transport
            .query_view_with_docs(&view, &[json!("Oslo")])
            .await
            .unwrap();

        let names: Vec<_> = rows
            .iter()
            .map(|r| r.doc.as_ref().unwrap()["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("Ann"), json!("Bob")]);
    }

    #[test]
    fn test_mixed_and_composite_keys_follow_collation() {
        let view = ViewLocator::new("db", "index", "mixed");
        let mut transport = MemoryTransport::new();
        transport.define_view(
            view.clone(),
            vec![
                ViewRow::new("1", json!(["x", 1]), Value::Null),
                ViewRow::new("2", json!("a"), Value::Null),
                ViewRow::new("3", json!(5), Value::Null),
                ViewRow::new("4", json!(["a", 2]), Value::Null),
                ViewRow::new("5", json!(true), Value::Null),
            ],
        );

        let query = ViewQuery {
            start_key: Some(json!(5)),
            start_doc_id: Some("3".to_string()),
            limit: 10,
        };
        let rows = tokio_test::assert_ok!(tokio_test::block_on(
            transport.query_view(&view, &query)
        ));
        let keys: Vec<Value> = rows.into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![json!(5), json!("a"), json!(["a", 2]), json!(["x", 1])]);

        tokio_test::assert_err!(tokio_test::block_on(
            transport.fetch_docs("nowhere", &[json!("1")])
        ));
    }

    #[tokio::test]
    async fn test_unknown_view_fails_and_is_recorded() {
        let transport = people();
        let view = ViewLocator::new("people", "index", "missing");
        let err = transport
            .query_view(&view, &ViewQuery { limit: 1, ..Default::default() })
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::QueryFailed { .. }));
        assert_eq!(transport.requests().len(), 1);
    }
}
