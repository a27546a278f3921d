//! MongoDB-backed transport
//!
//! Maps the view model onto MongoDB collections:
//! - a database is a MongoDB database
//! - documents live in one collection per database (`docs` by default)
//! - the view `design/view` is the collection `"{design}.{view}"`, whose
//!   records carry `key`, `id` and `value` fields
//!
//! View reads run as aggregation pipelines. Query operators and sorts on a
//! plain field compare only values of one BSON type and order arrays by
//! their smallest element, which would drop or repeat rows with composite or
//! mixed-type keys. Instead the key is compared with `$expr` operators and
//! sorted through a wrapping document, so filter and sort both see the key
//! as one whole value in BSON order.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::{Client, Collection};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::TransportError;

use super::{ViewClient, ViewLocator, ViewQuery, ViewRow};

/// Default collection holding the documents of a database
pub const DEFAULT_DOCS_COLLECTION: &str = "docs";

/// Transport reading views and documents from MongoDB
#[derive(Clone)]
pub struct MongoTransport {
    /// MongoDB client instance
    client: Client,
    /// Collection holding documents in every database
    docs_collection: String,
}

impl MongoTransport {
    /// Connect to MongoDB
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection URI
    /// * `docs_collection` - Collection holding the documents
    ///
    /// # Returns
    /// * `Result<Self, TransportError>` - Connected transport or error
    pub async fn connect(uri: &str, docs_collection: &str) -> Result<Self, TransportError> {
        let client = Client::with_uri_str(uri).await?;
        info!("Connected MongoDB transport (documents in '{}')", docs_collection);
        Ok(Self::with_client(client, docs_collection))
    }

    /// Wrap an existing client
    pub fn with_client(client: Client, docs_collection: &str) -> Self {
        Self {
            client,
            docs_collection: docs_collection.to_string(),
        }
    }

    fn view_collection(&self, view: &ViewLocator) -> Collection<Document> {
        self.client
            .database(&view.db)
            .collection(&format!("{}.{}", view.design, view.view))
    }

    fn docs(&self, db: &str) -> Collection<Document> {
        self.client.database(db).collection(&self.docs_collection)
    }

    /// Load documents by `_id`, keyed by the JSON rendering of the id
    async fn load_docs(
        &self,
        db: &str,
        ids: Vec<Bson>,
    ) -> Result<HashMap<String, Value>, TransportError> {
        let cursor = self.docs(db).find(doc! { "_id": { "$in": ids } }).await?;
        let found: Vec<Document> = cursor.try_collect().await?;

        Ok(found
            .into_iter()
            .map(|d| {
                let id = d.get("_id").cloned().map(to_json).unwrap_or(Value::Null);
                (id_lookup_key(&id), to_json(Bson::Document(d)))
            })
            .collect())
    }
}

#[async_trait]
impl ViewClient for MongoTransport {
    async fn query_view(
        &self,
        view: &ViewLocator,
        query: &ViewQuery,
    ) -> Result<Vec<ViewRow>, TransportError> {
        let pipeline = page_pipeline(query)?;
        let cursor = self.view_collection(view).aggregate(pipeline).await?;
        let records: Vec<Document> = cursor.try_collect().await?;

        debug!("View {} returned {} rows", view, records.len());
        Ok(records.into_iter().map(row_from_record).collect())
    }

    async fn fetch_docs(&self, db: &str, keys: &[Value]) -> Result<Vec<ViewRow>, TransportError> {
        let ids = keys
            .iter()
            .map(|k| bson::to_bson(k))
            .collect::<Result<Vec<_>, _>>()?;
        let mut docs = self.load_docs(db, ids).await?;

        Ok(keys
            .iter()
            .map(|key| {
                let doc = docs.remove(&id_lookup_key(key));
                ViewRow {
                    id: doc.as_ref().map(|_| crate::transport::display_key(key)),
                    key: key.clone(),
                    value: Value::Null,
                    doc,
                }
            })
            .collect())
    }

    async fn query_view_with_docs(
        &self,
        view: &ViewLocator,
        keys: &[Value],
    ) -> Result<Vec<ViewRow>, TransportError> {
        let pipeline = keys_pipeline(keys)?;
        let cursor = self.view_collection(view).aggregate(pipeline).await?;
        let records: Vec<Document> = cursor.try_collect().await?;
        let mut rows: Vec<ViewRow> = records.into_iter().map(row_from_record).collect();

        let ids: Vec<Bson> = rows
            .iter()
            .filter_map(|row| row.id.clone())
            .map(Bson::String)
            .collect();
        let docs = self.load_docs(&view.db, ids).await?;

        for row in &mut rows {
            row.doc = row
                .id
                .as_ref()
                .and_then(|id| docs.get(&id_lookup_key(&Value::String(id.clone()))))
                .cloned();
        }
        Ok(rows)
    }
}

/// Key as an expression operand; `$literal` keeps strings like `"$x"` from
/// being read as field paths
fn key_operand(key: &Value) -> Result<Bson, TransportError> {
    Ok(Bson::Document(doc! { "$literal": bson::to_bson(key)? }))
}

/// Sort by (key, id) with the key compared as a whole value
///
/// `__view_sort` holds `{k: key}` only while the pipeline sorts.
fn sort_stages() -> [Document; 3] {
    [
        doc! { "$addFields": { "__view_sort": { "k": "$key" } } },
        doc! { "$sort": { "__view_sort": 1, "id": 1 } },
        doc! { "$project": { "__view_sort": 0 } },
    ]
}

/// Pipeline reading one page of a view
///
/// Starts inclusively at (start_key, start_doc_id), or at the first row whose
/// key is at least `start_key` when no doc id is given.
fn page_pipeline(query: &ViewQuery) -> Result<Vec<Document>, TransportError> {
    let limit = i64::try_from(query.limit)
        .ok()
        .filter(|l| *l > 0)
        .ok_or_else(|| TransportError::Conversion(format!("invalid limit {}", query.limit)))?;

    let mut pipeline = Vec::with_capacity(5);
    if let Some(key) = &query.start_key {
        let key = key_operand(key)?;
        let filter = match &query.start_doc_id {
            Some(id) => doc! {
                "$or": [
                    { "$gt": ["$key", key.clone()] },
                    { "$and": [
                        { "$eq": ["$key", key] },
                        { "$gte": ["$id", id.as_str()] },
                    ] },
                ]
            },
            None => doc! { "$gte": ["$key", key] },
        };
        pipeline.push(doc! { "$match": { "$expr": filter } });
    }

    let [add, sort, project] = sort_stages();
    pipeline.extend([add, sort, doc! { "$limit": limit }, project]);
    Ok(pipeline)
}

/// Pipeline reading every row whose key equals one of `keys`
///
/// `$in` inside `$expr` matches whole values; the query form would also
/// match array keys that merely contain a requested key.
fn keys_pipeline(keys: &[Value]) -> Result<Vec<Document>, TransportError> {
    let keys = keys
        .iter()
        .map(|k| bson::to_bson(k))
        .collect::<Result<Vec<_>, _>>()?;

    let mut pipeline = vec![doc! {
        "$match": { "$expr": { "$in": ["$key", { "$literal": keys }] } }
    }];
    pipeline.extend(sort_stages());
    Ok(pipeline)
}

fn to_json(value: Bson) -> Value {
    value.into_relaxed_extjson()
}

fn id_lookup_key(id: &Value) -> String {
    id.to_string()
}

/// Convert a view record (`{key, id, value}`) into a row
fn row_from_record(mut record: Document) -> ViewRow {
    let id = match record.remove("id") {
        Some(Bson::String(s)) => Some(s),
        Some(Bson::Null) | None => None,
        Some(other) => Some(crate::transport::display_key(&to_json(other))),
    };
    ViewRow {
        id,
        key: record.remove("key").map(to_json).unwrap_or(Value::Null),
        value: record.remove("value").map(to_json).unwrap_or(Value::Null),
        doc: None,
    }
}
