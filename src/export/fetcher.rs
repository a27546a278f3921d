//! Batched document retrieval
//!
//! Splits a key set into consecutive chunks and retrieves them one at a
//! time. A chunk is only requested once the caller asks for it, so at most
//! one batch of documents is alive at any point.

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::transport::{DocSource, ViewClient, ViewRow, display_key};

/// Pull-based batch fetcher over one key set
pub struct BatchFetcher<'a> {
    client: &'a dyn ViewClient,
    source: &'a DocSource,
    chunks: std::slice::Chunks<'a, Value>,
    requests: u64,
}

impl<'a> BatchFetcher<'a> {
    /// Create a fetcher
    ///
    /// # Arguments
    /// * `client` - Transport to query
    /// * `source` - Retrieval strategy
    /// * `keys` - Keys to retrieve, in request order
    /// * `batch_size` - Maximum keys per request, at least 1
    pub fn new(
        client: &'a dyn ViewClient,
        source: &'a DocSource,
        keys: &'a [Value],
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.max(1);
        if !keys.is_empty() {
            debug!(
                "Fetching {} documents from {} in batches of {} documents",
                keys.len(),
                source,
                batch_size
            );
        }
        Self {
            client,
            source,
            chunks: keys.chunks(batch_size),
            requests: 0,
        }
    }

    /// Number of retrieval requests issued so far
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Retrieve the next batch
    ///
    /// # Returns
    /// * `Result<Option<Vec<ViewRow>>>` - Rows of the next chunk, or None when all chunks are done
    pub async fn next_batch(&mut self) -> Result<Option<Vec<ViewRow>>> {
        let Some(chunk) = self.chunks.next() else {
            return Ok(None);
        };

        debug!(
            "Fetching {} documents starting from key {}",
            chunk.len(),
            display_key(&chunk[0])
        );

        let rows = self.client.retrieve(self.source, chunk).await?;
        self.requests += 1;
        Ok(Some(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExportError, TransportError};
    use crate::transport::{MemoryTransport, Request, ViewLocator, ViewQuery};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn store(n: usize) -> MemoryTransport {
        let mut transport = MemoryTransport::new();
        for i in 0..n {
            transport.insert_doc("db", json!({"_id": i.to_string(), "n": i}));
        }
        transport
    }

    fn keys(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!(i.to_string())).collect()
    }

    #[tokio::test]
    async fn test_chunks_cover_keys_in_order() {
        for (n, batch) in [(10usize, 3usize), (9, 3), (1, 5), (7, 1), (5, 100)] {
            let transport = store(n);
            let source = DocSource::Direct { db: "db".into() };
            let keys = keys(n);
            let mut fetcher = BatchFetcher::new(&transport, &source, &keys, batch);

            let mut docs = Vec::new();
            while let Some(rows) = fetcher.next_batch().await.unwrap() {
                docs.extend(rows.into_iter().filter_map(|r| r.doc));
            }

            assert_eq!(fetcher.requests(), n.div_ceil(batch) as u64);
            let requested: Vec<Vec<Value>> = transport
                .requests()
                .into_iter()
                .map(|r| match r {
                    Request::FetchDocs { keys, .. } => keys,
                    other => panic!("unexpected request {other:?}"),
                })
                .collect();
            assert!(requested.iter().all(|k| !k.is_empty() && k.len() <= batch));
            assert_eq!(requested.concat(), keys);
            assert_eq!(docs.len(), n);
        }
    }

    #[tokio::test]
    async fn test_empty_keys_issue_no_request() {
        let transport = store(3);
        let source = DocSource::Direct { db: "db".into() };
        let mut fetcher = BatchFetcher::new(&transport, &source, &[], 2);

        assert!(fetcher.next_batch().await.unwrap().is_none());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_via_view_strategy() {
        let mut transport = store(4);
        let view = ViewLocator::new("db", "docs", "by_parity");
        transport.build_view(view.clone(), |doc| {
            vec![(json!(doc["n"].as_u64().unwrap_or(0) % 2), Value::Null)]
        });
        let source = DocSource::ViaView(view.clone());
        let keys = vec![json!(1)];
        let mut fetcher = BatchFetcher::new(&transport, &source, &keys, 10);

        let rows = fetcher.next_batch().await.unwrap().unwrap();
        let ns: Vec<Value> = rows.iter().map(|r| r.doc.as_ref().unwrap()["n"].clone()).collect();
        assert_eq!(ns, vec![json!(1), json!(3)]);
        assert_eq!(
            transport.requests(),
            vec![Request::QueryViewWithDocs { view, keys }]
        );
    }

    /// Fails the retrieval whose index equals `fail_at`
    struct FlakyClient {
        fail_at: usize,
        calls: Mutex<Vec<Vec<Value>>>,
    }

    #[async_trait]
    impl ViewClient for FlakyClient {
        async fn query_view(
            &self,
            _view: &ViewLocator,
            _query: &ViewQuery,
        ) -> std::result::Result<Vec<ViewRow>, TransportError> {
            unreachable!()
        }

        async fn fetch_docs(
            &self,
            db: &str,
            keys: &[Value],
        ) -> std::result::Result<Vec<ViewRow>, TransportError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(keys.to_vec());
            if calls.len() - 1 == self.fail_at {
                return Err(TransportError::QueryFailed {
                    target: db.to_string(),
                    message: "boom".to_string(),
                });
            }
            Ok(Vec::new())
        }

        async fn query_view_with_docs(
            &self,
            _view: &ViewLocator,
            _keys: &[Value],
        ) -> std::result::Result<Vec<ViewRow>, TransportError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_first_failure_stops_fetching() {
        let client = FlakyClient {
            fail_at: 1,
            calls: Mutex::new(Vec::new()),
        };
        let source = DocSource::Direct { db: "db".into() };
        let keys = keys(6);
        let mut fetcher = BatchFetcher::new(&client, &source, &keys, 2);

        assert!(fetcher.next_batch().await.unwrap().is_some());
        let err = fetcher.next_batch().await.unwrap_err();
        assert!(matches!(err, ExportError::Transport(_)));
        assert_eq!(client.calls.lock().unwrap().len(), 2);
    }
}
