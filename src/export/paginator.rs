//! Index pagination
//!
//! Reads a sorted view page by page. Each request asks for one row more than
//! the page size; a response shorter than that is the last page. The next
//! request starts inclusively at a (key, document id) cursor, which keeps
//! pagination moving forward even when many rows share one key.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ConfigError, ExportError, Result};
use crate::transport::{ViewClient, ViewLocator, ViewQuery, ViewRow, display_key};

/// How the row at a page boundary is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageBoundary {
    /// The extra row of a full page is held back and starts the next page;
    /// every row is delivered exactly once
    #[default]
    Lookahead,
    /// Every returned row is delivered and the last one starts the next
    /// page, so boundary rows are delivered twice
    Overlap,
}

impl FromStr for PageBoundary {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lookahead" => Ok(PageBoundary::Lookahead),
            "overlap" => Ok(PageBoundary::Overlap),
            _ => Err(ConfigError::invalid("boundary", s)),
        }
    }
}

/// Resume position of the next page request
#[derive(Debug, Clone, Default, PartialEq)]
struct Cursor {
    key: Option<Value>,
    doc_id: Option<String>,
}

/// Pull-based paginator over a view
pub struct IndexPaginator<'a> {
    client: &'a dyn ViewClient,
    view: &'a ViewLocator,
    page_size: usize,
    boundary: PageBoundary,
    page_delay: Option<Duration>,
    cursor: Cursor,
    done: bool,
    requests: u64,
}

impl<'a> IndexPaginator<'a> {
    /// Create a paginator
    ///
    /// # Arguments
    /// * `client` - Transport to query
    /// * `view` - View to paginate
    /// * `page_size` - Rows per page, clamped to `1..usize::MAX`
    pub fn new(client: &'a dyn ViewClient, view: &'a ViewLocator, page_size: usize) -> Self {
        Self {
            client,
            view,
            page_size: page_size.clamp(1, usize::MAX - 1),
            boundary: PageBoundary::default(),
            page_delay: None,
            cursor: Cursor::default(),
            done: false,
            requests: 0,
        }
    }

    pub fn with_boundary(mut self, boundary: PageBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Pause before every page request after the first
    pub fn with_page_delay(mut self, delay: Option<Duration>) -> Self {
        self.page_delay = delay.filter(|d| !d.is_zero());
        self
    }

    /// Number of page requests issued so far
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Fetch the next page
    ///
    /// An empty view yields one empty page. The cursor only advances once
    /// this returns, so the caller finishes with a page before the next one
    /// is requested.
    ///
    /// # Returns
    /// * `Result<Option<Vec<ViewRow>>>` - Next page, or None once pagination is complete
    pub async fn next_page(&mut self) -> Result<Option<Vec<ViewRow>>> {
        if self.done {
            return Ok(None);
        }

        if self.requests > 0 {
            if let Some(delay) = self.page_delay {
                tokio::time::sleep(delay).await;
            }
        }

        let query = ViewQuery {
            start_key: self.cursor.key.clone(),
            start_doc_id: self.cursor.doc_id.clone(),
            limit: self.page_size + 1,
        };

        debug!(
            "Fetching index from view {} in pages of {} entries starting from key {} & doc id {}",
            self.view,
            self.page_size,
            query.start_key.as_ref().map(display_key).unwrap_or_else(|| "null".into()),
            query.start_doc_id.as_deref().unwrap_or("null"),
        );

        let mut rows = self.client.query_view(self.view, &query).await?;
        self.requests += 1;

        if rows.len() < query.limit {
            self.done = true;
            info!(
                "Index {} exhausted after {} page requests",
                self.view, self.requests
            );
            return Ok(Some(rows));
        }

        let boundary_row = match self.boundary {
            PageBoundary::Lookahead => rows.pop(),
            PageBoundary::Overlap => rows.last().cloned(),
        };
        if let Some(row) = boundary_row {
            let next = Cursor {
                key: Some(row.key),
                doc_id: row.id,
            };
            // A whole page at one position would be requested forever
            if next == self.cursor {
                return Err(ExportError::Generic(format!(
                    "Pagination of {} stalled: more than {} rows share key {} and doc id {}",
                    self.view,
                    self.page_size,
                    next.key.as_ref().map(display_key).unwrap_or_default(),
                    next.doc_id.as_deref().unwrap_or("null"),
                )));
            }
            self.cursor = next;
        }

        Ok(Some(rows))
    }
}
