//! Export options and their validated plan
//!
//! [`ExportOptions`] mirrors what a caller configures. [`ExportPlan`] is the
//! checked form the coordinator runs: locators are complete, fetch sizes are
//! positive and the document retrieval strategy has been chosen.

use std::time::Duration;

use crate::error::ConfigError;
use crate::transport::{DocSource, ViewLocator};

use super::derive::{DocDerivation, KeyDerivation};
use super::paginator::PageBoundary;

/// Default number of rows per index page and keys per document batch
pub const DEFAULT_FETCH_SIZE: usize = 1000;

/// Index retrieval options
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub db: String,
    pub design: String,
    pub view: String,
    /// Rows per index page
    pub fetch_size: usize,
    /// How page rows become document keys
    pub key_from: KeyDerivation,
    pub boundary: PageBoundary,
    /// Pause between index page requests
    pub page_delay: Option<Duration>,
}

/// Document retrieval options
///
/// Setting both `design` and `view` retrieves documents through that view;
/// otherwise documents are fetched directly from `db`.
#[derive(Debug, Clone)]
pub struct DocsOptions {
    pub db: String,
    pub design: Option<String>,
    pub view: Option<String>,
    /// Keys per retrieval request
    pub fetch_size: usize,
    /// How retrieved rows become documents
    pub doc_from: DocDerivation,
}

/// Caller-facing export configuration
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub index: IndexOptions,
    pub docs: DocsOptions,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            db: String::new(),
            design: String::new(),
            view: String::new(),
            fetch_size: DEFAULT_FETCH_SIZE,
            key_from: KeyDerivation::default(),
            boundary: PageBoundary::default(),
            page_delay: None,
        }
    }
}

impl Default for DocsOptions {
    fn default() -> Self {
        Self {
            db: String::new(),
            design: None,
            view: None,
            fetch_size: DEFAULT_FETCH_SIZE,
            doc_from: DocDerivation::default(),
        }
    }
}

impl IndexOptions {
    pub fn new(db: impl Into<String>, design: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            design: design.into(),
            view: view.into(),
            ..Self::default()
        }
    }
}

impl DocsOptions {
    /// Fetch documents directly from `db`
    pub fn direct(db: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            ..Self::default()
        }
    }

    /// Fetch documents through `design/view` of `db`
    pub fn via_view(
        db: impl Into<String>,
        design: impl Into<String>,
        view: impl Into<String>,
    ) -> Self {
        Self {
            db: db.into(),
            design: Some(design.into()),
            view: Some(view.into()),
            ..Self::default()
        }
    }
}

/// Validated export plan
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub index: ViewLocator,
    pub page_size: usize,
    pub boundary: PageBoundary,
    pub page_delay: Option<Duration>,
    pub key_derivation: KeyDerivation,
    pub source: DocSource,
    pub batch_size: usize,
    pub doc_derivation: DocDerivation,
}

impl ExportPlan {
    /// Validate options and choose the retrieval strategy
    ///
    /// # Returns
    /// * `Result<Self, ConfigError>` - Plan, or the first configuration problem found
    pub fn from_options(options: &ExportOptions) -> Result<Self, ConfigError> {
        let index = &options.index;
        let docs = &options.docs;

        let index_view = ViewLocator::new(
            required("index.db", &index.db)?,
            required("index.design", &index.design)?,
            required("index.view", &index.view)?,
        );
        let page_size = positive("index.fetch_size", index.fetch_size)?;
        // Page requests ask for one extra row
        if page_size.checked_add(1).is_none() {
            return Err(ConfigError::invalid("index.fetch_size", page_size));
        }

        let docs_db = required("docs.db", &docs.db)?;
        let design = docs.design.as_deref().filter(|s| !s.trim().is_empty());
        let view = docs.view.as_deref().filter(|s| !s.trim().is_empty());
        let source = match (design, view) {
            (Some(design), Some(view)) => DocSource::ViaView(ViewLocator::new(docs_db, design, view)),
            (None, None) => DocSource::Direct { db: docs_db },
            (Some(_), None) => return Err(ConfigError::MissingField("docs.view".to_string())),
            (None, Some(_)) => return Err(ConfigError::MissingField("docs.design".to_string())),
        };
        let batch_size = positive("docs.fetch_size", docs.fetch_size)?;

        Ok(Self {
            index: index_view,
            page_size,
            boundary: index.boundary,
            page_delay: index.page_delay,
            key_derivation: index.key_from.clone(),
            source,
            batch_size,
            doc_derivation: docs.doc_from.clone(),
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingField(field.to_string()));
    }
    Ok(value.to_string())
}

fn positive(field: &str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(docs: DocsOptions) -> ExportOptions {
        ExportOptions {
            index: IndexOptions::new("people", "index", "by_name"),
            docs,
        }
    }

    #[test]
    fn test_direct_strategy_without_design_and_view() {
        let plan = ExportPlan::from_options(&options(DocsOptions::direct("people"))).unwrap();
        assert_eq!(plan.source, DocSource::Direct { db: "people".into() });
        assert_eq!(plan.page_size, DEFAULT_FETCH_SIZE);
        assert_eq!(plan.index.to_string(), "people/index/by_name");
    }

    #[test]
    fn test_via_view_strategy_with_design_and_view() {
        let plan =
            ExportPlan::from_options(&options(DocsOptions::via_view("people", "docs", "all")))
                .unwrap();
        assert_eq!(
            plan.source,
            DocSource::ViaView(ViewLocator::new("people", "docs", "all"))
        );
    }

    #[test]
    fn test_blank_design_means_direct() {
        let mut docs = DocsOptions::direct("people");
        docs.design = Some("  ".into());
        docs.view = Some(String::new());
        let plan = ExportPlan::from_options(&options(docs)).unwrap();
        assert!(matches!(plan.source, DocSource::Direct { .. }));
    }

    #[test]
    fn test_half_configured_view_rejected() {
        let mut docs = DocsOptions::direct("people");
        docs.design = Some("docs".into());
        let err = ExportPlan::from_options(&options(docs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "docs.view"));
    }

    #[test]
    fn test_missing_locators_rejected() {
        let err = ExportPlan::from_options(&ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "index.db"));

        let err = ExportPlan::from_options(&options(DocsOptions::direct(""))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "docs.db"));
    }

    #[test]
    fn test_page_size_without_room_for_lookahead_rejected() {
        let mut opts = options(DocsOptions::direct("people"));
        opts.index.fetch_size = usize::MAX;
        let err = ExportPlan::from_options(&opts).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "index.fetch_size"));

        opts.index.fetch_size = usize::MAX - 1;
        assert_eq!(ExportPlan::from_options(&opts).unwrap().page_size, usize::MAX - 1);
    }

    #[test]
    fn test_zero_fetch_size_rejected() {
        let mut opts = options(DocsOptions::direct("people"));
        opts.docs.fetch_size = 0;
        let err = ExportPlan::from_options(&opts).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "docs.fetch_size"));
    }
}
