//! Relational store access.
//!
//! The pipeline talks to the database through [`SqlStore`]. Backends hold a
//! bounded sqlx pool; every call acquires a pooled connection and returns it
//! when the connection guard drops, including on error paths.

mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use postgres::PgStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::core::DatabaseConfig;

/// A single result cell. Values are opaque to the pipeline.
pub type Cell = Value;

/// One result row, in column order.
pub type Row = Vec<Cell>;

/// One column entry from the store's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    /// Table name
    pub table: String,
    /// Column name
    pub column: String,
    /// Declared column type
    pub data_type: String,
}

impl CatalogColumn {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self { table: table.into(), column: column.into(), data_type: data_type.into() }
    }
}

/// Rows returned by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    /// Column names, empty when no rows came back
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<Row>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("Unsupported database URL: {0}")]
    UnsupportedUrl(String),
}

/// Trait for relational store backends.
#[async_trait]
pub trait SqlStore: Send + Sync {
    /// Read catalog metadata ordered by table, then column position.
    async fn catalog(&self) -> Result<Vec<CatalogColumn>, StoreError>;

    /// Execute an arbitrary query and collect every row.
    async fn run_query(&self, sql: &str) -> Result<QueryRows, StoreError>;

    /// SQL dialect name, used in prompts.
    fn dialect(&self) -> &'static str;
}

/// Connect to the store described by the `[database]` config section.
///
/// Postgres pools connect lazily so that an unreachable database surfaces as
/// a contained phase fault rather than a startup failure.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn SqlStore>, StoreError> {
    let url = config.connection_url();

    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok(Arc::new(PgStore::connect_lazy(&url, config)?));
    }

    #[cfg(feature = "sqlite")]
    if url.starts_with("sqlite:") {
        return Ok(Arc::new(SqliteStore::connect(&url, config.max_connections).await?));
    }

    Err(StoreError::UnsupportedUrl(redact_url(&url)))
}

/// Mask the password in a URL before it is shown to the user.
///
/// `postgres://analyst:secret@db/sales` becomes `postgres://analyst:***@db/sales`.
/// URLs without a password are returned unchanged.
pub(crate) fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let start = scheme_end + 3;
    let end = url[start..].find(|c| c == '/' || c == '?').map_or(url.len(), |i| start + i);
    let authority = &url[start..end];

    let Some(at) = authority.rfind('@') else {
        return url.to_string();
    };
    match authority[..at].find(':') {
        Some(colon) => format!("{}:***{}", &url[..start + colon], &url[start + at..]),
        None => url.to_string(),
    }
}

/// Convert a float into a JSON cell, mapping non-finite values to null.
pub(crate) fn float_cell(value: f64) -> Cell {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url_hides_credentials() {
        assert_eq!(
            redact_url("mysql://admin:secret@db:3306/sales"),
            "mysql://admin:***@db:3306/sales"
        );
        assert_eq!(redact_url("postgres://a:p@ss@wh/sales"), "postgres://a:***@wh/sales");
        assert_eq!(redact_url("oracle:thin"), "oracle:thin");
    }

    #[test]
    fn test_redact_url_keeps_urls_without_password() {
        assert_eq!(redact_url("postgres://analyst@wh/sales"), "postgres://analyst@wh/sales");
        assert_eq!(redact_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(redact_url("sqlite://data/a@b.db"), "sqlite://data/a@b.db");
    }

    #[test]
    fn test_float_cell_non_finite() {
        assert_eq!(float_cell(f64::NAN), Value::Null);
        assert_eq!(float_cell(2.5), serde_json::json!(2.5));
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let config = DatabaseConfig {
            url: Some("mysql://root:pw@localhost/sales".to_string()),
            ..Default::default()
        };
        let err = connect(&config).await.err().unwrap();
        assert!(matches!(err, StoreError::UnsupportedUrl(_)));
        assert!(!err.to_string().contains("pw"));
    }
}
