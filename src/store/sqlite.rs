//! SQLite backend for local database files.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{float_cell, CatalogColumn, Cell, QueryRows, SqlStore, StoreError};

const CATALOG_QUERY: &str = "SELECT m.name, p.name, p.type \
     FROM sqlite_master AS m JOIN pragma_table_info(m.name) AS p \
     WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' \
     ORDER BY m.name, p.cid";

/// SQLite store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a `sqlite:` URL.
    ///
    /// In-memory databases are pinned to a single connection that never
    /// expires, otherwise each pooled connection would see its own empty
    /// database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = if is_memory_url(url) {
            SqlitePoolOptions::new().max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = options.connect(url).await?;
        Ok(Self { pool })
    }

    /// Open a private in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Get the database pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[async_trait]
impl SqlStore for SqliteStore {
    async fn catalog(&self) -> Result<Vec<CatalogColumn>, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let rows: Vec<(String, String, String)> =
            sqlx::query_as(CATALOG_QUERY).fetch_all(&mut *conn).await?;

        Ok(rows
            .into_iter()
            .map(|(table, column, data_type)| CatalogColumn { table, column, data_type })
            .collect())
    }

    async fn run_query(&self, sql: &str) -> Result<QueryRows, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query(sql).persistent(false).fetch_all(&mut *conn).await?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| decode_cell(row, i)).collect())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryRows { columns, rows })
    }

    fn dialect(&self) -> &'static str {
        "SQLite"
    }
}

/// Decode one cell by its storage class. SQLite columns are dynamically
/// typed, so the value's own type decides the decoding.
fn decode_cell(row: &SqliteRow, index: usize) -> Result<Cell, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let cell = match type_name.as_str() {
        "INTEGER" => Value::from(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => float_cell(row.try_get_unchecked::<f64, _>(index)?),
        "BOOLEAN" => Value::Bool(row.try_get_unchecked::<bool, _>(index)?),
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            Value::String(format!("<{} bytes>", bytes.len()))
        }
        _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
    };

    Ok(cell)
}
