//! Query execution.
//!
//! Every fault raised while running a generated query is contained here and
//! turned into [`ExecutionOutcome::Failed`]. A bad query degrades the answer;
//! it never aborts the question.

use std::sync::Arc;

use serde::Serialize;

use crate::store::{Row, SqlStore};

/// Prefix of every failure summary.
pub const ERROR_MARKER: &str = "SQL Error:";

/// Summary used when a query returns no rows.
pub const NO_ROWS_SUMMARY: &str = "Query executed successfully; no rows returned.";

/// Result of running a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The query produced rows.
    Rows { columns: Vec<String>, rows: Vec<Row> },
    /// The query ran but produced nothing.
    Empty,
    /// The query could not be executed.
    Failed { message: String },
}

impl ExecutionOutcome {
    /// Text description handed to answer synthesis.
    pub fn summary(&self) -> String {
        match self {
            ExecutionOutcome::Rows { columns, rows } => {
                let columns = serde_json::to_string(columns).unwrap_or_default();
                let rows = serde_json::to_string(rows).unwrap_or_default();
                format!("Columns: {}\nData: {}", columns, rows)
            }
            ExecutionOutcome::Empty => NO_ROWS_SUMMARY.to_string(),
            ExecutionOutcome::Failed { message } => format!("{} {}", ERROR_MARKER, message),
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            ExecutionOutcome::Rows { columns, .. } => columns,
            _ => &[],
        }
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            ExecutionOutcome::Rows { rows, .. } => rows,
            _ => &[],
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionOutcome::Failed { .. })
    }
}

/// Runs generated queries against the store.
pub struct QueryExecutor {
    store: Arc<dyn SqlStore>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn SqlStore>) -> Self {
        Self { store }
    }

    /// Execute a query. Never fails; faults become [`ExecutionOutcome::Failed`].
    pub async fn execute(&self, query: &str) -> ExecutionOutcome {
        tracing::info!(query, "executing generated query");

        match self.store.run_query(query).await {
            Ok(result) if result.is_empty() => ExecutionOutcome::Empty,
            Ok(result) => {
                tracing::debug!(rows = result.rows.len(), "query returned rows");
                ExecutionOutcome::Rows { columns: result.columns, rows: result.rows }
            }
            Err(e) => {
                tracing::warn!(error = %e, "query failed; passing the error on as data");
                ExecutionOutcome::Failed { message: e.to_string() }
            }
        }
    }
}
