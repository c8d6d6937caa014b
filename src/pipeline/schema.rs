//! Schema introspection.
//!
//! Renders the store's catalog into the text block used in query prompts.
//! Introspection never fails: a catalog fault yields a placeholder so the
//! pipeline can still reach an answer.

use std::sync::Arc;

use crate::store::{CatalogColumn, SqlStore};

/// Schema text used when the catalog cannot be read.
pub const SCHEMA_UNAVAILABLE: &str = "Error fetching schema.";

/// Schema text used when the catalog has no tables.
pub const SCHEMA_EMPTY: &str = "No tables found in the catalog.";

/// Reads and renders the store catalog.
pub struct SchemaIntrospector {
    store: Arc<dyn SqlStore>,
}

impl SchemaIntrospector {
    pub fn new(store: Arc<dyn SqlStore>) -> Self {
        Self { store }
    }

    /// Fetch the current schema description.
    pub async fn fetch(&self) -> String {
        match self.store.catalog().await {
            Ok(columns) => {
                tracing::debug!(columns = columns.len(), "read store catalog");
                render_schema(&columns)
            }
            Err(e) => {
                tracing::warn!(error = %e, "schema introspection failed");
                SCHEMA_UNAVAILABLE.to_string()
            }
        }
    }
}

/// Render catalog columns grouped by table.
///
/// Columns must already be ordered by table, then position. Each table opens
/// with a `TABLE: <name>` header and tables are separated by a blank line.
pub fn render_schema(columns: &[CatalogColumn]) -> String {
    if columns.is_empty() {
        return SCHEMA_EMPTY.to_string();
    }

    let mut out = String::new();
    let mut current: Option<&str> = None;

    for column in columns {
        if current != Some(column.table.as_str()) {
            if current.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("TABLE: {}\n", column.table));
            current = Some(column.table.as_str());
        }
        out.push_str(&format!(" - {} ({})\n", column.column, column.data_type));
    }

    out.trim_end().to_string()
}
