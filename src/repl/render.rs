//! Plain-text result tables.

use serde_json::Value;

use crate::store::Row;

/// Render up to `limit` rows as an aligned text table.
///
/// The footer always reports the full row count, so truncation is visible.
pub fn render_table(columns: &[String], rows: &[Row], limit: usize) -> String {
    let shown = &rows[..rows.len().min(limit)];

    let cells: Vec<Vec<String>> =
        shown.iter().map(|row| row.iter().map(render_cell).collect()).collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(width) => *width = (*width).max(len),
                None => widths.push(len),
            }
        }
    }

    let mut out = String::new();
    if !columns.is_empty() {
        out.push_str(&format_line(columns, &widths));
        out.push('\n');
        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&separator.join("-+-"));
        out.push('\n');
    }
    for row in &cells {
        out.push_str(&format_line(row, &widths));
        out.push('\n');
    }

    let total = rows.len();
    if shown.len() < total {
        out.push_str(&format!("Showing {} of {} rows", shown.len(), total));
    } else {
        out.push_str(&format!("{} {}", total, if total == 1 { "row" } else { "rows" }));
    }
    out
}

fn format_line(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

/// Strings print bare, nulls as `NULL`, everything else as compact JSON.
pub fn render_cell(cell: &Value) -> String {
    match cell {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
