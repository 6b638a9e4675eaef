//! Text and JSON rendering of search results.
use std::fmt::Write;

use clap::ValueEnum;
use serde_json::{Value, json};

use crate::catalog::ColumnDescriptor;
use crate::search::SearchResult;

/// Columns listed per table before the remainder is summarized.
pub const MAX_COLUMNS_SHOWN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn render(results: &[SearchResult], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(results),
        OutputFormat::Json => format!("{:#}", render_json(results)),
    }
}

pub fn render_json(results: &[SearchResult]) -> Value {
    Value::Array(
        results
            .iter()
            .map(|r| {
                let columns: Vec<Value> = limited_columns(&r.descriptor.columns)
                    .into_iter()
                    .map(|c| {
                        json!({
                            "name": c.name,
                            "type": c.data_type,
                            "description": c.description,
                        })
                    })
                    .collect();
                json!({
                    "rank": r.rank,
                    "table_id": r.table_id,
                    "table_name": r.descriptor.name,
                    "table_schema": r.descriptor.schema,
                    "description": r.descriptor.description,
                    "relevance_score": round4(r.score),
                    "columns": columns,
                })
            })
            .collect(),
    )
}

pub fn render_text(results: &[SearchResult]) -> String {
    let mut out = String::new();
    if results.is_empty() {
        out.push_str("\nNo results found.\n");
        return out;
    }

    let rule = "=".repeat(80);
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "Found {} relevant tables:", results.len());
    let _ = writeln!(out, "{rule}\n");

    for r in results {
        let table = &r.descriptor;
        let _ = writeln!(out, "Rank #{}", r.rank);
        let _ = writeln!(out, "Table: {}", table.name);
        let _ = writeln!(out, "Schema: {}", table.schema);
        let _ = writeln!(out, "Full ID: {}", r.table_id);
        let _ = writeln!(out, "Relevance Score: {:.4}", r.score);
        let _ = writeln!(out, "Description: {}", table.description);

        let columns = limited_columns(&table.columns);
        if !columns.is_empty() {
            let _ = writeln!(out, "\nKey Columns:");
            for col in columns {
                if col.name == "..." {
                    let _ = writeln!(out, "  - {}", col.data_type);
                } else if col.description.is_empty() {
                    let _ = writeln!(out, "  - {} ({})", col.name, col.data_type);
                } else {
                    let _ = writeln!(
                        out,
                        "  - {} ({}) - {}",
                        col.name, col.data_type, col.description
                    );
                }
            }
        }

        let _ = writeln!(out, "\n{}\n", "-".repeat(80));
    }
    out
}

/// First [`MAX_COLUMNS_SHOWN`] columns plus a `...` marker counting the rest.
fn limited_columns(columns: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
    let mut shown: Vec<ColumnDescriptor> =
        columns.iter().take(MAX_COLUMNS_SHOWN).cloned().collect();
    if columns.len() > MAX_COLUMNS_SHOWN {
        shown.push(ColumnDescriptor::new(
            "...",
            format!("({} more columns)", columns.len() - MAX_COLUMNS_SHOWN),
            "",
        ));
    }
    shown
}

fn round4(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 10_000.0
}
