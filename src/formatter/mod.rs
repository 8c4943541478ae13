//! Output formatting for the command line
//!
//! Pages and catalog entries are shown as tables by default, or as JSON for
//! piping into other tools.

pub mod json;
pub mod table;

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::catalog::ColumnCatalogEntry;
use crate::error::Result;
use crate::explorer::DatasetInfo;
use crate::export::ExportSummary;
use crate::query::QueryResult;

pub use json::JsonFormatter;
pub use table::{TableFormatter, TableStyle};

/// Output format type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Table with a header row
    #[default]
    Table,
    /// Single-line JSON
    Json,
    /// Indented JSON
    JsonPretty,
}

/// Main formatter for command results
pub struct Formatter {
    format: OutputFormat,
    table: TableFormatter,
}

impl Formatter {
    /// Create a new formatter
    ///
    /// # Arguments
    /// * `format` - Output format type
    /// * `use_colors` - Color the table header
    pub fn new(format: OutputFormat, use_colors: bool) -> Self {
        Self {
            format,
            table: TableFormatter::with_colors(use_colors),
        }
    }

    fn json(&self) -> Option<JsonFormatter> {
        match self.format {
            OutputFormat::Table => None,
            OutputFormat::Json => Some(JsonFormatter::new(false)),
            OutputFormat::JsonPretty => Some(JsonFormatter::new(true)),
        }
    }

    /// Format a page, with a position line under the table
    pub fn format_page(&self, page: &QueryResult) -> Result<String> {
        if let Some(json) = self.json() {
            return json.format_page(page);
        }
        let first = if page.rows.is_empty() { page.offset } else { page.offset + 1 };
        Ok(format!(
            "{}\nRows {}-{} of {} matching ({} total)",
            self.table.format_page(page),
            first,
            page.offset + page.rows.len() as u64,
            page.filtered_rows,
            page.total_rows
        ))
    }

    /// Format the distinct values of a column
    pub fn format_values(&self, entry: &ColumnCatalogEntry) -> Result<String> {
        if let Some(json) = self.json() {
            return json.format_values(entry);
        }
        let mut out = self.table.format_values(entry);
        if entry.is_capped() {
            out.push_str(&format!(
                "\nShowing {} of {} distinct values",
                entry.values.len(),
                entry.count
            ));
        }
        Ok(out)
    }

    /// Format the outcome of an export
    pub fn format_summary(&self, summary: &ExportSummary, path: Option<&PathBuf>) -> Result<String> {
        if let Some(json) = self.json() {
            return json.format_serializable(summary);
        }
        let mut pairs = vec![
            ("job", summary.job_id.clone()),
            ("format", summary.format.to_string()),
            ("rows", summary.rows_exported.to_string()),
            ("bytes", summary.bytes_written.to_string()),
            ("elapsed", format!("{} ms", summary.elapsed_ms)),
        ];
        if let Some(path) = path {
            pairs.push(("output", path.display().to_string()));
        }
        if summary.truncated {
            pairs.push((
                "truncated",
                format!("yes, at {} rows", summary.effective_row_limit),
            ));
        }
        Ok(self.table.format_pairs(&pairs))
    }

    /// Format a loaded dataset's shape
    pub fn format_dataset_info(&self, info: &DatasetInfo) -> Result<String> {
        if let Some(json) = self.json() {
            return json.format_serializable(info);
        }
        let columns = info
            .columns
            .iter()
            .map(|c| format!("{} ({:?})", c.name, c.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(self.table.format_pairs(&[
            ("rows", info.row_count.to_string()),
            ("columns", columns),
        ]))
    }

    /// Format a list of dataset files
    pub fn format_datasets(&self, paths: &[PathBuf]) -> Result<String> {
        if let Some(json) = self.json() {
            return json.format_serializable(paths);
        }
        if paths.is_empty() {
            return Ok("(no datasets found)".to_string());
        }
        Ok(paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
