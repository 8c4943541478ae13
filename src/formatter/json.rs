//! JSON formatting for pages, catalog entries and export summaries

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::catalog::ColumnCatalogEntry;
use crate::error::{ExplorerError, Result};
use crate::query::QueryResult;

/// JSON formatter with pretty printing support
pub struct JsonFormatter {
    /// Enable pretty printing
    pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    ///
    /// # Arguments
    /// * `pretty` - Enable pretty printing
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Format a page as `{data, columns, total_rows, filtered_rows, offset}`
    pub fn format_page(&self, page: &QueryResult) -> Result<String> {
        self.render(&page.to_json())
    }

    /// Format a catalog entry with display strings, typed values and count
    pub fn format_values(&self, entry: &ColumnCatalogEntry) -> Result<String> {
        self.format_serializable(entry)
    }

    /// Format any serializable value
    pub fn format_serializable<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let json = serde_json::to_value(value)
            .map_err(|e| ExplorerError::Generic(format!("JSON serialization failed: {e}")))?;
        self.render(&json)
    }

    fn render(&self, json: &JsonValue) -> Result<String> {
        let out = if self.pretty {
            serde_json::to_string_pretty(json)
        } else {
            serde_json::to_string(json)
        };
        out.map_err(|e| ExplorerError::Generic(format!("JSON serialization failed: {e}")))
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}
