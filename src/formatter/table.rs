//! Table formatting for pages and catalog entries using tabled
//!
//! - Builder pattern, since the column set is only known at runtime
//! - Cells rendered with the same text the export writers produce
//! - Configurable styles and column width wrapping

use tabled::{
    Table,
    builder::Builder,
    settings::{Alignment, Color, Modify, Style, object::Columns, object::Rows, width::Width},
};

use crate::catalog::ColumnCatalogEntry;
use crate::query::QueryResult;

/// Maximum width for a single column (characters)
const DEFAULT_MAX_COLUMN_WIDTH: usize = 40;

/// Table formatter for pages
pub struct TableFormatter {
    /// Maximum column width
    max_column_width: usize,

    /// Table style
    style: TableStyle,

    /// Enable colored output
    use_colors: bool,
}

/// Available table styles
#[derive(Debug, Clone, Copy)]
pub enum TableStyle {
    /// Modern style with box-drawing characters
    Modern,
    /// ASCII style with basic characters
    Ascii,
    /// Rounded style
    Rounded,
    /// Markdown style
    Markdown,
    /// Psql style
    Psql,
}

impl TableFormatter {
    /// Create a new table formatter with default settings
    pub fn new() -> Self {
        Self {
            max_column_width: DEFAULT_MAX_COLUMN_WIDTH,
            style: TableStyle::Modern,
            use_colors: false,
        }
    }

    /// Create a new table formatter with color support
    ///
    /// # Arguments
    /// * `use_colors` - Enable colored output
    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            ..Self::new()
        }
    }

    /// Set the table style
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.style = style;
        self
    }

    /// Set maximum column width
    pub fn with_max_column_width(mut self, width: usize) -> Self {
        self.max_column_width = width;
        self
    }

    /// Format a page as table
    ///
    /// # Arguments
    /// * `page` - Page to format
    ///
    /// # Returns
    /// * `String` - Table with a header row, or a placeholder when empty
    pub fn format_page(&self, page: &QueryResult) -> String {
        if page.columns.is_empty() {
            return "(no columns)".to_string();
        }
        if page.rows.is_empty() {
            return "(empty result set)".to_string();
        }
        self.build(page.column_names(), page.display_rows())
    }

    /// Format a catalog entry as a one-column table
    pub fn format_values(&self, entry: &ColumnCatalogEntry) -> String {
        if entry.values.is_empty() {
            return "(no values)".to_string();
        }
        let rows = entry
            .values
            .iter()
            .map(|v| {
                if v.is_empty() {
                    vec!["(empty)".to_string()]
                } else {
                    vec![v.clone()]
                }
            })
            .collect();
        self.build(vec![entry.column.clone()], rows)
    }

    /// Format key/value pairs as a two-column table
    pub fn format_pairs(&self, pairs: &[(&str, String)]) -> String {
        let rows = pairs
            .iter()
            .map(|(k, v)| vec![k.to_string(), v.clone()])
            .collect();
        self.build(vec!["field".to_string(), "value".to_string()], rows)
    }

    fn build(&self, header: Vec<String>, rows: Vec<Vec<String>>) -> String {
        let width = header.len();
        let mut builder = Builder::default();
        builder.push_record(header);
        for row in rows {
            builder.push_record(row);
        }

        let mut table = builder.build();
        self.apply_style(&mut table);

        // Wrap long values instead of truncating them
        for i in 0..width {
            table.with(Modify::new(Columns::new(i..=i)).with(Width::wrap(self.max_column_width)));
        }

        table.with(Modify::new(Rows::first()).with(Alignment::center()));

        if self.use_colors {
            table.modify(Rows::first(), Color::FG_CYAN | Color::BOLD);
        }

        table.to_string()
    }

    /// Apply table style
    fn apply_style(&self, table: &mut Table) {
        match self.style {
            TableStyle::Modern => table.with(Style::modern()),
            TableStyle::Ascii => table.with(Style::ascii()),
            TableStyle::Rounded => table.with(Style::rounded()),
            TableStyle::Markdown => table.with(Style::markdown()),
            TableStyle::Psql => table.with(Style::psql()),
        };
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::dataset::{Column, DataType, Row, Value};

    fn page() -> QueryResult {
        QueryResult {
            columns: vec![
                Column::new("region", DataType::Text),
                Column::new("amount", DataType::Float),
            ],
            rows: vec![
                Row::from(vec![Value::text("east"), Value::Float(10.0)]),
                Row::from(vec![Value::Null, Value::Float(2.5)]),
            ],
            total_rows: 2,
            filtered_rows: 2,
            offset: 0,
        }
    }

    #[test]
    fn test_format_page() {
        let output = TableFormatter::new().format_page(&page());
        assert!(output.contains("region"));
        assert!(output.contains("east"));
        assert!(output.contains("10"));
        assert!(!output.contains("10.0"));
        assert!(output.contains("2.5"));
    }

    #[test]
    fn test_format_empty_page() {
        let mut empty = page();
        empty.rows.clear();
        assert_eq!(TableFormatter::new().format_page(&empty), "(empty result set)");
    }

    #[test]
    fn test_format_values_marks_empty() {
        let entry = Arc::new(ColumnCatalogEntry {
            column: "region".into(),
            values: vec!["".into(), "east".into()],
            typed_values: vec![Value::Null, Value::text("east")],
            count: 2,
        });
        let output = TableFormatter::new()
            .with_style(TableStyle::Ascii)
            .format_values(&entry);
        assert!(output.contains("(empty)"));
        assert!(output.contains("+"));
    }

    #[test]
    fn test_column_wrapping() {
        let mut long = page();
        long.rows = vec![Row::from(vec![Value::text("x".repeat(100)), Value::Int(1)])];
        let output = TableFormatter::new().with_max_column_width(20).format_page(&long);
        assert!(output.lines().all(|l| !l.contains(&"x".repeat(21))));
    }
}
