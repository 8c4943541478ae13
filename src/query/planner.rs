//! Query planner
//!
//! Turns a validated [`FilterSpec`] and a [`PaginationWindow`] into a
//! [`QueryResult`]. The exact filtered count and the page slice are produced
//! by one pass over one dataset snapshot, in the dataset's natural order, so
//! identical calls against an unchanged dataset return identical rows.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, trace};

use crate::dataset::{Column, Dataset, LoadedDataset, Row};

use super::filter::FilterSpec;
use super::window::PaginationWindow;

/// A page of rows plus counts
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Columns of every row, in order
    pub columns: Vec<Column>,

    /// Matching rows inside the (clamped) window
    pub rows: Vec<Row>,

    /// Rows in the dataset, ignoring the filter
    pub total_rows: u64,

    /// Rows matching the filter, ignoring the window
    pub filtered_rows: u64,

    /// Clamped offset of the first returned row
    pub offset: u64,
}

impl QueryResult {
    /// Column names in order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Rows rendered exactly as the export writers render them
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|v| v.render()).collect())
            .collect()
    }

    /// JSON body: `{data, columns, total_rows, filtered_rows, offset}`
    ///
    /// Each row is an object keyed by column name, carrying typed values.
    pub fn to_json(&self) -> JsonValue {
        let data: Vec<JsonValue> = self
            .rows
            .iter()
            .map(|row| {
                let mut object = Map::with_capacity(self.columns.len());
                for (column, value) in self.columns.iter().zip(row.iter()) {
                    object.insert(
                        column.name.clone(),
                        serde_json::to_value(value).unwrap_or(JsonValue::Null),
                    );
                }
                JsonValue::Object(object)
            })
            .collect();

        serde_json::json!({
            "data": data,
            "columns": self.column_names(),
            "total_rows": self.total_rows,
            "filtered_rows": self.filtered_rows,
            "offset": self.offset,
        })
    }
}

/// Planner over in-memory datasets
pub struct QueryPlanner;

impl QueryPlanner {
    /// Evaluate a filtered, windowed query
    ///
    /// # Arguments
    /// * `dataset` - Dataset snapshot to read
    /// * `filters` - Validated filter
    /// * `window` - Requested window; clamped, never rejected
    ///
    /// # Returns
    /// * `QueryResult` - Page rows and exact counts
    pub fn evaluate(dataset: &Dataset, filters: &FilterSpec, window: PaginationWindow) -> QueryResult {
        let end = window.end();
        let mut rows = Vec::with_capacity(window.limit.min(4096) as usize);
        let mut matched = 0u64;

        for row in dataset.rows() {
            if !filters.matches(row) {
                continue;
            }
            if matched >= window.offset && matched < end {
                rows.push(Arc::clone(row));
            }
            matched += 1;
        }

        let clamped = window.clamp(matched);
        debug!(
            "Evaluated query: {} of {} rows match, window {}+{}",
            matched,
            dataset.row_count(),
            clamped.offset,
            clamped.limit
        );

        QueryResult {
            columns: dataset.schema().columns().to_vec(),
            rows,
            total_rows: dataset.row_count(),
            filtered_rows: matched,
            offset: clamped.offset,
        }
    }

    /// Exact number of rows matching `filters`
    pub fn count(dataset: &Dataset, filters: &FilterSpec) -> u64 {
        if filters.is_unconstrained() {
            return dataset.row_count();
        }
        dataset.rows().iter().filter(|row| filters.matches(row)).count() as u64
    }

    /// Open a cursor over every matching row, for bulk export
    ///
    /// # Arguments
    /// * `snapshot` - Dataset snapshot; held for the cursor's lifetime
    /// * `filters` - Filter snapshot
    /// * `limit` - Maximum number of rows the cursor yields
    pub fn scan(snapshot: Arc<LoadedDataset>, filters: Arc<FilterSpec>, limit: u64) -> ScanCursor {
        ScanCursor {
            snapshot,
            filters,
            position: 0,
            remaining: limit,
            emitted: 0,
        }
    }
}

/// Forward-only cursor yielding matching rows in bounded batches
///
/// Holds its dataset snapshot, so a dataset swap after the cursor opens does
/// not affect what it reads.
#[derive(Debug)]
pub struct ScanCursor {
    snapshot: Arc<LoadedDataset>,
    filters: Arc<FilterSpec>,
    position: usize,
    remaining: u64,
    emitted: u64,
}

impl ScanCursor {
    /// Next batch of at most `batch_size` matching rows, `None` when done
    pub fn next_batch(&mut self, batch_size: usize) -> Option<Vec<Row>> {
        if self.remaining == 0 || batch_size == 0 {
            return None;
        }

        let want = (batch_size as u64).min(self.remaining) as usize;
        let rows = self.snapshot.dataset().rows();
        let mut batch = Vec::with_capacity(want);

        while self.position < rows.len() && batch.len() < want {
            let row = &rows[self.position];
            self.position += 1;
            if self.filters.matches(row) {
                batch.push(Arc::clone(row));
            }
        }

        if batch.is_empty() {
            self.remaining = 0;
            return None;
        }

        self.remaining -= batch.len() as u64;
        self.emitted += batch.len() as u64;
        trace!("Cursor emitted {} rows (total {})", batch.len(), self.emitted);
        Some(batch)
    }

    /// Rows emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Column definitions of the scanned dataset
    pub fn columns(&self) -> &[Column] {
        self.snapshot.dataset().schema().columns()
    }
}
