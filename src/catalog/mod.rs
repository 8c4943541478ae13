//! Column value catalog
//!
//! Distinct values per column for filter pickers. Entries are computed on
//! first access and cached for the lifetime of the loaded dataset; a new
//! dataset gets a fresh catalog, so invalidation is wholesale.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::dataset::{Dataset, Value};
use crate::error::{CatalogError, Result};

/// Distinct values of one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCatalogEntry {
    /// Column name
    pub column: String,

    /// Display strings, in typed value order, at most `cap` of them
    pub values: Vec<String>,

    /// The typed values behind `values`; filter with these, not the strings
    pub typed_values: Vec<Value>,

    /// True number of distinct values (may exceed `values.len()`)
    pub count: u64,
}

impl ColumnCatalogEntry {
    /// Whether the value list was cut at the cap
    pub fn is_capped(&self) -> bool {
        self.count > self.values.len() as u64
    }
}

/// Lazily populated per-dataset catalog
#[derive(Debug)]
pub struct ColumnCatalog {
    cap: usize,
    entries: RwLock<HashMap<usize, Arc<ColumnCatalogEntry>>>,
}

impl ColumnCatalog {
    /// Create an empty catalog returning at most `cap` values per column
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Distinct values for `column`
    ///
    /// # Arguments
    /// * `dataset` - The dataset this catalog belongs to
    /// * `column` - Column name
    ///
    /// # Returns
    /// * `Result<Arc<ColumnCatalogEntry>>` - Cached or freshly computed entry,
    ///   `UnknownColumn` if the column is not in the schema
    pub fn values_for(&self, dataset: &Dataset, column: &str) -> Result<Arc<ColumnCatalogEntry>> {
        let position = dataset
            .schema()
            .position(column)
            .ok_or_else(|| CatalogError::UnknownColumn {
                column: column.to_string(),
            })?;

        if let Some(entry) = self.read_entries().get(&position) {
            return Ok(Arc::clone(entry));
        }

        let entry = Arc::new(build_entry(dataset, position, self.cap));
        debug!(
            "Catalogued column '{}': {} distinct values ({} kept)",
            entry.column,
            entry.count,
            entry.values.len()
        );

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        // Another reader may have raced us here; keep whichever landed first.
        Ok(Arc::clone(entries.entry(position).or_insert(entry)))
    }

    /// Number of columns computed so far
    pub fn cached_columns(&self) -> usize {
        self.read_entries().len()
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<usize, Arc<ColumnCatalogEntry>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }
}

fn build_entry(dataset: &Dataset, position: usize, cap: usize) -> ColumnCatalogEntry {
    let distinct: BTreeSet<&Value> = dataset.rows().iter().map(|row| &row[position]).collect();
    let typed_values: Vec<Value> = distinct.iter().take(cap).map(|v| (*v).clone()).collect();

    ColumnCatalogEntry {
        column: dataset.schema().column(position).name.clone(),
        values: typed_values.iter().map(Value::render).collect(),
        typed_values,
        count: distinct.len() as u64,
    }
}
