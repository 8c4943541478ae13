//! Read-only tabular datasets
//!
//! A [`Dataset`] is an immutable, schema-typed sequence of rows in a stable
//! natural order. Datasets are never modified after loading; replacing the
//! active dataset goes through [`store::DatasetStore`], which keeps readers on
//! a consistent snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, StorageError};

pub mod loader;
pub mod store;
pub mod value;

pub use loader::{list_datasets, load_csv};
pub use store::{DatasetStore, LoadedDataset};
pub use value::{DataType, Value};

/// One row; cells are in schema column order
///
/// Rows are shared, so copying a row into a page or an export batch only
/// bumps a reference count.
pub type Row = Arc<[Value]>;

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered set of columns with name lookup
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema; duplicate column names are rejected
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.name.clone(), i).is_some() {
                return Err(StorageError::InvalidDataset {
                    path: String::new(),
                    message: format!("duplicate column '{}'", column.name),
                }
                .into());
            }
        }
        Ok(Self { columns, index })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column by name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn column(&self, position: usize) -> &Column {
        &self.columns[position]
    }

    /// Column names in order
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// An immutable in-memory dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: Schema,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset from typed rows
    ///
    /// Every row must have exactly one cell per column, and every non-null
    /// cell must match its column's type.
    ///
    /// # Arguments
    /// * `columns` - Column definitions in order
    /// * `rows` - Row cells in column order
    ///
    /// # Returns
    /// * `Result<Dataset>` - Dataset or `InvalidDataset` error
    pub fn from_rows(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let schema = Schema::new(columns)?;
        let mut stored = Vec::with_capacity(rows.len());

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != schema.len() {
                return Err(StorageError::InvalidDataset {
                    path: String::new(),
                    message: format!(
                        "row {} has {} cells, expected {}",
                        i,
                        row.len(),
                        schema.len()
                    ),
                }
                .into());
            }
            for (cell, column) in row.iter().zip(schema.columns()) {
                if !cell_matches_type(cell, column.data_type) {
                    return Err(StorageError::InvalidDataset {
                        path: String::new(),
                        message: format!(
                            "row {} column '{}' holds {:?}, expected {}",
                            i, column.name, cell, column.data_type
                        ),
                    }
                    .into());
                }
            }
            stored.push(Row::from(row));
        }

        Ok(Self {
            schema,
            rows: stored,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Rows in natural order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }
}

fn cell_matches_type(cell: &Value, data_type: DataType) -> bool {
    matches!(
        (cell, data_type),
        (Value::Null, _)
            | (Value::Bool(_), DataType::Bool)
            | (Value::Int(_), DataType::Int)
            | (Value::Float(_), DataType::Float)
            | (Value::Text(_), DataType::Text)
    )
}
