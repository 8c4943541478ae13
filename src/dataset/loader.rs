//! CSV dataset loading
//!
//! Column types are inferred from the data: a column is `Int` if every
//! non-empty field parses as an integer, otherwise `Float`, otherwise `Bool`,
//! otherwise `Text`. Empty fields load as `Null`.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::error::{Result, StorageError};

use super::value::parse_bool;
use super::{Column, DataType, Dataset, Value};

/// Load a CSV file with a header row into a [`Dataset`]
///
/// # Arguments
/// * `path` - CSV file path
///
/// # Returns
/// * `Result<Dataset>` - Loaded dataset or a storage error naming the failing row
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| StorageError::InvalidDataset {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| StorageError::InvalidDataset {
            path: path_str.clone(),
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| StorageError::ReadFailure {
            rows: i as u64..i as u64 + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    debug!("Read {} records from {}", records.len(), path_str);

    let types: Vec<DataType> = (0..headers.len())
        .map(|col| infer_column_type(&records, col))
        .collect();

    let columns: Vec<Column> = headers
        .into_iter()
        .zip(types.iter().copied())
        .map(|(name, data_type)| Column::new(name, data_type))
        .collect();

    let mut rows = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        let mut row = Vec::with_capacity(types.len());
        for (col, data_type) in types.iter().enumerate() {
            let raw = record.get(col).unwrap_or("");
            let value = Value::parse_as(raw, *data_type).ok_or_else(|| {
                StorageError::ReadFailure {
                    rows: i as u64..i as u64 + 1,
                    message: format!("cannot parse '{}' as {}", raw, data_type),
                }
            })?;
            row.push(value);
        }
        rows.push(row);
    }

    let dataset = Dataset::from_rows(columns, rows).map_err(|e| StorageError::InvalidDataset {
        path: path_str.clone(),
        message: e.to_string(),
    })?;
    info!(
        "Loaded dataset {} ({} rows, {} columns)",
        path_str,
        dataset.row_count(),
        dataset.schema().len()
    );
    Ok(dataset)
}

/// List loadable dataset files in a directory, sorted by name
pub fn list_datasets<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

fn infer_column_type(records: &[StringRecord], col: usize) -> DataType {
    let mut fields = records
        .iter()
        .filter_map(|r| r.get(col))
        .filter(|f| !f.is_empty())
        .peekable();

    if fields.peek().is_none() {
        return DataType::Text;
    }

    let non_empty: Vec<&str> = fields.collect();
    if non_empty.iter().all(|f| f.trim().parse::<i64>().is_ok()) {
        DataType::Int
    } else if non_empty.iter().all(|f| f.trim().parse::<f64>().is_ok()) {
        DataType::Float
    } else if non_empty.iter().all(|f| parse_bool(f).is_some()) {
        DataType::Bool
    } else {
        DataType::Text
    }
}
