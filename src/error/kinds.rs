use std::{fmt, io, ops::Range, time::Duration};

/// Crate-wide `Result` type using [`ExplorerError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Top-level error type for mintview operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum ExplorerError {
    /// Filter / window request errors.
    Query(QueryError),

    /// Column value catalog errors.
    Catalog(CatalogError),

    /// Errors reading the underlying dataset.
    Storage(StorageError),

    /// Export pipeline errors.
    Export(ExportError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// A page fetch or catalog lookup exceeded its deadline.
    Timeout { operation: String, limit: Duration },

    /// Generic error with a free-form message.
    Generic(String),
}

/// Query-specific errors.
#[derive(Debug)]
pub enum QueryError {
    /// A filter names a column that is not in the dataset schema.
    ///
    /// The whole request is rejected; no part of the filter is applied.
    InvalidFilterColumn { column: String },
}

/// Catalog-specific errors.
#[derive(Debug)]
pub enum CatalogError {
    /// Column is absent from the dataset schema.
    UnknownColumn { column: String },
}

/// Storage-specific errors.
#[derive(Debug)]
pub enum StorageError {
    /// No dataset has been loaded yet.
    NoDatasetLoaded,

    /// Reading rows failed. `rows` is the row range that was being read.
    ReadFailure { rows: Range<u64>, message: String },

    /// Dataset file could not be parsed.
    InvalidDataset { path: String, message: String },
}

/// Export-specific errors.
#[derive(Debug)]
pub enum ExportError {
    /// Encoding a row or the document framing failed.
    EncodingFailure { job_id: String, message: String },

    /// The consumer went away or the export was cancelled.
    Cancelled { job_id: String },

    /// A job state change that would move backwards or leave a terminal state.
    InvalidTransition { from: String, to: String },

    /// Unknown export format name.
    UnsupportedFormat(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExplorerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplorerError::Query(e) => write!(f, "Query error: {e}"),
            ExplorerError::Catalog(e) => write!(f, "Catalog error: {e}"),
            ExplorerError::Storage(e) => write!(f, "Storage error: {e}"),
            ExplorerError::Export(e) => write!(f, "Export error: {e}"),
            ExplorerError::Config(e) => write!(f, "Configuration error: {e}"),
            ExplorerError::Io(e) => write!(f, "I/O error: {e}"),
            ExplorerError::Timeout { operation, limit } => {
                write!(f, "{operation} timed out after {limit:?}")
            }
            ExplorerError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidFilterColumn { column } => {
                write!(f, "Filter references unknown column '{column}'")
            }
        }
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::UnknownColumn { column } => write!(f, "Unknown column '{column}'"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NoDatasetLoaded => write!(f, "No dataset loaded"),
            StorageError::ReadFailure { rows, message } => {
                write!(f, "Failed to read rows {}..{}: {message}", rows.start, rows.end)
            }
            StorageError::InvalidDataset { path, message } => {
                write!(f, "Invalid dataset '{path}': {message}")
            }
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::EncodingFailure { job_id, message } => {
                write!(f, "Encoding failed for job {job_id}: {message}")
            }
            ExportError::Cancelled { job_id } => write!(f, "Export job {job_id} cancelled"),
            ExportError::InvalidTransition { from, to } => {
                write!(f, "Invalid export state transition {from} -> {to}")
            }
            ExportError::UnsupportedFormat(name) => write!(f, "Unsupported export format: {name}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ExplorerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExplorerError::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for QueryError {}
impl std::error::Error for CatalogError {}
impl std::error::Error for StorageError {}
impl std::error::Error for ExportError {}
impl std::error::Error for ConfigError {}

impl ExplorerError {
    /// Whether the error was caused by the caller aborting an export.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExplorerError::Export(ExportError::Cancelled { .. }))
    }
}

/* ========================= Conversions to ExplorerError ========================= */

impl From<io::Error> for ExplorerError {
    fn from(err: io::Error) -> Self {
        ExplorerError::Io(err)
    }
}

impl From<QueryError> for ExplorerError {
    fn from(err: QueryError) -> Self {
        ExplorerError::Query(err)
    }
}

impl From<CatalogError> for ExplorerError {
    fn from(err: CatalogError) -> Self {
        ExplorerError::Catalog(err)
    }
}

impl From<StorageError> for ExplorerError {
    fn from(err: StorageError) -> Self {
        ExplorerError::Storage(err)
    }
}

impl From<ExportError> for ExplorerError {
    fn from(err: ExportError) -> Self {
        ExplorerError::Export(err)
    }
}

impl From<ConfigError> for ExplorerError {
    fn from(err: ConfigError) -> Self {
        ExplorerError::Config(err)
    }
}

impl From<String> for ExplorerError {
    fn from(msg: String) -> Self {
        ExplorerError::Generic(msg)
    }
}

impl From<&str> for ExplorerError {
    fn from(msg: &str) -> Self {
        ExplorerError::Generic(msg.to_owned())
    }
}
