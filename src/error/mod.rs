//! Error handling module for mintview.
//!
//! Every fatal condition carries enough context for the caller to decide on
//! retry or backoff: the offending column, the row range being read, or the
//! export job id. Nothing in the crate retries on its own.
//!
//! # Example
//!
//! ```rust
//! use mintview::error::{ExplorerError, QueryError, Result};
//!
//! fn reject(column: &str) -> Result<()> {
//!     Err(QueryError::InvalidFilterColumn { column: column.to_string() }.into())
//! }
//!
//! assert!(matches!(reject("nope"), Err(ExplorerError::Query(_))));
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    CatalogError, ConfigError, ExplorerError, ExportError, QueryError, Result, StorageError,
};
