//! mintview library
//!
//! Paginated, filtered views and bounded-memory bulk exports over large
//! read-only tabular datasets.
//!
//! # Modules
//!
//! - `catalog`: distinct values per column for filter pickers
//! - `cli`: command-line interface and argument parsing
//! - `config`: configuration management
//! - `dataset`: typed datasets, CSV loading and the active-dataset store
//! - `error`: error types and handling
//! - `explorer`: the service entry point with deadlines
//! - `export`: streaming CSV and XLSX exports
//! - `formatter`: table and JSON output
//! - `query`: filters, windows and the query planner
//! - `view`: page view state and its async fetcher
//!
//! # Example
//!
//! ```no_run
//! use mintview::{Config, Explorer, FilterSelection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let explorer = Explorer::new(Config::default());
//!     explorer.load_dataset("sales.csv").await?;
//!
//!     let filters = FilterSelection::new().with("region", vec!["east"]);
//!     let page = explorer.fetch_page(filters, 0, Some(50)).await?;
//!     println!("{} of {} rows match", page.filtered_rows, page.total_rows);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod explorer;
pub mod export;
pub mod formatter;
pub mod query;
pub mod view;

// Re-export commonly used types
pub use config::Config;
pub use dataset::{Dataset, Value};
pub use error::{ExplorerError, Result};
pub use explorer::{ExportRequest, Explorer};
pub use export::{ExportFormat, ExportStream, ExportSummary};
pub use query::{FilterSelection, QueryResult};
pub use view::{PageFetcher, ViewAction, ViewStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
