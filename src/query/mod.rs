//! Paginated, filtered queries over the active dataset
//!
//! - [`FilterSelection`]: raw client selection
//! - [`FilterSpec`]: the selection validated against a schema
//! - [`PaginationWindow`]: offset/limit, clamped rather than rejected
//! - [`QueryPlanner`]: count + window evaluation and export scans

pub mod filter;
pub mod planner;
pub mod window;

pub use filter::{FilterClause, FilterSelection, FilterSpec};
pub use planner::{QueryPlanner, QueryResult, ScanCursor};
pub use window::PaginationWindow;
