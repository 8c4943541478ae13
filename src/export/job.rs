//! Export jobs, formats and row-limit planning

use std::fmt;
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ExportError, Result};
use crate::query::FilterSpec;

/// Rows in one worksheet, header included
pub const SPREADSHEET_MAX_SHEET_ROWS: u64 = 1_048_576;

/// Data rows that fit in one worksheet below the header row
pub const SPREADSHEET_MAX_DATA_ROWS: u64 = SPREADSHEET_MAX_SHEET_ROWS - 1;

/// Output format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma-separated text
    Delimited,
    /// XLSX workbook with a single sheet
    Spreadsheet,
}

impl ExportFormat {
    /// Parse a user-facing format name (`csv`, `delimited`, `xlsx`, `spreadsheet`)
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "csv" | "delimited" => Ok(ExportFormat::Delimited),
            "xlsx" | "excel" | "spreadsheet" => Ok(ExportFormat::Spreadsheet),
            other => Err(ExportError::UnsupportedFormat(other.to_string()).into()),
        }
    }

    /// Structural maximum of data rows, `None` when unbounded
    pub fn max_rows(&self) -> Option<u64> {
        match self {
            ExportFormat::Delimited => None,
            ExportFormat::Spreadsheet => Some(SPREADSHEET_MAX_DATA_ROWS),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Delimited => "csv",
            ExportFormat::Spreadsheet => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Delimited => "text/csv",
            ExportFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    /// Suggested filename with a local timestamp
    pub fn default_filename(&self) -> String {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        format!("export-{}.{}", timestamp, self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How many rows an export will write and whether that is a truncation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowLimitPlan {
    /// `row_limit` if given, otherwise the filtered row count
    pub requested: u64,
    /// `requested` capped by the format maximum
    pub effective: u64,
    /// Whether the cap cut the export short of `requested`
    pub truncated: bool,
}

impl RowLimitPlan {
    /// Plan the row limit of an export
    ///
    /// # Arguments
    /// * `format` - Target format
    /// * `row_limit` - Caller's cap, if any
    /// * `filtered_rows` - Rows matching the job's filter
    pub fn compute(format: ExportFormat, row_limit: Option<u64>, filtered_rows: u64) -> Self {
        let requested = row_limit.unwrap_or(filtered_rows);
        let effective = match format.max_rows() {
            Some(max) => requested.min(max),
            None => requested,
        };
        Self {
            requested,
            effective,
            truncated: effective < requested,
        }
    }
}

/// Lifecycle of an export job
///
/// `Pending → Streaming → {Completed, Failed, Truncated}`; the three terminal
/// states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportState {
    Pending,
    Streaming,
    Completed,
    Failed,
    Truncated,
}

impl ExportState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExportState::Completed | ExportState::Failed | ExportState::Truncated
        )
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: ExportState) -> bool {
        match self {
            ExportState::Pending => matches!(next, ExportState::Streaming | ExportState::Failed),
            ExportState::Streaming => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportState::Pending => "pending",
            ExportState::Streaming => "streaming",
            ExportState::Completed => "completed",
            ExportState::Failed => "failed",
            ExportState::Truncated => "truncated",
        };
        f.write_str(name)
    }
}

/// One export request
///
/// The filter is a snapshot taken when the job is created; later filter
/// changes in any view do not reach it.
#[derive(Debug)]
pub struct ExportJob {
    id: String,
    format: ExportFormat,
    row_limit: Option<u64>,
    filters: Arc<FilterSpec>,
    state: ExportState,
}

impl ExportJob {
    pub fn new(format: ExportFormat, filters: FilterSpec, row_limit: Option<u64>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            format,
            row_limit,
            filters: Arc::new(filters),
            state: ExportState::Pending,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn row_limit(&self) -> Option<u64> {
        self.row_limit
    }

    pub fn filters(&self) -> &Arc<FilterSpec> {
        &self.filters
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Move to `next`, rejecting back-transitions and exits from terminal states
    pub fn transition(&mut self, next: ExportState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ExportError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            }
            .into());
        }
        self.state = next;
        Ok(())
    }
}
