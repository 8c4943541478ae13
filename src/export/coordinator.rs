//! Export coordinator for orchestrating export operations
//!
//! This module provides the coordinator that brings together a streaming
//! query, progress tracking and a format writer, and drives the job through
//! its state machine.

use std::time::Instant;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dataset::Column;
use crate::error::{ExportError, Result};

use super::job::{ExportFormat, ExportJob, ExportState, RowLimitPlan};
use super::progress::ProgressTracker;
use super::streaming::StreamingQuery;
use super::writers::FormatWriter;

/// Result of an export operation
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub job_id: String,
    pub format: ExportFormat,
    /// Number of data rows exported
    pub rows_exported: u64,
    pub batches: u64,
    /// Largest batch handed to the writer
    pub peak_batch_rows: usize,
    /// Bytes handed to the consumer
    pub bytes_written: u64,
    pub elapsed_ms: u64,
    /// Whether the format cap cut the export short
    pub truncated: bool,
    pub effective_row_limit: u64,
}

/// Coordinator for export operations
///
/// Orchestrates the streaming query, progress tracking, and format writing.
/// The writer is finalized only when every row reached it; a failed or
/// cancelled export never produces a document that looks complete.
pub struct ExportCoordinator {
    /// Job being run; owns the state machine
    job: ExportJob,
    /// Header row
    columns: Vec<Column>,
    /// Streaming query for fetching rows
    query: Box<dyn StreamingQuery>,
    /// Format writer for output
    writer: Box<dyn FormatWriter>,
    plan: RowLimitPlan,
    /// Progress tracker for user feedback
    tracker: ProgressTracker,
    /// Cancellation token for aborting export
    cancel_token: Option<CancellationToken>,
    state_tx: watch::Sender<ExportState>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    ///
    /// # Arguments
    /// * `job` - Job in the `Pending` state
    /// * `columns` - Columns of the exported dataset, in order
    /// * `query` - Row source already limited to `plan.effective`
    /// * `writer` - Target format writer
    /// * `plan` - Row limit computed for the job
    pub fn new(
        job: ExportJob,
        columns: Vec<Column>,
        query: Box<dyn StreamingQuery>,
        writer: Box<dyn FormatWriter>,
        plan: RowLimitPlan,
    ) -> Self {
        let (state_tx, _) = watch::channel(job.state());
        Self {
            job,
            columns,
            query,
            writer,
            plan,
            tracker: ProgressTracker::hidden(),
            cancel_token: None,
            state_tx,
        }
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Replace the default counting-only tracker
    pub fn with_progress(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Watch the job state as it moves
    pub fn subscribe(&self) -> watch::Receiver<ExportState> {
        self.state_tx.subscribe()
    }

    pub fn job_id(&self) -> &str {
        self.job.id()
    }

    fn transition(&mut self, next: ExportState) -> Result<()> {
        self.job.transition(next)?;
        self.state_tx.send_replace(next);
        debug!("Export job {} is now {}", self.job.id(), next);
        Ok(())
    }

    /// Execute the export operation
    ///
    /// Streams the header, every batch, then finalizes the writer once. On
    /// any failure the job ends `Failed`, the query is closed and the error is
    /// returned without finalizing.
    ///
    /// # Returns
    /// * `Result<ExportSummary>` - Export statistics or error
    pub async fn execute(&mut self) -> Result<ExportSummary> {
        let start_time = Instant::now();
        self.transition(ExportState::Streaming)?;
        info!(
            "Starting {} export {} (limit {} rows)",
            self.job.format(),
            self.job.id(),
            self.plan.effective
        );

        match self.stream_all().await {
            Ok((exported, batches, peak)) => {
                self.query.close().await?;
                self.tracker.finish();

                let terminal = if self.plan.truncated {
                    warn!(
                        "Export {} truncated at {} rows; {} were requested",
                        self.job.id(),
                        self.plan.effective,
                        self.plan.requested
                    );
                    ExportState::Truncated
                } else {
                    ExportState::Completed
                };
                self.transition(terminal)?;

                let elapsed_ms = start_time.elapsed().as_millis() as u64;
                let bytes_written = self.writer.bytes_written();
                info!(
                    "Export completed: {} rows, {} bytes, {} ms",
                    exported, bytes_written, elapsed_ms
                );

                Ok(ExportSummary {
                    job_id: self.job.id().to_string(),
                    format: self.job.format(),
                    rows_exported: exported,
                    batches,
                    peak_batch_rows: peak,
                    bytes_written,
                    elapsed_ms,
                    truncated: self.plan.truncated,
                    effective_row_limit: self.plan.effective,
                })
            }
            Err(e) => {
                if e.is_cancelled() {
                    info!("Export {} cancelled", self.job.id());
                } else {
                    error!("Export {} failed: {}", self.job.id(), e);
                }
                let _ = self.query.close().await;
                self.tracker.abandon("failed");
                self.transition(ExportState::Failed)?;
                Err(e)
            }
        }
    }

    /// Header, batches, finalize; returns rows, batches and peak batch size
    async fn stream_all(&mut self) -> Result<(u64, u64, usize)> {
        self.writer.write_header(&self.columns).await?;

        let mut exported = 0u64;
        let mut batch_count = 0u64;
        let mut peak = 0usize;

        loop {
            if let Some(ref token) = self.cancel_token {
                if token.is_cancelled() {
                    return Err(ExportError::Cancelled {
                        job_id: self.job.id().to_string(),
                    }
                    .into());
                }
            }

            debug!("Fetching batch #{}", batch_count + 1);
            let mut rows = match self.query.next_batch().await? {
                Some(rows) => rows,
                None => {
                    debug!("No more rows available");
                    break;
                }
            };

            let remaining = self.plan.effective.saturating_sub(exported);
            if rows.len() as u64 > remaining {
                rows.truncate(remaining as usize);
            }
            if rows.is_empty() {
                break;
            }

            let written = self.writer.write_batch(&rows).await?;
            exported += written as u64;
            peak = peak.max(rows.len());
            batch_count += 1;
            self.tracker.update(exported);

            // Log progress periodically
            if batch_count % 10 == 0 {
                info!("Progress: {} rows exported ({} batches)", exported, batch_count);
            }
        }

        debug!("Finalizing output");
        self.writer.finalize().await?;
        Ok((exported, batch_count, peak))
    }
}
