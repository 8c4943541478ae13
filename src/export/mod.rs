//! Export module for streaming data export operations
//!
//! This module turns a filtered view of the active dataset into a byte stream
//! in one of two formats, without ever holding the whole result in memory.
//!
//! # Architecture
//!
//! The export system is built on three main components:
//!
//! 1. **StreamingQuery**: pulls filtered rows from a dataset snapshot in batches
//! 2. **ProgressTracker**: counts rows and optionally draws a progress bar
//! 3. **FormatWriter**: encodes rows and hands bytes to a bounded channel
//!
//! These components are orchestrated by the **ExportCoordinator**, which runs
//! in its own task. The consumer holds an [`ExportStream`]; dropping it stops
//! the export at the next batch boundary.
//!
//! # Example
//!
//! ```no_run
//! use mintview::explorer::{ExportRequest, Explorer};
//! use mintview::export::ExportFormat;
//! use mintview::query::FilterSelection;
//!
//! # async fn run(explorer: Explorer) -> mintview::Result<()> {
//! let stream = explorer
//!     .start_export(ExportRequest {
//!         format: ExportFormat::Delimited,
//!         filters: FilterSelection::new().with("region", vec!["east"]),
//!         row_limit: None,
//!     })
//!     .await?;
//! let summary = stream.write_to_path("east.csv").await?;
//! println!("{} rows", summary.rows_exported);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod job;
pub mod progress;
pub mod streaming;
pub mod writers;

use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dataset::Column;
use crate::error::{ExplorerError, Result};

pub use coordinator::{ExportCoordinator, ExportSummary};
pub use job::{
    ExportFormat, ExportJob, ExportState, RowLimitPlan, SPREADSHEET_MAX_DATA_ROWS,
    SPREADSHEET_MAX_SHEET_ROWS,
};
pub use progress::ProgressTracker;
pub use streaming::{CursorStreamingQuery, StreamingQuery};
pub use writers::{Chunk, ChunkSink, CsvWriter, FormatWriter, XlsxWriter};

/// Consumer side of a running export
///
/// Yields encoded chunks in order. A failure or an external cancellation
/// arrives as an `Err` item before the stream ends; a stream that ends without
/// one was finalized.
#[derive(Debug)]
pub struct ExportStream {
    receiver: mpsc::Receiver<Chunk>,
    job_id: String,
    format: ExportFormat,
    filename: String,
    plan: RowLimitPlan,
    state: watch::Receiver<ExportState>,
    task: JoinHandle<Option<ExportSummary>>,
}

impl ExportStream {
    /// Start an export in a background task
    ///
    /// # Arguments
    /// * `job` - Pending job; its filter snapshot drives `query`
    /// * `columns` - Header row
    /// * `query` - Row source limited to `plan.effective`
    /// * `plan` - Row limit computed for the job
    /// * `channel_capacity` - Chunks buffered ahead of the consumer
    /// * `tracker` - Progress display
    /// * `cancel` - Cancels the export when triggered
    pub fn spawn(
        job: ExportJob,
        columns: Vec<Column>,
        query: Box<dyn StreamingQuery>,
        plan: RowLimitPlan,
        channel_capacity: usize,
        tracker: ProgressTracker,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, receiver) = mpsc::channel(channel_capacity.max(1));
        let job_id = job.id().to_string();
        let format = job.format();
        let sink = ChunkSink::new(tx, job_id.clone());
        let writer = writers::create_writer(format, sink.clone());

        let cancel = cancel.child_token();
        let mut coordinator = ExportCoordinator::new(job, columns, query, writer, plan)
            .with_progress(tracker)
            .with_cancellation(cancel.clone());
        let state = coordinator.subscribe();

        let task = tokio::spawn(async move {
            let outcome = {
                let run = coordinator.execute();
                tokio::pin!(run);
                tokio::select! {
                    result = &mut run => result,
                    _ = sink.closed() => {
                        debug!("Consumer of export {} went away", sink.job_id());
                        cancel.cancel();
                        run.await
                    }
                }
            };
            drop(coordinator);

            match outcome {
                Ok(summary) => Some(summary),
                Err(e) => {
                    // Cancellation is reported too, unless the consumer is gone.
                    if sink.is_closed() {
                        debug!("Export {} ended after its consumer left: {}", sink.job_id(), e);
                    } else {
                        sink.send_error(e).await;
                    }
                    None
                }
            }
        });

        Self {
            receiver,
            job_id,
            format,
            filename: format.default_filename(),
            plan,
            state,
            task,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Suggested filename for the download
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Whether the format cap will cut this export short
    ///
    /// Known before the first byte is produced.
    pub fn truncated(&self) -> bool {
        self.plan.truncated
    }

    pub fn effective_row_limit(&self) -> u64 {
        self.plan.effective
    }

    /// Current job state
    pub fn state(&self) -> ExportState {
        *self.state.borrow()
    }

    /// Receive the next chunk, `None` once the export has ended
    pub async fn next_chunk(&mut self) -> Option<Chunk> {
        self.receiver.recv().await
    }

    /// Wait for the export task and collect its summary
    async fn join(self) -> Result<ExportSummary> {
        match self.task.await {
            Ok(Some(summary)) => Ok(summary),
            Ok(None) => Err(ExplorerError::Generic(format!(
                "export {} ended without completing",
                self.job_id
            ))),
            Err(e) => Err(ExplorerError::Generic(format!(
                "export task {} panicked: {}",
                self.job_id, e
            ))),
        }
    }

    /// Drain the stream into an async writer
    ///
    /// # Returns
    /// * `Result<ExportSummary>` - Summary, or the in-band export error
    pub async fn write_to<W>(mut self, out: &mut W) -> Result<ExportSummary>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(chunk) = self.receiver.recv().await {
            let bytes = chunk?;
            out.write_all(&bytes).await?;
        }
        out.flush().await?;
        self.join().await
    }

    /// Write the export to `path`, replacing it only on success
    ///
    /// Bytes go to a temporary file next to `path` that is renamed into place
    /// once the export finalized; a failed export leaves `path` untouched.
    pub async fn write_to_path(self, path: impl AsRef<Path>) -> Result<ExportSummary> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };

        let temp = NamedTempFile::new_in(&parent)?;
        let mut file = tokio::fs::File::from_std(temp.reopen()?);
        let summary = self.write_to(&mut file).await?;
        file.sync_all().await?;
        drop(file);

        temp.persist(path).map_err(|e| {
            warn!("Failed to persist export to {}: {}", path.display(), e.error);
            ExplorerError::Io(e.error)
        })?;
        debug!("Export written to {}", path.display());
        Ok(summary)
    }
}

impl Stream for ExportStream {
    type Item = Chunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::StreamExt;

    use crate::dataset::{DataType, Dataset, DatasetStore, Row, Value};
    use crate::error::StorageError;
    use crate::query::{FilterSpec, QueryPlanner};

    /// Yields one batch, then fails the read
    struct BrokenRead {
        served: bool,
    }

    #[async_trait]
    impl StreamingQuery for BrokenRead {
        async fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
            if self.served {
                return Err(StorageError::ReadFailure {
                    rows: 2..4,
                    message: "disk went away".to_string(),
                }
                .into());
            }
            self.served = true;
            Ok(Some(vec![
                Row::from(vec![Value::Int(0)]),
                Row::from(vec![Value::Int(1)]),
            ]))
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn broken_stream(format: ExportFormat) -> ExportStream {
        ExportStream::spawn(
            ExportJob::new(format, FilterSpec::unconstrained(), None),
            vec![Column::new("n", DataType::Int)],
            Box::new(BrokenRead { served: false }),
            RowLimitPlan::compute(format, None, 10),
            4,
            ProgressTracker::hidden(),
            CancellationToken::new(),
        )
    }

    /// Drain every item, returning the byte count before the first error and
    /// the errors seen
    async fn drain(stream: &mut ExportStream) -> (usize, Vec<ExplorerError>) {
        let mut bytes = 0;
        let mut errors = Vec::new();
        while let Some(chunk) = stream.next_chunk().await {
            match chunk {
                Ok(data) => {
                    assert!(errors.is_empty(), "bytes arrived after the error");
                    bytes += data.len();
                }
                Err(e) => errors.push(e),
            }
        }
        (bytes, errors)
    }

    fn stream(rows: i64, format: ExportFormat, capacity: usize) -> ExportStream {
        cancellable_stream(rows, format, capacity, CancellationToken::new())
    }

    fn cancellable_stream(
        rows: i64,
        format: ExportFormat,
        capacity: usize,
        cancel: CancellationToken,
    ) -> ExportStream {
        let store = DatasetStore::new(10);
        let columns = vec![Column::new("n", DataType::Int)];
        let snapshot = store.swap(
            Dataset::from_rows(columns.clone(), (0..rows).map(|i| vec![i.into()]).collect()).unwrap(),
            None,
        );
        let plan = RowLimitPlan::compute(format, None, rows as u64);
        let job = ExportJob::new(format, FilterSpec::unconstrained(), None);
        let cursor = QueryPlanner::scan(snapshot, Arc::new(FilterSpec::unconstrained()), plan.effective);
        ExportStream::spawn(
            job,
            columns,
            Box::new(CursorStreamingQuery::new(cursor, 100)),
            plan,
            capacity,
            ProgressTracker::hidden(),
            cancel,
        )
    }

    #[tokio::test]
    async fn test_stream_yields_all_rows() {
        let mut out = Vec::new();
        let summary = stream(250, ExportFormat::Delimited, 2)
            .write_to(&mut out)
            .await
            .unwrap();
        assert_eq!(summary.rows_exported, 250);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 251);
        assert!(text.starts_with("n\n0\n"));
    }

    #[tokio::test]
    async fn test_stream_trait_collects_chunks() {
        let chunks: Vec<Chunk> = stream(10, ExportFormat::Delimited, 4).collect().await;
        assert!(chunks.iter().all(|c| c.is_ok()));
        let total: usize = chunks.iter().map(|c| c.as_ref().unwrap().len()).sum();
        assert_eq!(total, "n\n".len() + 10 * 2);
    }

    #[tokio::test]
    async fn test_dropping_consumer_fails_job() {
        let mut export = stream(10_000, ExportFormat::Delimited, 1);
        let _ = export.next_chunk().await;
        let mut state = export.state.clone();
        drop(export);

        let terminal = state
            .wait_for(|s| s.is_terminal())
            .await
            .map(|s| *s)
            .unwrap_or(ExportState::Failed);
        assert_eq!(terminal, ExportState::Failed);
    }

    #[tokio::test]
    async fn test_write_to_path_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let summary = stream(5, ExportFormat::Delimited, 4)
            .write_to_path(&path)
            .await
            .unwrap();
        assert_eq!(summary.rows_exported, 5);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "n\n0\n1\n2\n3\n4\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_reaches_delimited_consumer_in_band() {
        let mut export = broken_stream(ExportFormat::Delimited);
        let (bytes, errors) = drain(&mut export).await;

        assert_eq!(bytes, "n\n0\n1\n".len());
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ExplorerError::Storage(StorageError::ReadFailure { rows, .. }) if *rows == (2..4)
        ));
        assert_eq!(export.state(), ExportState::Failed);
    }

    #[tokio::test]
    async fn test_read_failure_sends_no_workbook_bytes() {
        let mut export = broken_stream(ExportFormat::Spreadsheet);
        let (bytes, errors) = drain(&mut export).await;

        assert_eq!(bytes, 0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("disk went away"));
        assert_eq!(export.state(), ExportState::Failed);
    }

    #[tokio::test]
    async fn test_read_failure_fails_write_to() {
        let mut out = Vec::new();
        let err = broken_stream(ExportFormat::Delimited)
            .write_to(&mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, ExplorerError::Storage(_)));
    }

    #[tokio::test]
    async fn test_external_cancel_is_reported_in_band() {
        let cancel = CancellationToken::new();
        let mut export = cancellable_stream(50_000, ExportFormat::Delimited, 1, cancel.clone());

        assert!(export.next_chunk().await.unwrap().is_ok());
        cancel.cancel();
        let (_, errors) = drain(&mut export).await;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_cancelled());
        assert_eq!(export.state(), ExportState::Failed);
    }

    #[tokio::test]
    async fn test_spreadsheet_stream_is_zip() {
        let mut out = Vec::new();
        stream(3, ExportFormat::Spreadsheet, 4)
            .write_to(&mut out)
            .await
            .unwrap();
        assert!(out.starts_with(b"PK"));
    }
}
