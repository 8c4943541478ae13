//! Format writers for export operations
//!
//! Writers accept rows one batch at a time and hand encoded bytes to the
//! consumer through a bounded [`ChunkSink`]. Neither writer keeps more than a
//! batch worth of rows in memory.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::dataset::{Column, Row};
use crate::error::{ExplorerError, ExportError, Result};
use crate::export::job::ExportFormat;

pub mod csv;
pub mod xlsx;

pub use self::csv::CsvWriter;
pub use self::xlsx::XlsxWriter;

/// Item type of an export byte stream
pub type Chunk = Result<Vec<u8>>;

/// Trait for writing rows to different file formats
#[async_trait]
pub trait FormatWriter: Send {
    /// Write the header row
    async fn write_header(&mut self, columns: &[Column]) -> Result<()>;

    /// Write a batch of rows
    ///
    /// # Returns
    /// * `Result<usize>` - Number of rows written
    async fn write_batch(&mut self, rows: &[Row]) -> Result<usize>;

    /// Close the document framing and flush everything to the consumer
    ///
    /// Must be called at most once, and only after every row was written.
    async fn finalize(&mut self) -> Result<()>;

    /// Bytes handed to the consumer so far
    fn bytes_written(&self) -> u64;
}

/// Create the writer for a format
///
/// # Arguments
/// * `format` - Target format
/// * `sink` - Where encoded chunks go
pub fn create_writer(format: ExportFormat, sink: ChunkSink) -> Box<dyn FormatWriter> {
    match format {
        ExportFormat::Delimited => Box::new(CsvWriter::new(sink)),
        ExportFormat::Spreadsheet => Box::new(XlsxWriter::new(sink)),
    }
}

/// Sending half of an export byte stream
///
/// A send that finds the consumer gone reports `Cancelled`, which is how a
/// disconnect aborts the export.
#[derive(Debug, Clone)]
pub struct ChunkSink {
    sender: mpsc::Sender<Chunk>,
    job_id: String,
}

impl ChunkSink {
    pub fn new(sender: mpsc::Sender<Chunk>, job_id: impl Into<String>) -> Self {
        Self {
            sender,
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Send encoded bytes; waits while the consumer is behind
    pub async fn send(&self, bytes: Vec<u8>) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.sender
            .send(Ok(bytes))
            .await
            .map_err(|_| self.cancelled())
    }

    /// Report a failure in-band, ahead of the end of the stream
    pub async fn send_error(&self, err: ExplorerError) {
        // Nobody to tell if the consumer is gone.
        let _ = self.sender.send(Err(err)).await;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the consumer has dropped the stream
    pub async fn closed(&self) {
        self.sender.closed().await
    }

    pub(crate) fn cancelled(&self) -> ExplorerError {
        ExportError::Cancelled {
            job_id: self.job_id.clone(),
        }
        .into()
    }

    pub(crate) fn encoding_failure(&self, message: impl Into<String>) -> ExplorerError {
        ExportError::EncodingFailure {
            job_id: self.job_id.clone(),
            message: message.into(),
        }
        .into()
    }
}
