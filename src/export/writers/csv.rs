//! CSV writer for export operations
//!
//! Each batch is encoded into one buffer and sent as one chunk, so memory per
//! batch is proportional to the batch, not to the export.

use async_trait::async_trait;
use tracing::debug;

use crate::dataset::{Column, Row};
use crate::error::Result;

use super::{ChunkSink, FormatWriter};

/// Writer for CSV format
///
/// A header line followed by one line per row. Cells use the same rendering
/// as the interactive page view.
pub struct CsvWriter {
    sink: ChunkSink,
    buffer: Vec<u8>,
    columns: usize,
    written: u64,
    bytes_written: u64,
    finalized: bool,
}

impl CsvWriter {
    /// Create a new CSV writer
    ///
    /// # Arguments
    /// * `sink` - Where encoded chunks go
    pub fn new(sink: ChunkSink) -> Self {
        debug!("Created CSV writer for job {}", sink.job_id());
        Self {
            sink,
            buffer: Vec::new(),
            columns: 0,
            written: 0,
            bytes_written: 0,
            finalized: false,
        }
    }

    /// Append one line of already-rendered fields to the buffer
    fn push_line<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                self.buffer.push(b',');
            }
            self.buffer
                .extend_from_slice(Self::escape_csv_value(field.as_ref()).as_bytes());
        }
        self.buffer.push(b'\n');
    }

    async fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let capacity = self.buffer.capacity();
        let chunk = std::mem::replace(&mut self.buffer, Vec::with_capacity(capacity));
        self.bytes_written += chunk.len() as u64;
        self.sink.send(chunk).await
    }

    /// Escape a CSV value if necessary
    ///
    /// # Arguments
    /// * `value` - Value to escape
    ///
    /// # Returns
    /// * `String` - Escaped value
    fn escape_csv_value(value: &str) -> String {
        if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
            // Wrap in quotes and escape internal quotes by doubling them
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

#[async_trait]
impl FormatWriter for CsvWriter {
    async fn write_header(&mut self, columns: &[Column]) -> Result<()> {
        self.columns = columns.len();
        self.push_line(columns.iter().map(|c| c.name.as_str()));
        debug!("Wrote CSV header: {} fields", self.columns);
        self.flush_buffer().await
    }

    async fn write_batch(&mut self, rows: &[Row]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        for row in rows {
            if row.len() != self.columns {
                return Err(self.sink.encoding_failure(format!(
                    "row {} has {} cells, header has {}",
                    self.written,
                    row.len(),
                    self.columns
                )));
            }
            self.push_line(row.iter().map(|v| v.render()));
            self.written += 1;
        }

        self.flush_buffer().await?;
        debug!("Wrote {} rows to CSV (total: {})", rows.len(), self.written);
        Ok(rows.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(self.sink.encoding_failure("CSV output finalized twice"));
        }
        self.flush_buffer().await?;
        self.finalized = true;
        debug!(
            "Finalized CSV output for job {} ({} rows)",
            self.sink.job_id(),
            self.written
        );
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
