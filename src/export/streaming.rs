//! Streaming row sources for export operations
//!
//! This module provides a unified interface for pulling rows out of the
//! planner in fixed-size batches without materialising the whole result.
//! Each batch is scanned on the blocking pool; a selective filter can walk a
//! large part of the dataset to fill one batch.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::dataset::Row;
use crate::error::{ExplorerError, Result};
use crate::query::ScanCursor;

/// Trait for streaming query results in batches
#[async_trait]
pub trait StreamingQuery: Send {
    /// Fetch the next batch of rows
    ///
    /// # Returns
    /// * `Result<Option<Vec<Row>>>` - Next batch of rows, or None if exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>>;

    /// Close the query and release the cursor
    async fn close(&mut self) -> Result<()>;
}

/// Planner-cursor backed streaming query
pub struct CursorStreamingQuery {
    cursor: Option<ScanCursor>,
    batch_size: usize,
    total_fetched: u64,
    closed: bool,
}

impl CursorStreamingQuery {
    /// Create a new cursor streaming query
    ///
    /// # Arguments
    /// * `cursor` - Planner scan cursor
    /// * `batch_size` - Number of rows to fetch per batch
    pub fn new(cursor: ScanCursor, batch_size: usize) -> Self {
        Self {
            cursor: Some(cursor),
            batch_size,
            total_fetched: 0,
            closed: false,
        }
    }
}

#[async_trait]
impl StreamingQuery for CursorStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        if self.closed {
            return Ok(None);
        }

        let Some(mut cursor) = self.cursor.take() else {
            return Ok(None);
        };
        let batch_size = self.batch_size;
        let (cursor, batch) = tokio::task::spawn_blocking(move || {
            let batch = cursor.next_batch(batch_size);
            (cursor, batch)
        })
        .await
        .map_err(|e| ExplorerError::Generic(format!("scan task failed: {e}")))?;

        match batch {
            Some(batch) => {
                self.cursor = Some(cursor);
                self.total_fetched += batch.len() as u64;
                debug!(
                    "Fetched batch of {} rows (total: {})",
                    batch.len(),
                    self.total_fetched
                );
                Ok(Some(batch))
            }
            None => {
                debug!("Streaming query exhausted after {} rows", self.total_fetched);
                self.closed = true;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.cursor = None;
            self.closed = true;
            info!("Closed streaming query after fetching {} rows", self.total_fetched);
        }
        Ok(())
    }
}

impl Drop for CursorStreamingQuery {
    fn drop(&mut self) {
        if !self.closed {
            debug!("CursorStreamingQuery dropped without explicit close");
            self.cursor = None;
        }
    }
}
