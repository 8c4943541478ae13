//! Async driver for the page view
//!
//! Each ticket runs on its own task. Completions come back over a channel and
//! go through [`ViewController::complete`], so a slow fetch that finishes
//! after a newer one is simply discarded.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{ExplorerError, Result};
use crate::explorer::{DatasetInfo, Explorer};
use crate::query::QueryResult;

use super::state::{FetchTicket, ViewAction, ViewController, ViewRequest, ViewStatus};

/// Anything that can answer a page request
#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    async fn fetch(&self, request: &ViewRequest) -> Result<QueryResult>;
}

#[async_trait]
impl PageSource for Explorer {
    async fn fetch(&self, request: &ViewRequest) -> Result<QueryResult> {
        self.fetch_page(request.filters.clone(), request.offset, Some(request.page_size))
            .await
    }
}

struct Completion {
    ticket: u64,
    result: Result<QueryResult>,
}

/// Runs view fetches and applies their results in issue order
pub struct PageFetcher<S: PageSource> {
    source: Arc<S>,
    controller: ViewController,
    timeout: Duration,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl<S: PageSource> PageFetcher<S> {
    /// Create a fetcher
    ///
    /// # Arguments
    /// * `source` - Where pages come from
    /// * `page_size` - Initial rows per page
    /// * `timeout` - Deadline for each fetch
    pub fn new(source: Arc<S>, page_size: usize, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            controller: ViewController::new(page_size),
            timeout,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn status(&self) -> &ViewStatus {
        self.controller.status()
    }

    pub fn controller(&self) -> &ViewController {
        &self.controller
    }

    /// Fetches started but not yet fed back
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Apply an action and start its fetch
    ///
    /// # Returns
    /// * `u64` - Ticket id of the started fetch
    pub fn dispatch(&mut self, action: ViewAction) -> u64 {
        let ticket = self.controller.dispatch(action);
        let id = ticket.id;
        self.spawn(ticket);
        id
    }

    fn spawn(&mut self, ticket: FetchTicket) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let timeout = self.timeout;
        self.in_flight += 1;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, source.fetch(&ticket.request)).await {
                Ok(result) => result,
                Err(_) => Err(ExplorerError::Timeout {
                    operation: "page fetch".to_string(),
                    limit: timeout,
                }),
            };
            // The fetcher may be gone; then nobody wants the page.
            let _ = tx.send(Completion {
                ticket: ticket.id,
                result,
            });
        });
    }

    /// Wait for the next fetch to finish and apply it
    ///
    /// # Returns
    /// * `Option<bool>` - Whether it was applied, `None` if nothing is in flight
    pub async fn next_completion(&mut self) -> Option<bool> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.in_flight -= 1;
        let applied = self.controller.complete(completion.ticket, completion.result);
        debug!("Fetch #{} finished (applied: {})", completion.ticket, applied);
        Some(applied)
    }

    /// Wait for every outstanding fetch
    pub async fn settle(&mut self) -> &ViewStatus {
        while self.next_completion().await.is_some() {}
        self.controller.status()
    }
}

impl PageFetcher<Explorer> {
    /// Load a new dataset and show its first page with no filters
    pub async fn load_dataset(&mut self, path: impl AsRef<Path>) -> Result<DatasetInfo> {
        let info = self.source.load_dataset(path).await?;
        self.dispatch(ViewAction::Reset);
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, DataType, Dataset};
    use crate::query::FilterSelection;

    /// Answers after a delay that depends on the filter
    struct DelayedSource;

    #[async_trait]
    impl PageSource for DelayedSource {
        async fn fetch(&self, request: &ViewRequest) -> Result<QueryResult> {
            let slow = request.filters.iter().any(|(column, _)| column == "slow");
            let delay = if slow { 500 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(QueryResult {
                columns: Vec::new(),
                rows: Vec::new(),
                total_rows: 100,
                filtered_rows: if slow { 1 } else { 2 },
                offset: request.offset,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_then_fast_keeps_fast() {
        let mut fetcher = PageFetcher::new(Arc::new(DelayedSource), 10, Duration::from_secs(30));
        fetcher.dispatch(ViewAction::SetFilters(
            FilterSelection::new().with("slow", vec!["x"]),
        ));
        fetcher.dispatch(ViewAction::SetFilters(
            FilterSelection::new().with("fast", vec!["x"]),
        ));

        assert_eq!(fetcher.next_completion().await, Some(true));
        assert_eq!(fetcher.next_completion().await, Some(false));
        assert_eq!(fetcher.next_completion().await, None);
        assert_eq!(fetcher.status().page().unwrap().filtered_rows, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_error_state() {
        let mut fetcher = PageFetcher::new(Arc::new(DelayedSource), 10, Duration::from_millis(100));
        fetcher.dispatch(ViewAction::SetFilters(
            FilterSelection::new().with("slow", vec!["x"]),
        ));
        let status = fetcher.settle().await;
        assert!(matches!(status, ViewStatus::Error(m) if m.contains("timed out after 100ms")));
    }

    #[tokio::test]
    async fn test_explorer_source_and_reset_on_load() {
        let explorer = Explorer::new(crate::config::Config::default());
        explorer.activate(
            Dataset::from_rows(
                vec![Column::new("n", DataType::Int)],
                (0..30).map(|i| vec![i.into()]).collect(),
            )
            .unwrap(),
        );
        let mut fetcher = PageFetcher::new(Arc::new(explorer), 10, Duration::from_secs(5));
        fetcher.dispatch(ViewAction::SetPage(2));
        let page = fetcher.settle().await.page().unwrap().clone();
        assert_eq!(page.offset, 20);
        assert_eq!(page.rows.len(), 10);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.csv");
        std::fs::write(&path, "n\n1\n2\n3\n").unwrap();
        let info = fetcher.load_dataset(&path).await.unwrap();
        assert_eq!(info.row_count, 3);
        assert_eq!(fetcher.controller().request().offset, 0);
        let page = fetcher.settle().await.page().unwrap().clone();
        assert_eq!(page.filtered_rows, 3);
    }
}
