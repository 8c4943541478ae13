//! Explorer service
//!
//! The one entry point collaborators use: page fetches, filter value lookups,
//! exports and dataset loads against the active dataset. Planner and catalog
//! work runs on the blocking pool under the configured deadlines.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::ColumnCatalogEntry;
use crate::config::Config;
use crate::dataset::{self, Column, Dataset, DatasetStore};
use crate::error::{ExplorerError, Result};
use crate::export::{
    CursorStreamingQuery, ExportFormat, ExportJob, ExportStream, ProgressTracker, RowLimitPlan,
};
use crate::query::{FilterSelection, FilterSpec, PaginationWindow, QueryPlanner, QueryResult};

/// Shape of a freshly loaded dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub source: Option<PathBuf>,
    pub row_count: u64,
    pub columns: Vec<Column>,
    /// Load counter of the store after the swap
    pub generation: u64,
}

/// Parameters of an export request
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub filters: FilterSelection,
    /// Caller's cap; `None` exports every matching row the format allows
    pub row_limit: Option<u64>,
}

/// Explorer service over one active dataset
#[derive(Clone)]
pub struct Explorer {
    store: Arc<DatasetStore>,
    config: Arc<Config>,
}

impl Explorer {
    /// Create an explorer with no dataset loaded
    pub fn new(config: Config) -> Self {
        let store = Arc::new(DatasetStore::new(config.catalog.value_cap));
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<DatasetStore> {
        &self.store
    }

    /// Make an in-memory dataset the active one
    pub fn activate(&self, dataset: Dataset) -> DatasetInfo {
        self.activate_from(dataset, None)
    }

    fn activate_from(&self, dataset: Dataset, source: Option<PathBuf>) -> DatasetInfo {
        let loaded = self.store.swap(dataset, source);
        DatasetInfo {
            source: loaded.source().cloned(),
            row_count: loaded.dataset().row_count(),
            columns: loaded.dataset().schema().columns().to_vec(),
            generation: loaded.generation(),
        }
    }

    /// Load a CSV file and swap it in as the active dataset
    ///
    /// The column catalog of the previous dataset is discarded with it.
    /// Queries already running finish against the dataset they started on.
    ///
    /// # Arguments
    /// * `path` - CSV file to read
    ///
    /// # Returns
    /// * `Result<DatasetInfo>` - Row count and columns of the new dataset
    pub async fn load_dataset(&self, path: impl AsRef<Path>) -> Result<DatasetInfo> {
        let path = path.as_ref().to_path_buf();
        let source = path.clone();
        let dataset = tokio::task::spawn_blocking(move || dataset::load_csv(&source))
            .await
            .map_err(|e| ExplorerError::Generic(format!("dataset load task failed: {e}")))??;
        let info = self.activate_from(dataset, Some(path));
        info!(
            "Active dataset is now {} ({} rows, {} columns)",
            info.source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            info.row_count,
            info.columns.len()
        );
        Ok(info)
    }

    /// Loadable datasets in `dir`, sorted by path
    pub async fn list_datasets(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || dataset::list_datasets(dir))
            .await
            .map_err(|e| ExplorerError::Generic(format!("dataset listing task failed: {e}")))?
    }

    /// Fetch one page of the filtered dataset
    ///
    /// # Arguments
    /// * `filters` - Raw filter selection; an unknown column rejects the request
    /// * `offset` - First matching row to return
    /// * `limit` - Page size; defaults to the configured page size. Zero is an
    ///   empty window. Only an explicit `query.max_page_size` caps it; the
    ///   window itself is clamped to the matching rows, never rejected
    ///
    /// # Returns
    /// * `Result<QueryResult>` - Page rows with exact total and filtered counts
    pub async fn fetch_page(
        &self,
        filters: FilterSelection,
        offset: u64,
        limit: Option<usize>,
    ) -> Result<QueryResult> {
        let limit = self.page_limit(limit);
        let snapshot = self.store.snapshot()?;
        debug!("Fetching page offset={} limit={}", offset, limit);

        with_deadline(
            "page fetch",
            self.config.fetch_timeout(),
            blocking(move || {
                let spec = FilterSpec::validate(snapshot.dataset().schema(), &filters)?;
                let window = PaginationWindow::new(offset, limit as u64);
                Ok(QueryPlanner::evaluate(snapshot.dataset(), &spec, window))
            }),
        )
        .await
    }

    fn page_limit(&self, limit: Option<usize>) -> usize {
        let limit = limit.unwrap_or(self.config.query.default_page_size);
        match self.config.query.max_page_size {
            Some(max) => limit.min(max),
            None => limit,
        }
    }

    /// Distinct values of `column` for filter pickers
    pub async fn list_column_values(&self, column: &str) -> Result<Arc<ColumnCatalogEntry>> {
        let snapshot = self.store.snapshot()?;
        let column = column.to_string();
        with_deadline(
            "column value lookup",
            self.config.lookup_timeout(),
            blocking(move || snapshot.catalog().values_for(snapshot.dataset(), &column)),
        )
        .await
    }

    /// Start a bulk export of the filtered dataset
    ///
    /// The filter is validated and frozen before this returns, and the
    /// truncation indicator is already known on the returned stream.
    pub async fn start_export(&self, request: ExportRequest) -> Result<ExportStream> {
        self.start_export_with(request, CancellationToken::new(), false)
            .await
    }

    /// [`Explorer::start_export`] with an external cancellation token and an
    /// optional progress bar
    pub async fn start_export_with(
        &self,
        request: ExportRequest,
        cancel: CancellationToken,
        show_progress: bool,
    ) -> Result<ExportStream> {
        let snapshot = self.store.snapshot()?;
        let spec = FilterSpec::validate(snapshot.dataset().schema(), &request.filters)?;
        let job = ExportJob::new(request.format, spec, request.row_limit);

        let counted = Arc::clone(&snapshot);
        let filters = Arc::clone(job.filters());
        let filtered_rows = with_deadline(
            "export row count",
            self.config.fetch_timeout(),
            blocking(move || Ok(QueryPlanner::count(counted.dataset(), &filters))),
        )
        .await?;

        let plan = RowLimitPlan::compute(job.format(), job.row_limit(), filtered_rows);
        if plan.truncated {
            warn!(
                "{} export limited to {} of {} rows",
                job.format(),
                plan.effective,
                plan.requested
            );
        }

        let columns = snapshot.dataset().schema().columns().to_vec();
        let cursor = QueryPlanner::scan(snapshot, Arc::clone(job.filters()), plan.effective);
        let query = CursorStreamingQuery::new(cursor, self.config.export.batch_size);
        let tracker = ProgressTracker::new(Some(plan.effective), show_progress);

        info!("Export job {} accepted ({} format)", job.id(), job.format());
        Ok(ExportStream::spawn(
            job,
            columns,
            Box::new(query),
            plan,
            self.config.export.channel_capacity,
            tracker,
            cancel,
        ))
    }
}

/// Run planner or catalog work on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExplorerError::Generic(format!("worker task failed: {e}")))?
}

/// Bound `work` by `limit`, surfacing an overrun as `Timeout`
async fn with_deadline<T>(
    operation: &str,
    limit: Duration,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} exceeded {:?}", operation, limit);
            Err(ExplorerError::Timeout {
                operation: operation.to_string(),
                limit,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DataType, Value};
    use crate::error::{CatalogError, QueryError, StorageError};

    fn sales() -> Dataset {
        Dataset::from_rows(
            vec![
                Column::new("region", DataType::Text),
                Column::new("amount", DataType::Int),
            ],
            vec![
                vec!["east".into(), 10.into()],
                vec!["west".into(), 20.into()],
                vec!["east".into(), 30.into()],
                vec!["north".into(), 40.into()],
            ],
        )
        .unwrap()
    }

    fn explorer() -> Explorer {
        let explorer = Explorer::new(Config::default());
        explorer.activate(sales());
        explorer
    }

    #[tokio::test]
    async fn test_fetch_page_filters_and_counts() {
        let page = explorer()
            .fetch_page(
                FilterSelection::new().with("region", vec!["east"]),
                0,
                Some(10),
            )
            .await
            .unwrap();
        assert_eq!(page.total_rows, 4);
        assert_eq!(page.filtered_rows, 2);
        assert_eq!(page.rows[1][1], Value::Int(30));
    }

    #[tokio::test]
    async fn test_fetch_page_caps_limit_when_configured() {
        let mut config = Config::default();
        config.query.max_page_size = Some(2);
        let explorer = Explorer::new(config);
        explorer.activate(sales());
        let page = explorer
            .fetch_page(FilterSelection::new(), 0, Some(500))
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.filtered_rows, 4);
    }

    #[tokio::test]
    async fn test_fetch_page_zero_limit_is_empty_window() {
        let page = explorer()
            .fetch_page(FilterSelection::new(), 0, Some(0))
            .await
            .unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.filtered_rows, 4);

        let none = explorer()
            .fetch_page(FilterSelection::new().with("region", vec!["south"]), 0, Some(0))
            .await
            .unwrap();
        assert!(none.rows.is_empty());
        assert_eq!(none.filtered_rows, 0);
    }

    #[tokio::test]
    async fn test_fetch_page_limit_is_not_capped_by_default() {
        let explorer = Explorer::new(Config::default());
        explorer.activate(
            Dataset::from_rows(
                vec![Column::new("n", DataType::Int)],
                (0..30_000i64).map(|i| vec![Value::Int(i % 2)]).collect(),
            )
            .unwrap(),
        );
        let page = explorer
            .fetch_page(FilterSelection::new().with("n", vec![1i64]), 0, Some(15_000))
            .await
            .unwrap();
        assert_eq!(page.filtered_rows, 15_000);
        assert_eq!(page.rows.len(), 15_000);
    }

    #[tokio::test]
    async fn test_unknown_filter_column_rejected() {
        let err = explorer()
            .fetch_page(FilterSelection::new().with("color", vec!["red"]), 0, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExplorerError::Query(QueryError::InvalidFilterColumn { ref column }) if column == "color"
        ));
    }

    #[tokio::test]
    async fn test_no_dataset_loaded() {
        let explorer = Explorer::new(Config::default());
        let err = explorer
            .fetch_page(FilterSelection::new(), 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExplorerError::Storage(StorageError::NoDatasetLoaded)));
    }

    #[tokio::test]
    async fn test_list_column_values() {
        let explorer = explorer();
        let entry = explorer.list_column_values("region").await.unwrap();
        assert_eq!(entry.values, vec!["east", "north", "west"]);
        let err = explorer.list_column_values("nope").await.unwrap_err();
        assert!(matches!(err, ExplorerError::Catalog(CatalogError::UnknownColumn { .. })));
    }

    #[tokio::test]
    async fn test_activate_invalidates_catalog() {
        let explorer = explorer();
        explorer.list_column_values("region").await.unwrap();
        let info = explorer.activate(
            Dataset::from_rows(
                vec![Column::new("region", DataType::Text)],
                vec![vec!["south".into()]],
            )
            .unwrap(),
        );
        assert_eq!(info.row_count, 1);
        let entry = explorer.list_column_values("region").await.unwrap();
        assert_eq!(entry.values, vec!["south"]);
    }

    #[tokio::test]
    async fn test_load_dataset_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "region,amount\neast,1\nwest,2\n").unwrap();

        let explorer = Explorer::new(Config::default());
        let info = explorer.load_dataset(&path).await.unwrap();
        assert_eq!(info.row_count, 2);
        assert_eq!(info.columns[1].data_type, DataType::Int);
        assert_eq!(explorer.list_datasets(dir.path()).await.unwrap(), vec![path]);
    }

    #[tokio::test]
    async fn test_export_keeps_filter_snapshot() {
        let explorer = explorer();
        let stream = explorer
            .start_export(ExportRequest {
                format: ExportFormat::Delimited,
                filters: FilterSelection::new().with("region", vec!["east"]),
                row_limit: None,
            })
            .await
            .unwrap();
        assert!(!stream.truncated());
        assert_eq!(stream.effective_row_limit(), 2);
        assert!(stream.filename().ends_with(".csv"));

        let mut out = Vec::new();
        let summary = stream.write_to(&mut out).await.unwrap();
        assert_eq!(summary.rows_exported, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "region,amount\neast,10\neast,30\n");
    }

    #[tokio::test]
    async fn test_export_row_limit() {
        let stream = explorer()
            .start_export(ExportRequest {
                format: ExportFormat::Delimited,
                filters: FilterSelection::new(),
                row_limit: Some(1),
            })
            .await
            .unwrap();
        let mut out = Vec::new();
        let summary = stream.write_to(&mut out).await.unwrap();
        assert_eq!(summary.rows_exported, 1);
    }

    #[tokio::test]
    async fn test_deadline_surfaces_timeout() {
        let err = with_deadline(
            "page fetch",
            Duration::from_millis(20),
            blocking(|| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ExplorerError::Timeout { limit, .. } if limit == Duration::from_millis(20)
        ));
        assert!(err.to_string().ends_with("20ms"));
    }
}
