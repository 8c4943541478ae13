//! Active dataset holder with a swap barrier
//!
//! Readers clone an `Arc` snapshot under a short read lock and then work
//! without any lock held. A swap builds the replacement completely before it
//! takes the write lock, so every query observes either the old snapshot or
//! the new one, never a mix. In-flight work on the old snapshot keeps it
//! alive until it finishes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::catalog::ColumnCatalog;
use crate::error::{Result, StorageError};

use super::Dataset;

/// A dataset together with everything derived from it
#[derive(Debug)]
pub struct LoadedDataset {
    dataset: Dataset,
    catalog: ColumnCatalog,
    generation: u64,
    source: Option<PathBuf>,
}

impl LoadedDataset {
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Column value catalog bound to this dataset version
    pub fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    /// Monotonic load counter; changes on every swap
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }
}

/// Holder of the active dataset
#[derive(Debug)]
pub struct DatasetStore {
    current: RwLock<Option<Arc<LoadedDataset>>>,
    generation: AtomicU64,
    catalog_cap: usize,
}

impl DatasetStore {
    /// Create an empty store
    ///
    /// # Arguments
    /// * `catalog_cap` - Value cap for the catalog of every loaded dataset
    pub fn new(catalog_cap: usize) -> Self {
        Self {
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            catalog_cap,
        }
    }

    /// Current snapshot, or `NoDatasetLoaded`
    pub fn snapshot(&self) -> Result<Arc<LoadedDataset>> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        current
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| StorageError::NoDatasetLoaded.into())
    }

    /// Replace the active dataset
    ///
    /// The previous snapshot stays valid for anyone still holding it. The
    /// catalog starts empty for the new dataset.
    ///
    /// # Arguments
    /// * `dataset` - Fully built replacement
    /// * `source` - Where it was loaded from, if anywhere
    ///
    /// # Returns
    /// * `Arc<LoadedDataset>` - The newly active snapshot
    pub fn swap(&self, dataset: Dataset, source: Option<PathBuf>) -> Arc<LoadedDataset> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let loaded = Arc::new(LoadedDataset {
            dataset,
            catalog: ColumnCatalog::new(self.catalog_cap),
            generation,
            source,
        });

        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = Some(Arc::clone(&loaded));
        }

        info!(
            "Activated dataset generation {} ({} rows)",
            generation,
            loaded.dataset.row_count()
        );
        loaded
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}
