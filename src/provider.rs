//! The online-store write seam.
//!
//! [`OnlineStore`] is the boundary to whatever persists feature rows for
//! serving. The pipeline only ever calls [`OnlineStore::online_write_batch`],
//! synchronously, one mini-batch at a time.
//!
//! [`InMemoryOnlineStore`] is a thread-safe in-process implementation for
//! local runs and tests. It keeps the newest row per entity key, as online
//! stores do.

use crate::schema::FeatureView;
use crate::value::{EntityKey, FeatureRow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex, PoisonError};

/// Error type returned by online store implementations.
pub type ProviderError = Box<dyn Error + Send + Sync + 'static>;

/// Repository-level settings passed through to the provider on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Project namespace the feature views belong to.
    pub project: String,
    /// Provider-specific settings, opaque to the pipeline.
    #[serde(default)]
    pub online_store: HashMap<String, String>,
}

impl RepoConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            online_store: HashMap::new(),
        }
    }
}

/// Sink that persists feature rows for low-latency lookup.
///
/// Implementations must be safe to call concurrently from independent workers.
pub trait OnlineStore: Send + Sync {
    /// Persist `rows` for `view`, blocking until they are acknowledged.
    ///
    /// `progress` is called with the number of rows persisted, either once
    /// per row or in bulk.
    ///
    /// # Errors
    ///
    /// Returns a provider-defined error if the rows could not be persisted.
    fn online_write_batch(
        &self,
        config: &RepoConfig,
        view: &FeatureView,
        rows: &[FeatureRow],
        progress: &mut dyn FnMut(usize),
    ) -> Result<(), ProviderError>;
}

type TableStorage = Arc<Mutex<HashMap<String, HashMap<String, FeatureRow>>>>;

/// In-process online store keyed by project, feature view and entity key.
#[derive(Clone, Default)]
pub struct InMemoryOnlineStore {
    tables: TableStorage,
}

impl InMemoryOnlineStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table_name(config: &RepoConfig, view: &str) -> String {
        format!("{}_{}", config.project, view)
    }

    /// Latest row stored for `key`.
    #[must_use]
    pub fn online_read(
        &self,
        config: &RepoConfig,
        view: &str,
        key: &EntityKey,
    ) -> Option<FeatureRow> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(&Self::table_name(config, view))
            .and_then(|t| t.get(&key.storage_key()))
            .cloned()
    }

    /// Number of distinct entity keys stored for `view`.
    #[must_use]
    pub fn len(&self, config: &RepoConfig, view: &str) -> usize {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(&Self::table_name(config, view))
            .map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn is_empty(&self, config: &RepoConfig, view: &str) -> bool {
        self.len(config, view) == 0
    }
}

impl OnlineStore for InMemoryOnlineStore {
    fn online_write_batch(
        &self,
        config: &RepoConfig,
        view: &FeatureView,
        rows: &[FeatureRow],
        progress: &mut dyn FnMut(usize),
    ) -> Result<(), ProviderError> {
        let mut persisted = 0;
        {
            let mut tables = self
                .tables
                .lock()
                .map_err(|_| "in-memory online store lock poisoned")?;
            let table = tables
                .entry(Self::table_name(config, &view.name))
                .or_default();
            for row in rows {
                let key = row.entity_key.storage_key();
                let stale = table
                    .get(&key)
                    .is_some_and(|existing| existing.event_timestamp > row.event_timestamp);
                if !stale {
                    table.insert(key, row.clone());
                }
                persisted += 1;
            }
        }
        // Reported in bulk, outside the lock.
        progress(persisted);
        Ok(())
    }
}
