//! Mini-batched writes through the online store.
//!
//! [`BatchWriter`] slices a converted row sequence into consecutive
//! mini-batches of the configured size and hands them to the provider one at
//! a time. Each call blocks until the provider acknowledges it; that is the
//! only backpressure in the pipeline. A failed mini-batch stops the writer:
//! earlier mini-batches stay written, later ones are never attempted.

use crate::config::MiniBatchSetting;
use crate::error::MaterializeError;
use crate::provider::{OnlineStore, RepoConfig};
use crate::schema::FeatureView;
use crate::value::FeatureRow;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Rows acknowledged by the provider during this worker's run.
///
/// Only ever increases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressCounter {
    acknowledged: u64,
}

impl ProgressCounter {
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.acknowledged
    }

    fn advance(&mut self, rows: usize) {
        self.acknowledged = self.acknowledged.saturating_add(rows as u64);
    }
}

pub struct BatchWriter {
    store: Arc<dyn OnlineStore>,
    config: RepoConfig,
    view: Arc<FeatureView>,
    setting: MiniBatchSetting,
    mini_batch_size: Option<NonZeroUsize>,
    progress: ProgressCounter,
    mini_batches: usize,
}

impl BatchWriter {
    pub fn new(
        store: Arc<dyn OnlineStore>,
        config: RepoConfig,
        view: Arc<FeatureView>,
        setting: MiniBatchSetting,
    ) -> Self {
        Self {
            store,
            config,
            view,
            setting,
            mini_batch_size: None,
            progress: ProgressCounter::default(),
            mini_batches: 0,
        }
    }

    /// Replace the setting; it is validated again on the next write.
    pub fn set_mini_batch_setting(&mut self, setting: MiniBatchSetting) {
        self.setting = setting;
        self.mini_batch_size = None;
    }

    #[must_use]
    pub fn progress(&self) -> ProgressCounter {
        self.progress
    }

    /// Mini-batches acknowledged so far.
    #[must_use]
    pub fn mini_batches_written(&self) -> usize {
        self.mini_batches
    }

    /// Resolved mini-batch size, validating the setting on first call.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the setting is not a positive integer.
    pub fn mini_batch_size(&mut self) -> Result<NonZeroUsize, MaterializeError> {
        if let Some(size) = self.mini_batch_size {
            return Ok(size);
        }
        let size = self.setting.resolve()?;
        debug!(mini_batch_size = size.get(), "resolved mini-batch size");
        self.mini_batch_size = Some(size);
        Ok(size)
    }

    /// Write `rows` in order, one mini-batch per provider call.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Fails before any provider call if the mini-batch size is invalid, and
    /// with [`MaterializeError::ProviderWrite`] on the first rejected
    /// mini-batch.
    pub fn write(&mut self, rows: &[FeatureRow]) -> Result<usize, MaterializeError> {
        let size = self.mini_batch_size()?;
        let mut written = 0;

        for (index, mini_batch) in rows.chunks(size.get()).enumerate() {
            let mut reported = 0usize;
            let result = self.store.online_write_batch(
                &self.config,
                &self.view,
                mini_batch,
                &mut |n: usize| {
                    reported += n;
                    trace!(rows = reported, "online write progress");
                },
            );

            if let Err(source) = result {
                warn!(
                    view = %self.view.name,
                    mini_batch = index,
                    rows = mini_batch.len(),
                    acknowledged = self.progress.get(),
                    error = %source,
                    "online write failed"
                );
                return Err(MaterializeError::ProviderWrite {
                    view: self.view.name.clone(),
                    mini_batch: index,
                    rows_acknowledged: self.progress.get(),
                    source,
                });
            }

            self.progress.advance(mini_batch.len());
            self.mini_batches += 1;
            written += mini_batch.len();
            debug!(
                view = %self.view.name,
                mini_batch = index,
                rows = mini_batch.len(),
                reported,
                acknowledged = self.progress.get(),
                "mini-batch written"
            );
        }

        Ok(written)
    }
}
