//! Fake online stores for testing.
//!
//! [`RecordingOnlineStore`] keeps every provider call it receives so tests can
//! check mini-batch boundaries and ordering, and can be told to reject a
//! specific call to exercise failure handling.

use crate::provider::{InMemoryOnlineStore, OnlineStore, ProviderError, RepoConfig};
use crate::schema::FeatureView;
use crate::value::FeatureRow;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Error returned by a [`RecordingOnlineStore`] on its configured failing call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("injected failure on provider call {call}")]
pub struct InjectedFailure {
    pub call: usize,
}

/// One `online_write_batch` call as seen by the fake.
#[derive(Debug, Clone)]
pub struct WriteCall {
    pub project: String,
    pub view: String,
    pub rows: Vec<FeatureRow>,
    /// Whether the call returned success.
    pub acknowledged: bool,
}

/// Online store that records calls and delegates storage to an
/// [`InMemoryOnlineStore`].
#[derive(Clone, Default)]
pub struct RecordingOnlineStore {
    calls: Arc<Mutex<Vec<WriteCall>>>,
    fail_on_call: Option<usize>,
    inner: InMemoryOnlineStore,
}

impl RecordingOnlineStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects its `call`-th write (1-based) with [`InjectedFailure`].
    ///
    /// The rejected call persists nothing and reports no progress.
    #[must_use]
    pub fn failing_on_call(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    /// Every call received so far, rejected ones included.
    #[must_use]
    pub fn calls(&self) -> Vec<WriteCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    /// Row counts of all received calls, in order.
    #[must_use]
    pub fn call_sizes(&self) -> Vec<usize> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .iter()
            .map(|c| c.rows.len())
            .collect()
    }

    /// Rows of acknowledged calls, concatenated in call order.
    #[must_use]
    pub fn acknowledged_rows(&self) -> Vec<FeatureRow> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .iter()
            .filter(|c| c.acknowledged)
            .flat_map(|c| c.rows.iter().cloned())
            .collect()
    }

    /// The backing store holding acknowledged rows.
    #[must_use]
    pub fn store(&self) -> &InMemoryOnlineStore {
        &self.inner
    }
}

impl OnlineStore for RecordingOnlineStore {
    fn online_write_batch(
        &self,
        config: &RepoConfig,
        view: &FeatureView,
        rows: &[FeatureRow],
        progress: &mut dyn FnMut(usize),
    ) -> Result<(), ProviderError> {
        let mut calls = self.calls.lock().expect("calls mutex poisoned");
        let call = calls.len() + 1;
        let mut record = WriteCall {
            project: config.project.clone(),
            view: view.name.clone(),
            rows: rows.to_vec(),
            acknowledged: false,
        };

        if self.fail_on_call == Some(call) {
            calls.push(record);
            return Err(Box::new(InjectedFailure { call }));
        }

        let result = self.inner.online_write_batch(config, view, rows, progress);
        record.acknowledged = result.is_ok();
        calls.push(record);
        result
    }
}
