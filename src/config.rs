//! Run configuration.
//!
//! Two pieces of configuration reach a worker:
//!
//! - the mini-batch size, an external numeric setting read from
//!   [`MINI_BATCH_SIZE_ENV`] and validated on first use;
//! - a [`MaterializationJob`] file describing the repository, the feature view
//!   and the per-worker paths, loaded from JSON.

use crate::error::ConfigError;
use crate::provider::RepoConfig;
use crate::schema::FeatureView;
use serde::{Deserialize, Serialize};
use std::env::{self, VarError};
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

/// Environment variable holding the mini-batch size.
pub const MINI_BATCH_SIZE_ENV: &str = "IRONMAT_MINI_BATCH_SIZE";

/// Rows per provider write when the setting is absent.
pub const DEFAULT_MINI_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Raw mini-batch size setting, parsed lazily by [`MiniBatchSetting::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MiniBatchSetting {
    raw: Option<String>,
}

impl MiniBatchSetting {
    /// Capture [`MINI_BATCH_SIZE_ENV`] from the process environment.
    ///
    /// A value that is not valid unicode is kept (lossily) so that it fails at
    /// resolution instead of silently falling back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let raw = match env::var(MINI_BATCH_SIZE_ENV) {
            Ok(v) => Some(v),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(os)) => Some(os.to_string_lossy().into_owned()),
        };
        Self { raw }
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
        }
    }

    #[must_use]
    pub fn fixed(size: NonZeroUsize) -> Self {
        Self::from_raw(size.to_string())
    }

    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Parse the setting into a positive mini-batch size.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMiniBatchSize`] if the value is empty,
    /// non-numeric, negative or zero.
    pub fn resolve(&self) -> Result<NonZeroUsize, ConfigError> {
        let Some(raw) = self.raw.as_deref() else {
            return Ok(DEFAULT_MINI_BATCH_SIZE);
        };
        raw.trim()
            .parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| ConfigError::InvalidMiniBatchSize {
                value: raw.to_string(),
            })
    }
}

/// Everything a worker needs besides its identity and the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializationJob {
    pub repo: RepoConfig,
    pub feature_view: FeatureView,
    /// One path per worker, indexed by worker identity.
    pub paths: Vec<String>,
}

/// Load a [`MaterializationJob`] from a JSON file.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed.
pub fn load_job(path: impl AsRef<Path>) -> Result<MaterializationJob, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadJob {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::ParseJob {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_setting_uses_default() -> anyhow::Result<()> {
        assert_eq!(MiniBatchSetting::default().resolve()?, DEFAULT_MINI_BATCH_SIZE);
        assert_eq!(DEFAULT_MINI_BATCH_SIZE.get(), 1000);
        Ok(())
    }

    #[test]
    fn numeric_setting_is_parsed() -> anyhow::Result<()> {
        assert_eq!(MiniBatchSetting::from_raw("250").resolve()?.get(), 250);
        assert_eq!(MiniBatchSetting::from_raw(" 7 ").resolve()?.get(), 7);
        Ok(())
    }

    #[test]
    fn malformed_settings_are_rejected() {
        for raw in ["0", "-5", "abc", "", "1.5"] {
            let err = MiniBatchSetting::from_raw(raw).resolve().unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidMiniBatchSize { value } if value == raw),
                "{raw:?} gave {err}"
            );
        }
    }

    // Every environment case lives in this one test so that no other test
    // observes the variable while it is being changed.
    #[test]
    fn setting_is_read_from_the_environment() -> anyhow::Result<()> {
        // SAFETY: no other test in this crate touches this variable.
        unsafe { env::set_var(MINI_BATCH_SIZE_ENV, "250") };
        let setting = MiniBatchSetting::from_env();
        assert_eq!(setting.raw(), Some("250"));
        assert_eq!(setting.resolve()?.get(), 250);

        // SAFETY: as above.
        unsafe { env::remove_var(MINI_BATCH_SIZE_ENV) };
        let setting = MiniBatchSetting::from_env();
        assert_eq!(setting.raw(), None);
        assert_eq!(setting.resolve()?.get(), 1000);

        // SAFETY: as above.
        unsafe { env::set_var(MINI_BATCH_SIZE_ENV, "0") };
        let err = MiniBatchSetting::from_env().resolve().unwrap_err();
        // SAFETY: as above.
        unsafe { env::remove_var(MINI_BATCH_SIZE_ENV) };
        assert!(matches!(err, ConfigError::InvalidMiniBatchSize { value } if value == "0"));
        Ok(())
    }

    #[test]
    fn job_file_round_trips() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("job.json");
        fs::write(
            &path,
            r#"{
                "repo": {"project": "rides"},
                "feature_view": {
                    "name": "driver_stats",
                    "entity_columns": [{"name": "driver_id", "value_type": "INT64"}],
                    "features": [{"name": "conv_rate", "value_type": "DOUBLE"}],
                    "batch_source": {
                        "timestamp_field": "event_timestamp",
                        "field_mapping": {"f1": "conv_rate"}
                    }
                },
                "paths": ["/data/part-0", "/data/part-1"]
            }"#,
        )?;

        let job = load_job(&path)?;
        assert_eq!(job.repo.project, "rides");
        assert_eq!(job.paths.len(), 2);
        assert_eq!(job.feature_view.batch_source.created_timestamp_column, None);
        assert_eq!(
            job.feature_view
                .batch_source
                .field_mapping
                .as_ref()
                .and_then(|m| m.get("f1"))
                .map(String::as_str),
            Some("conv_rate")
        );
        Ok(())
    }

    #[test]
    fn unreadable_and_malformed_job_files_fail() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        assert!(matches!(
            load_job(tmp.path().join("missing.json")),
            Err(ConfigError::ReadJob { .. })
        ));
        let bad = tmp.path().join("bad.json");
        fs::write(&bad, "{ not json")?;
        assert!(matches!(load_job(&bad), Err(ConfigError::ParseJob { .. })));
        Ok(())
    }
}
