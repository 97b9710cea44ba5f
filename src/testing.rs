//! Testing utilities for materialization workers.
//!
//! This module provides what tests of a worker, or of a custom
//! [`OnlineStore`](crate::OnlineStore), usually need:
//!
//! - **Fixtures**: a driver-statistics feature view and matching rows
//! - **Mock I/O**: temporary Parquet files, directories and partitioned datasets
//! - **Fakes**: an online store that records every provider call and can fail on demand
//! - **Assertions**: checks on mini-batch sizes and write order
//!
//! # Quick Start
//!
//! ```no_run
//! use ironmat::*;
//! use ironmat::testing::*;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = TempDirPath::new()?;
//! let path = dir.file_path("part-0.parquet");
//! write_parquet_rows(&path, &driver_stats_rows(2500))?;
//!
//! let store = Arc::new(RecordingOnlineStore::new());
//! let mut flow = MaterializationDataflow::new(
//!     RepoConfig::new("test"),
//!     driver_stats_view(),
//!     vec![path.display().to_string()],
//!     WorkerIdentity::new(0),
//!     store.clone(),
//! )
//! .with_mini_batch_setting(MiniBatchSetting::default());
//!
//! flow.run(None)?;
//! assert_mini_batch_sizes(&store, &[1000, 1000, 500]);
//! # Ok(())
//! # }
//! ```

mod assertions;
mod fakes;
mod fixtures;
mod mock_io;

pub use assertions::*;
pub use fakes::*;
pub use fixtures::*;
pub use mock_io::*;
