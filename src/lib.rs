//! # Ironmat
//!
//! A **per-worker materialization pipeline** for feature stores. Ironmat reads
//! a partitioned Parquet dataset produced by an offline store, turns every
//! record into a typed feature row, and writes the rows to an online store in
//! bounded mini-batches.
//!
//! ## Key Features
//!
//! - **Static work assignment** - each worker owns exactly one input path, chosen by index
//! - **Streaming reads** - Parquet files, directories and glob patterns are read batch by batch
//! - **Field mapping** - rename source columns to feature names before conversion
//! - **Strict conversion** - values are coerced to the declared feature types or the run fails
//! - **Mini-batched writes** - rows reach the online store in ordered, bounded provider calls
//! - **Progress reporting** - acknowledged rows are counted as the provider reports them
//! - **Engine-neutral stages** - the pipeline is three plain traits any runtime can drive
//!
//! ## Quick Start
//!
//! ```no_run
//! use ironmat::*;
//! use std::sync::Arc;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let view = FeatureView::new("driver_stats", DataSource::new("event_timestamp"))
//!     .with_entity("driver_id", ValueType::Int64)
//!     .with_feature("conv_rate", ValueType::Double);
//!
//! let store = Arc::new(InMemoryOnlineStore::new());
//! let paths = vec!["/data/part-0.parquet".to_string(), "/data/part-1.parquet".to_string()];
//!
//! // Worker 1 of 2 materializes /data/part-1.parquet.
//! let mut flow = MaterializationDataflow::new(
//!     RepoConfig::new("rides"),
//!     view,
//!     paths,
//!     WorkerIdentity::new(1),
//!     store.clone(),
//! );
//! let report = flow.run(Some(WorkerContext::new(1, 2)))?;
//! assert_eq!(flow.progress().get(), report.rows_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Feature views
//!
//! A [`FeatureView`] names the entity join keys, the features with their
//! [`ValueType`]s, and the [`DataSource`] the rows come from: the event
//! timestamp column, an optional created timestamp column, and an optional
//! [`FieldMapping`] from source column names to feature names.
//!
//! ### The dataflow
//!
//! [`MaterializationDataflow`] is one worker's run. It is built from three
//! stages (see [`stage`]):
//!
//! 1. the assigned path is produced from the worker identity,
//! 2. the path is expanded into a lazy stream of Arrow record batches,
//! 3. every batch is renamed, converted into [`FeatureRow`]s and written.
//!
//! Batches are processed one at a time, so memory is bounded by a single
//! batch and its converted rows.
//!
//! ### Online stores
//!
//! Rows are persisted through the [`OnlineStore`] trait. Ironmat ships an
//! [`InMemoryOnlineStore`] for local runs and tests; other stores implement
//! the trait.
//!
//! ### Configuration
//!
//! The mini-batch size comes from the `IRONMAT_MINI_BATCH_SIZE` environment
//! variable (default 1000) and is validated before the first write. A whole
//! job can be described in a JSON file and loaded with [`load_job`].
//!
//! ## Failure Model
//!
//! A worker stops at the first error. Rows acknowledged before the error stay
//! in the online store; nothing is rolled back and nothing is retried. Every
//! error is a [`MaterializeError`] whose [`ErrorKind`] tells which stage
//! failed.
//!
//! ## Logging
//!
//! Ironmat emits [`tracing`] events and never installs a subscriber itself.
//! Run lifecycle events are logged at `info`, per-batch and per-mini-batch
//! detail at `debug`, provider progress callbacks at `trace`.
//!
//! ## Module Overview
//!
//! - [`assign`] - Worker identity and path assignment
//! - [`io`] - Parquet fragment resolution and streaming reads
//! - [`mapping`] - Column renaming
//! - [`convert`] - Arrow batches to feature rows
//! - [`writer`] - Mini-batched provider writes and progress
//! - [`stage`] - The three-stage dataflow traits
//! - [`dataflow`] - The per-worker run
//! - [`schema`] / [`value`] - Feature view metadata and typed values
//! - [`provider`] - The online store seam
//! - [`config`] - Mini-batch setting and job files
//! - [`testing`] - Fixtures and fakes for tests

pub mod assign;
pub mod config;
pub mod convert;
pub mod dataflow;
pub mod error;
pub mod io;
pub mod mapping;
pub mod provider;
pub mod schema;
pub mod stage;
pub mod testing;
pub mod value;
pub mod writer;

// General re-exports
pub use assign::{WorkerIdentity, assign_path};
pub use config::{MaterializationJob, MiniBatchSetting, load_job};
pub use convert::RowConverter;
pub use dataflow::{MaterializationDataflow, RunReport, RunState};
pub use error::{ErrorKind, MaterializeError};
pub use io::{ColumnarReader, ReaderOptions};
pub use mapping::apply_field_mapping;
pub use provider::{InMemoryOnlineStore, OnlineStore, ProviderError, RepoConfig};
pub use schema::{DataSource, Entity, Feature, FeatureView, FieldMapping, JoinKeyTypeMap, ValueType};
pub use stage::{ConsumeStage, ExpandStage, InputStage, WorkerContext, run_stages};
pub use value::{EntityKey, FeatureRow, Value};
pub use writer::{BatchWriter, ProgressCounter};
