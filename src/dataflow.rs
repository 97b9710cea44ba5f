//! The per-worker materialization dataflow.
//!
//! [`MaterializationDataflow`] wires the pipeline into the three stages of
//! [`crate::stage`]:
//!
//! - [`AssignedPath`] produces the single path this worker owns,
//! - [`ReadBatches`] expands it into a stream of Arrow batches,
//! - [`WriteBatches`] renames, converts and writes each batch.
//!
//! Batches are handled strictly one after another: batch *n* is fully written
//! before batch *n + 1* is read. Any error ends the run; whatever was
//! acknowledged before it stays in the online store.
//!
//! # Example
//!
//! ```no_run
//! use ironmat::*;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let job = ironmat::config::load_job("job.json")?;
//! let store = Arc::new(InMemoryOnlineStore::new());
//!
//! let mut flow = MaterializationDataflow::from_job(job, WorkerIdentity::new(0), store);
//! let report = flow.run(None)?;
//! println!("wrote {} rows from {}", report.rows_written, report.path);
//! # Ok(())
//! # }
//! ```

use crate::assign::WorkerIdentity;
use crate::config::{MaterializationJob, MiniBatchSetting};
use crate::convert::RowConverter;
use crate::error::MaterializeError;
use crate::io::{ColumnarReader, ReaderOptions};
use crate::mapping::apply_field_mapping;
use crate::provider::{OnlineStore, RepoConfig};
use crate::schema::{FeatureView, FieldMapping};
use crate::stage::{ConsumeStage, ExpandStage, InputStage, WorkerContext, run_stages};
use crate::writer::{BatchWriter, ProgressCounter};
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Lifecycle of a worker run. There is no pause, resume or retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub worker: usize,
    pub path: String,
    pub batches: usize,
    pub rows_written: u64,
    pub mini_batches: usize,
    pub elapsed: Duration,
}

/// Input stage: the one path owned by this worker.
pub struct AssignedPath {
    identity: WorkerIdentity,
    paths: Vec<String>,
    assigned: Option<String>,
}

impl AssignedPath {
    #[must_use]
    pub fn new(identity: WorkerIdentity, paths: Vec<String>) -> Self {
        Self {
            identity,
            paths,
            assigned: None,
        }
    }

    /// The path handed out by the last `produce` call.
    #[must_use]
    pub fn assigned(&self) -> Option<&str> {
        self.assigned.as_deref()
    }
}

impl InputStage for AssignedPath {
    type Item = String;

    fn produce(&mut self, ctx: Option<WorkerContext>) -> Result<Vec<String>, MaterializeError> {
        self.identity.reconcile(ctx, self.paths.len())?;
        let path = self.identity.assigned_path(&self.paths)?.to_string();
        info!(worker = self.identity.index, path = %path, "assigned input path");
        self.assigned = Some(path.clone());
        Ok(vec![path])
    }
}

/// One batch read from a path, with its position for error context.
#[derive(Debug, Clone)]
pub struct PathBatch {
    pub path: Arc<str>,
    pub index: usize,
    pub batch: RecordBatch,
}

/// Expansion of a path into its batches.
pub struct PathBatches {
    path: Arc<str>,
    reader: ColumnarReader,
    next_index: usize,
}

impl Iterator for PathBatches {
    type Item = Result<PathBatch, MaterializeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next_index;
        let item = self.reader.next()?;
        self.next_index += 1;
        Some(match item {
            Ok(batch) => Ok(PathBatch {
                path: Arc::clone(&self.path),
                index,
                batch,
            }),
            Err(e) => Err(MaterializeError::from(e).at_batch(&self.path, index)),
        })
    }
}

/// Expand stage: stream a path into Arrow batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadBatches {
    options: ReaderOptions,
}

impl ReadBatches {
    #[must_use]
    pub const fn new(options: ReaderOptions) -> Self {
        Self { options }
    }
}

impl ExpandStage<String> for ReadBatches {
    type Output = PathBatch;
    type Outputs = PathBatches;

    fn expand(&mut self, path: String) -> Result<PathBatches, MaterializeError> {
        let reader = ColumnarReader::open(&path, self.options)?;
        Ok(PathBatches {
            path: Arc::from(path),
            reader,
            next_index: 0,
        })
    }
}

/// Consume stage: rename, convert and write one batch at a time.
pub struct WriteBatches {
    mapping: Option<FieldMapping>,
    converter: RowConverter,
    writer: BatchWriter,
    batches: usize,
}

impl WriteBatches {
    #[must_use]
    pub fn new(view: Arc<FeatureView>, writer: BatchWriter) -> Self {
        Self {
            mapping: view.batch_source.field_mapping.clone(),
            converter: RowConverter::new(view),
            writer,
            batches: 0,
        }
    }

    #[must_use]
    pub fn progress(&self) -> ProgressCounter {
        self.writer.progress()
    }

    /// Batches fully written so far.
    #[must_use]
    pub fn batches(&self) -> usize {
        self.batches
    }

    fn write_batch(&mut self, batch: RecordBatch) -> Result<usize, MaterializeError> {
        let batch = apply_field_mapping(batch, self.mapping.as_ref())?;
        let rows = self.converter.convert(&batch)?;
        drop(batch);
        self.writer.write(&rows)
    }
}

impl ConsumeStage<PathBatch> for WriteBatches {
    fn consume(&mut self, item: PathBatch) -> Result<(), MaterializeError> {
        let PathBatch { path, index, batch } = item;
        let num_rows = batch.num_rows();
        let written = self
            .write_batch(batch)
            .map_err(|e| e.at_batch(&path, index))?;
        self.batches += 1;
        debug!(
            path = %path,
            batch = index,
            rows = num_rows,
            written,
            acknowledged = self.writer.progress().get(),
            "batch materialized"
        );
        Ok(())
    }
}

/// A single worker's materialization run.
pub struct MaterializationDataflow {
    view: Arc<FeatureView>,
    identity: WorkerIdentity,
    input: AssignedPath,
    read: ReadBatches,
    write: WriteBatches,
    state: RunState,
}

impl MaterializationDataflow {
    /// Build a worker. The mini-batch size is taken from the environment and
    /// validated on the first write.
    pub fn new(
        config: RepoConfig,
        view: FeatureView,
        paths: Vec<String>,
        identity: WorkerIdentity,
        store: Arc<dyn OnlineStore>,
    ) -> Self {
        let view = Arc::new(view);
        let writer = BatchWriter::new(
            store,
            config,
            Arc::clone(&view),
            MiniBatchSetting::from_env(),
        );
        Self {
            input: AssignedPath::new(identity, paths),
            read: ReadBatches::default(),
            write: WriteBatches::new(Arc::clone(&view), writer),
            view,
            identity,
            state: RunState::NotStarted,
        }
    }

    pub fn from_job(
        job: MaterializationJob,
        identity: WorkerIdentity,
        store: Arc<dyn OnlineStore>,
    ) -> Self {
        Self::new(job.repo, job.feature_view, job.paths, identity, store)
    }

    /// Replace the mini-batch size setting.
    #[must_use]
    pub fn with_mini_batch_setting(mut self, setting: MiniBatchSetting) -> Self {
        self.write.writer.set_mini_batch_setting(setting);
        self
    }

    #[must_use]
    pub fn with_reader_options(mut self, options: ReaderOptions) -> Self {
        self.read = ReadBatches::new(options);
        self
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[must_use]
    pub fn progress(&self) -> ProgressCounter {
        self.write.progress()
    }

    #[must_use]
    pub fn feature_view(&self) -> &FeatureView {
        &self.view
    }

    /// Hand the three stages to an external runtime instead of calling [`run`](Self::run).
    #[must_use]
    pub fn into_stages(self) -> (AssignedPath, ReadBatches, WriteBatches) {
        (self.input, self.read, self.write)
    }

    /// Run this worker to completion.
    ///
    /// `ctx` is the runtime's view of this worker, if any; it must agree with
    /// the identity the dataflow was built with.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage. A dataflow runs at most once;
    /// calling `run` again returns [`MaterializeError::AlreadyRun`].
    pub fn run(&mut self, ctx: Option<WorkerContext>) -> Result<RunReport, MaterializeError> {
        if self.state != RunState::NotStarted {
            return Err(MaterializeError::AlreadyRun(self.state));
        }
        self.state = RunState::Running;
        let started = Instant::now();
        info!(
            worker = self.identity.index,
            view = %self.view.name,
            "starting materialization"
        );

        let result = self
            .view
            .validate()
            .map_err(MaterializeError::from)
            .and_then(|()| run_stages(&mut self.input, &mut self.read, &mut self.write, ctx));

        match result {
            Ok(()) => {
                self.state = RunState::Completed;
                let report = RunReport {
                    worker: self.identity.index,
                    path: self.input.assigned().unwrap_or_default().to_string(),
                    batches: self.write.batches(),
                    rows_written: self.write.progress().get(),
                    mini_batches: self.write.writer.mini_batches_written(),
                    elapsed: started.elapsed(),
                };
                info!(
                    worker = report.worker,
                    path = %report.path,
                    batches = report.batches,
                    rows = report.rows_written,
                    mini_batches = report.mini_batches,
                    elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                    "materialization completed"
                );
                Ok(report)
            }
            Err(e) => {
                self.state = RunState::Failed;
                error!(
                    worker = self.identity.index,
                    path = self.input.assigned().unwrap_or("<unassigned>"),
                    acknowledged = self.write.progress().get(),
                    error = %e,
                    "materialization failed"
                );
                Err(e)
            }
        }
    }
}
