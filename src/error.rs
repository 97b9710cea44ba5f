//! Error taxonomy for the materialization pipeline.
//!
//! Every stage reports failures through its own error enum. They are all
//! folded into [`MaterializeError`], which is what a worker run returns:
//!
//! - [`AssignmentError`]: the worker identity has no path, or the runtime disagrees about it
//! - [`ReadError`]: the assigned path cannot be resolved, opened or decoded
//! - [`MappingError`]: a column rename produced an invalid batch
//! - [`ConversionError`]: a value cannot be coerced to its declared type
//! - [`ConfigError`]: the mini-batch size setting or a job file is invalid
//!
//! Provider failures are carried as [`MaterializeError::ProviderWrite`].
//! None of these are recovered locally; the caller decides what to do with a
//! failed worker.

use crate::dataflow::RunState;
use crate::provider::ProviderError;
use crate::schema::ValueType;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`MaterializeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Assignment,
    Read,
    Mapping,
    Conversion,
    Configuration,
    ProviderWrite,
    State,
}

/// The worker could not be matched to its input path.
#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("worker {index} has no assigned path ({len} paths configured)")]
    OutOfRange { index: usize, len: usize },

    #[error("runtime worker index {runtime} does not match the worker identity {constructed}")]
    IdentityMismatch { constructed: usize, runtime: usize },

    #[error("runtime reports {worker_count} workers but {paths} paths are configured")]
    WorkerCountMismatch { worker_count: usize, paths: usize },
}

/// Reading columnar batches from a path failed.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("cannot resolve {path}: {source}")]
    Resolve {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob pattern {pattern}: {message}")]
    Glob { pattern: String, message: String },

    #[error("no parquet fragments found at {path}")]
    NoFragments { path: String },

    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read parquet metadata of {}: {source}", path.display())]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("cannot decode record batch from {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: ArrowError,
    },
}

/// Renaming columns produced an invalid batch.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("field mapping produces duplicate column {column}")]
    DuplicateColumn { column: String },

    #[error("cannot rebuild renamed batch: {0}")]
    Arrow(#[from] ArrowError),
}

/// A columnar batch could not be turned into feature rows.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("column {column} is missing from the batch")]
    MissingColumn { column: String },

    #[error("column {column} cannot be coerced to {value_type}: {source}")]
    Coerce {
        column: String,
        value_type: ValueType,
        #[source]
        source: ArrowError,
    },

    #[error("column {column} has type {data_type}, expected a list for {value_type}")]
    NotAList {
        column: String,
        value_type: ValueType,
        data_type: DataType,
    },

    #[error("column {column} row {row}: list elements cannot be null for {value_type}")]
    NullListElement {
        column: String,
        row: usize,
        value_type: ValueType,
    },

    #[error("column {column} has type {data_type}, which is not a timestamp")]
    UnsupportedTimestamp { column: String, data_type: DataType },

    #[error("column {column} row {row}: timestamp is out of range")]
    InvalidTimestamp { column: String, row: usize },

    #[error("column {column} row {row}: event timestamp is null")]
    NullEventTimestamp { column: String, row: usize },
}

/// Invalid configuration, detected when it is first used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("mini-batch size must be a positive integer, got {value:?}")]
    InvalidMiniBatchSize { value: String },

    #[error("feature view {view} is invalid: {reason}")]
    InvalidFeatureView { view: String, reason: String },

    #[error("cannot read job file {}: {source}", path.display())]
    ReadJob {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse job file {}: {source}", path.display())]
    ParseJob {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Error returned by a worker run.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(
        "online write of mini-batch {mini_batch} for feature view {view} failed \
         ({rows_acknowledged} rows acknowledged before it): {source}"
    )]
    ProviderWrite {
        view: String,
        mini_batch: usize,
        rows_acknowledged: u64,
        #[source]
        source: ProviderError,
    },

    #[error("{path}, batch {batch}: {source}")]
    Batch {
        path: String,
        batch: usize,
        #[source]
        source: Box<MaterializeError>,
    },

    #[error("dataflow cannot run again from state {0:?}")]
    AlreadyRun(RunState),
}

impl MaterializeError {
    /// Classify the error, looking through batch context.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Assignment(_) => ErrorKind::Assignment,
            Self::Read(_) => ErrorKind::Read,
            Self::Mapping(_) => ErrorKind::Mapping,
            Self::Conversion(_) => ErrorKind::Conversion,
            Self::Config(_) => ErrorKind::Configuration,
            Self::ProviderWrite { .. } => ErrorKind::ProviderWrite,
            Self::Batch { source, .. } => source.kind(),
            Self::AlreadyRun(_) => ErrorKind::State,
        }
    }

    /// Attach the path and batch index the error occurred at.
    #[must_use]
    pub fn at_batch(self, path: &str, batch: usize) -> Self {
        Self::Batch {
            path: path.to_string(),
            batch,
            source: Box::new(self),
        }
    }

    /// The innermost error, with batch context removed.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Batch { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T, E = MaterializeError> = std::result::Result<T, E>;
