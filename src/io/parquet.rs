//! Streaming Parquet reader.
//!
//! [`ColumnarReader`] turns a worker's path into a lazy sequence of Arrow
//! [`RecordBatch`]es. Fragments are opened one at a time and decoded in
//! batches of at most [`ReaderOptions::batch_size`] rows, so memory use is
//! bounded by one batch regardless of how large the partition is.

use crate::error::ReadError;
use crate::io::glob::resolve_fragments;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::fs::File;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rows per decoded batch when nothing else is configured.
pub const DEFAULT_READ_BATCH_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Upper bound on rows per yielded batch. `0` is treated as 1.
    pub batch_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_READ_BATCH_SIZE,
        }
    }
}

/// Lazy, finite, non-restartable sequence of batches from one path.
///
/// Batches come in fragment order, then file order within a fragment. The
/// first error ends the sequence.
pub struct ColumnarReader {
    source: String,
    fragments: Vec<PathBuf>,
    next_fragment: usize,
    current: Option<(PathBuf, ParquetRecordBatchReader)>,
    options: ReaderOptions,
    finished: bool,
}

impl ColumnarReader {
    /// Resolve `path` into its fragments. No fragment is opened yet.
    ///
    /// # Errors
    ///
    /// Returns a [`ReadError`] if the path does not exist or resolves to no files.
    pub fn open(path: &str, options: ReaderOptions) -> Result<Self, ReadError> {
        let fragments = resolve_fragments(path)?;
        debug!(path, fragments = fragments.len(), "resolved parquet fragments");
        Ok(Self {
            source: path.to_string(),
            fragments,
            next_fragment: 0,
            current: None,
            options,
            finished: false,
        })
    }

    /// The path this reader was opened with.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn fragments(&self) -> &[PathBuf] {
        &self.fragments
    }

    fn open_fragment(&self, path: &Path) -> Result<ParquetRecordBatchReader, ReadError> {
        let file = File::open(path).map_err(|source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let parquet_err = |source| ReadError::Parquet {
            path: path.to_path_buf(),
            source,
        };
        ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(parquet_err)?
            .with_batch_size(self.options.batch_size.max(1))
            .build()
            .map_err(parquet_err)
    }

    fn fail(&mut self, err: ReadError) -> Option<Result<RecordBatch, ReadError>> {
        self.finished = true;
        self.current = None;
        Some(Err(err))
    }
}

impl Iterator for ColumnarReader {
    type Item = Result<RecordBatch, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            if let Some((path, reader)) = self.current.as_mut() {
                match reader.next() {
                    Some(Ok(batch)) => return Some(Ok(batch)),
                    Some(Err(source)) => {
                        let path = path.clone();
                        return self.fail(ReadError::Decode { path, source });
                    }
                    None => self.current = None,
                }
            }

            let Some(path) = self.fragments.get(self.next_fragment).cloned() else {
                self.finished = true;
                return None;
            };
            self.next_fragment += 1;
            match self.open_fragment(&path) {
                Ok(reader) => {
                    debug!(fragment = %path.display(), "opened parquet fragment");
                    self.current = Some((path, reader));
                }
                Err(e) => return self.fail(e),
            }
        }
    }
}

impl FusedIterator for ColumnarReader {}
