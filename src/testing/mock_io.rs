//! Mock I/O helpers for testing against real Parquet files.
//!
//! Files are written into temporary locations that are removed when the
//! returned guard is dropped.

use super::fixtures::record_batch_from_rows;
use anyhow::{Context, Result, bail};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory that is automatically deleted when dropped.
pub struct TempDirPath {
    #[allow(dead_code)]
    temp_dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// Create a new temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self { temp_dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a file path within this directory.
    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }

    /// `path` within this directory, rendered as the string a job file would carry.
    #[must_use]
    pub fn path_string(&self, filename: &str) -> String {
        self.file_path(filename).display().to_string()
    }
}

/// Write `batches` to a single Parquet file, one row group per batch.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Fails if `batches` is empty, if the batches do not share a schema, or if
/// the file cannot be written.
pub fn write_parquet_batches(path: impl AsRef<Path>, batches: &[RecordBatch]) -> Result<usize> {
    let path = path.as_ref();
    let Some(first) = batches.first() else {
        bail!("no batches to write to {}", path.display());
    };

    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let props = WriterProperties::builder().build();
    let mut writer =
        ArrowWriter::try_new(file, first.schema(), Some(props)).context("create ArrowWriter")?;

    let mut rows = 0;
    for batch in batches {
        writer.write(batch).context("write batch to parquet")?;
        writer.flush().context("flush row group")?;
        rows += batch.num_rows();
    }
    writer.close().context("close ArrowWriter")?;
    Ok(rows)
}

/// Write serializable rows to a Parquet file, inferring the schema from `T`.
///
/// # Errors
///
/// See [`write_parquet_batches`].
pub fn write_parquet_rows<T: Serialize + Deserialize<'static>>(
    path: impl AsRef<Path>,
    rows: &[T],
) -> Result<usize> {
    let batch = record_batch_from_rows(rows)?;
    write_parquet_batches(path, &[batch])
}

/// Write a directory dataset with one Parquet file per partition.
///
/// Partition `i` becomes `part-{i:05}.parquet`, so lexicographic order is
/// partition order. Returns the written file paths in that order.
///
/// # Errors
///
/// Fails if the directory or any file cannot be written.
pub fn write_partitioned_dataset<T: Serialize + Deserialize<'static>>(
    dir: impl AsRef<Path>,
    partitions: &[Vec<T>],
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    partitions
        .iter()
        .enumerate()
        .map(|(i, rows)| {
            let path = dir.join(format!("part-{i:05}.parquet"));
            write_parquet_rows(&path, rows)?;
            Ok(path)
        })
        .collect()
}
