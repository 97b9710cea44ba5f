//! Path resolution for partitioned columnar datasets.
//!
//! A worker's path may name a single Parquet file, a directory holding the
//! fragments of a partitioned dataset, or a glob pattern over fragments.
//! [`resolve_fragments`] turns any of these into a sorted list of files so the
//! reader visits fragments in a deterministic order.
//!
//! # Examples
//!
//! ```no_run
//! use ironmat::io::glob::resolve_fragments;
//!
//! // Every fragment below a hive-style partition directory
//! let files = resolve_fragments("data/driver_stats/date=2024-01-01")?;
//!
//! // Only the fragments matching a pattern
//! let files = resolve_fragments("data/driver_stats/date=*/part-*.parquet")?;
//! # Ok::<(), ironmat::error::ReadError>(())
//! ```

use crate::error::ReadError;
use glob::glob;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static GLOB_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*?\[]").expect("valid glob regex"));

/// Whether `path` contains glob metacharacters.
#[must_use]
pub fn is_glob_pattern(path: &str) -> bool {
    GLOB_CHARS.is_match(path)
}

/// Strip a `file://` scheme, leaving a filesystem path.
#[must_use]
pub fn local_path(path: &str) -> &str {
    path.strip_prefix("file://").unwrap_or(path)
}

/// Expand a glob pattern into a sorted vector of matching files.
///
/// Directories matched by the pattern are skipped. Zero matches is not an
/// error here.
///
/// # Errors
///
/// Returns an error if the pattern is invalid or a matched entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, ReadError> {
    let paths = glob(pattern).map_err(|e| ReadError::Glob {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| ReadError::Glob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        if path.is_file() {
            result.push(path);
        }
    }

    result.sort();
    Ok(result)
}

/// Resolve a path, `file://` URI or glob pattern into its Parquet fragments.
///
/// Directory walks skip entries whose name starts with `.` or `_`
/// (`_SUCCESS`, `_metadata`, hidden files), as partitioned dataset writers
/// leave those next to the data.
///
/// # Errors
///
/// Returns [`ReadError::NoFragments`] if nothing resolves, or an I/O error if
/// the path or one of its directories cannot be read.
pub fn resolve_fragments(path: &str) -> Result<Vec<PathBuf>, ReadError> {
    let local = local_path(path);
    let fragments = if is_glob_pattern(local) {
        expand_glob(local)?
    } else {
        let meta = fs::metadata(local).map_err(|source| ReadError::Resolve {
            path: path.to_string(),
            source,
        })?;
        if meta.is_dir() {
            let mut files = Vec::new();
            walk_dir(Path::new(local), path, &mut files)?;
            files.sort();
            files
        } else {
            vec![PathBuf::from(local)]
        }
    };

    if fragments.is_empty() {
        return Err(ReadError::NoFragments {
            path: path.to_string(),
        });
    }
    Ok(fragments)
}

fn walk_dir(dir: &Path, origin: &str, out: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let resolve = |source| ReadError::Resolve {
        path: origin.to_string(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(resolve)? {
        let entry = entry.map_err(resolve)?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        let path = entry.path();
        if entry.file_type().map_err(resolve)?.is_dir() {
            walk_dir(&path, origin, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
