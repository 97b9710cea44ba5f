//! Static assignment of input paths to workers.
//!
//! Every worker is constructed with its [`WorkerIdentity`] and the full list
//! of per-worker paths, and owns exactly the path at its index. Assignment is
//! decided before the run starts; there is no rebalancing.
//!
//! The identity fixed at construction is authoritative. When a runtime also
//! reports a [`WorkerContext`], it must agree with that identity, otherwise
//! the worker refuses to start rather than silently reading another worker's
//! path.

use crate::error::AssignmentError;
use crate::stage::WorkerContext;
use serde::{Deserialize, Serialize};

/// Position of this worker in the path list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub index: usize,
}

impl WorkerIdentity {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self { index }
    }

    /// Check a runtime-reported context against this identity.
    ///
    /// # Errors
    ///
    /// Fails if the runtime index differs from this identity, or if the
    /// runtime's worker count does not match the number of paths.
    pub fn reconcile(
        &self,
        ctx: Option<WorkerContext>,
        paths: usize,
    ) -> Result<(), AssignmentError> {
        let Some(ctx) = ctx else {
            return Ok(());
        };
        if ctx.worker_index != self.index {
            return Err(AssignmentError::IdentityMismatch {
                constructed: self.index,
                runtime: ctx.worker_index,
            });
        }
        if ctx.worker_count != paths {
            return Err(AssignmentError::WorkerCountMismatch {
                worker_count: ctx.worker_count,
                paths,
            });
        }
        Ok(())
    }

    /// The path owned by this worker.
    ///
    /// # Errors
    ///
    /// See [`assign_path`].
    pub fn assigned_path<'a>(&self, paths: &'a [String]) -> Result<&'a str, AssignmentError> {
        assign_path(self.index, paths)
    }
}

/// Return `paths[index]`.
///
/// # Errors
///
/// Returns [`AssignmentError::OutOfRange`] if `index` is not a valid index
/// into `paths`.
pub fn assign_path(index: usize, paths: &[String]) -> Result<&str, AssignmentError> {
    paths
        .get(index)
        .map(String::as_str)
        .ok_or(AssignmentError::OutOfRange {
            index,
            len: paths.len(),
        })
}
