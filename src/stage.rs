//! Engine-neutral three-stage dataflow.
//!
//! A materialization worker is a fixed pipeline of three stages:
//!
//! 1. an [`InputStage`] produces the items this worker owns,
//! 2. an [`ExpandStage`] turns each item into a lazy sequence of records,
//! 3. a [`ConsumeStage`] persists each record.
//!
//! A cluster runtime can drive these traits directly; [`run_stages`] drives
//! them in-process. Either way the flow is pull-based and strictly sequential:
//! a record is consumed before the next one is pulled from the expansion.

use crate::error::MaterializeError;

/// Identity the cluster runtime reports when it asks a worker for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerContext {
    pub worker_index: usize,
    pub worker_count: usize,
}

impl WorkerContext {
    #[must_use]
    pub const fn new(worker_index: usize, worker_count: usize) -> Self {
        Self {
            worker_index,
            worker_count,
        }
    }
}

pub trait InputStage {
    type Item;

    /// Items owned by this worker. `ctx` is the runtime's view of the worker,
    /// if a runtime is driving the flow.
    ///
    /// # Errors
    ///
    /// Fails if this worker has no valid input.
    fn produce(&mut self, ctx: Option<WorkerContext>) -> Result<Vec<Self::Item>, MaterializeError>;
}

pub trait ExpandStage<I> {
    type Output;
    type Outputs: Iterator<Item = Result<Self::Output, MaterializeError>>;

    /// Lazily expand one input item.
    ///
    /// # Errors
    ///
    /// Fails if the item cannot be opened for expansion.
    fn expand(&mut self, item: I) -> Result<Self::Outputs, MaterializeError>;
}

pub trait ConsumeStage<T> {
    /// Persist one record. Must not return before the record is durable.
    ///
    /// # Errors
    ///
    /// Fails if the record cannot be persisted.
    fn consume(&mut self, item: T) -> Result<(), MaterializeError>;
}

/// Drive three stages to completion, stopping at the first error.
///
/// # Errors
///
/// Returns the first error raised by any stage or by the expansion iterator.
pub fn run_stages<In, Ex, Co>(
    input: &mut In,
    expand: &mut Ex,
    consume: &mut Co,
    ctx: Option<WorkerContext>,
) -> Result<(), MaterializeError>
where
    In: InputStage,
    Ex: ExpandStage<In::Item>,
    Co: ConsumeStage<Ex::Output>,
{
    for item in input.produce(ctx)? {
        for record in expand.expand(item)? {
            consume.consume(record?)?;
        }
    }
    Ok(())
}
