//! Columnar input: path resolution and streaming Parquet reads.

pub mod glob;
pub mod parquet;

pub use self::parquet::{ColumnarReader, ReaderOptions};
