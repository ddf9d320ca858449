// Execution Runtime Module
//
// Runtime bridges adapting storage primitives to the DSL's opaque pointer
// contracts, plus the interpreter that drives compiled programs.

pub mod agg_hash_table;
pub mod aggregators;
pub mod bytes;
pub mod context;
pub mod index_iterator;
pub mod interp;
pub mod join_hash_table;
pub mod output;
pub mod projected_columns;
pub mod sorter;
pub mod table_vector_iterator;

use thiserror::Error;

pub use agg_hash_table::{AggOverflowPartitionIterator, AggregationHashTable, AggregationHashTableIterator};
pub use bytes::{ByteBuffer, BytePtr};
pub use context::{ExecutionContext, MemoryPool, OutputCallback, ThreadStateContainer};
pub use index_iterator::IndexIterator;
pub use interp::Interpreter;
pub use join_hash_table::{JoinHashTable, JoinHashTableIterator};
pub use output::OutputBuffer;
pub use projected_columns::{ProjectedColumns, ProjectedColumnsIterator};
pub use sorter::{Sorter, SorterIterator};
pub use table_vector_iterator::TableVectorIterator;

/// Runtime faults. These abort the current query, never the process.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("query cancelled")]
    Cancelled,
    #[error("intrinsic '{0}' is not executable in this build")]
    UnsupportedIntrinsic(String),
    #[error("table '{0}' not found")]
    TableNotFound(String),
    #[error("index '{0}' not found")]
    IndexNotFound(String),
    #[error("function '{0}' not found")]
    FunctionNotFound(String),
    #[error("{0} used before initialization")]
    NotInitialized(&'static str),
    #[error("column list must be non-empty before init")]
    EmptyColumnList,
    #[error(transparent)]
    Codec(#[from] crate::sql::CodecError),
    #[error("runtime type violation: {0}")]
    TypeViolation(String),
}
