// Export public modules
pub mod catalog;
pub mod checker;
pub mod common;
pub mod compiler;
pub mod ddl;
pub mod dsl;
pub mod exec;
pub mod plan;
pub mod sql;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use compiler::{compile, CompileError, CompiledQuery};
pub use exec::{ExecutionContext, Interpreter};
pub use plan::PhysicalPlan;
pub use sql::{SqlTypeId, SqlValue};
pub use transaction::TransactionManager;
