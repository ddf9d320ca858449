// Transaction Module
//
// The narrow transaction-manager contract the engine consumes: begin (with
// optional begin-action), commit with post-commit callbacks, abort with
// undo, and oldest-active-timestamp tracking for quiescence barriers.

pub mod manager;

pub use manager::{Transaction, TransactionManager};
