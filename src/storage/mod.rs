// Storage Contracts Module
//
// The narrow surfaces the execution engine consumes from the storage layer:
// projected rows, a version-visible row store, and the index contract.

pub mod index;
pub mod projected_row;
pub mod sql_table;

pub use index::{Index, IndexKeyColumn, IndexKeySchema, IndexMetadata};
pub use projected_row::{ColumnSpec, ProjectedRow, ProjectedRowInitializer};
pub use sql_table::SqlTable;
