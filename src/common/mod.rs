// Common Types Module
//
// Engine-wide identifier newtypes and constants shared by every subsystem.

pub mod types;

pub use types::{ColOid, DbOid, IndexId, IndexOid, NamespaceOid, TableOid, Timestamp, TupleSlot, VECTOR_SIZE};
