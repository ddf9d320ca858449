// SQL Type and Value Module
//
// Runtime-level SQL values (null flag + payload) and the fixed-width codec
// used for tuple batches handed to output callbacks.

pub mod types;
pub mod value;

pub use types::SqlTypeId;
pub use value::{CodecError, SqlValue};
