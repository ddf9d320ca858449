// Operator DSL Module
//
// The small language the plan compiler emits: an arena-allocated AST, a
// closed intrinsic set, an interned type universe, and the semantic analyzer
// that enforces every intrinsic's calling contract.

pub mod ast;
pub mod builtins;
pub mod sema;
pub mod types;

pub use ast::{AstArena, ExprId, ExprKind, Program, SourcePos};
pub use builtins::Builtin;
pub use sema::{ErrorReporter, Sema, SemaError};
pub use types::{BuiltinKind, TypeContext, TypeKind, TypeRef};
