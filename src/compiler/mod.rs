// Plan Compiler Module
//
// Lowers physical plans into the operator DSL: per-operator translators
// chained into pipelines, a shared codegen context, and the composer that
// emits and type-checks the final program.

pub mod codegen;
pub mod expression;
pub mod operators;
pub mod pipeline;

use thiserror::Error;

use crate::dsl::sema::SemaError;

pub use codegen::{CodeGen, FunctionBuilder};
pub use operators::{MaterializerKind, OperatorTranslator, OutputSource, StateField};
pub use pipeline::{compile, CompiledQuery, Pipeline};

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("unsupported plan construct: {0}")]
    Unsupported(String),
    #[error("semantic analysis reported {} diagnostic(s)", .0.len())]
    Sema(Vec<SemaError>),
}
