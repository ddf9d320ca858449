// Semantic Diagnostics
//
// Structured compile-time errors. Checks report into a shared reporter and
// continue; compilation produces no code once anything was reported.

use std::fmt;

use thiserror::Error;

use crate::dsl::ast::SourcePos;

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Compile-time diagnostics emitted by the semantic analyzer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemaError {
    #[error("{pos}: '{callee}' expects {expected} argument(s), got {actual}")]
    MismatchedArgCount {
        pos: SourcePos,
        callee: String,
        expected: String,
        actual: usize,
    },

    #[error("{pos}: argument {arg_index} to '{callee}' has type {actual}, expected {expected}")]
    BadArgType {
        pos: SourcePos,
        callee: String,
        arg_index: usize,
        expected: String,
        actual: String,
    },

    #[error("{pos}: '{name}' is not a builtin function")]
    UnknownBuiltin { pos: SourcePos, name: String },

    #[error("{pos}: argument {arg_index} to '{callee}' has type {actual}, which is not a SQL value")]
    NotASqlValue {
        pos: SourcePos,
        callee: String,
        arg_index: usize,
        actual: String,
    },

    #[error("{pos}: argument {arg_index} to '{callee}' has type {actual}, which is not a SQL aggregator")]
    NotAnAggregator {
        pos: SourcePos,
        callee: String,
        arg_index: usize,
        actual: String,
    },

    #[error("{pos}: argument {arg_index} to '{callee}' is not a function of shape {expected} (got {actual})")]
    BadFunctionShape {
        pos: SourcePos,
        callee: String,
        arg_index: usize,
        expected: String,
        actual: String,
    },

    #[error("{pos}: bad argument to pointer cast: {actual}")]
    BadPointerCast { pos: SourcePos, actual: String },

    #[error("{pos}: bad scan function for parallel table iteration: {actual}")]
    BadParallelScanFunction { pos: SourcePos, actual: String },

    #[error("{pos}: unknown identifier '{name}'")]
    UnknownIdentifier { pos: SourcePos, name: String },

    #[error("{pos}: unknown type '{name}'")]
    UnknownType { pos: SourcePos, name: String },

    #[error("{pos}: type {ty} has no field '{field}'")]
    UnknownField { pos: SourcePos, ty: String, field: String },

    #[error("{pos}: cannot compare {lhs} with {rhs}")]
    BadComparison { pos: SourcePos, lhs: String, rhs: String },

    #[error("{pos}: cannot assign {src} to target of type {dst}")]
    BadAssignment { pos: SourcePos, dst: String, src: String },

    #[error("{pos}: condition has type {actual}, expected bool")]
    BadCondition { pos: SourcePos, actual: String },

    #[error("{pos}: return value has type {actual}, function returns {expected}")]
    ReturnTypeMismatch {
        pos: SourcePos,
        expected: String,
        actual: String,
    },

    #[error("{pos}: cannot dereference non-pointer type {actual}")]
    BadDeref { pos: SourcePos, actual: String },
}

/// Accumulates diagnostics across one analysis pass.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    diagnostics: Vec<SemaError>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: SemaError) {
        log::debug!("sema: {}", error);
        self.diagnostics.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[SemaError] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<SemaError> {
        self.diagnostics
    }
}
