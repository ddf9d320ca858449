// Operator Translators
//
// One translator per physical plan-node kind. Translators are chained into
// pipelines; each emits its DSL fragment through the shared codegen context,
// nesting the downstream per-row body inside its control flow.

pub mod aggregate;
pub mod filter;
pub mod hash_join;
pub mod index_scan;
pub mod output;
pub mod projection;
pub mod seq_scan;
pub mod sort;

pub use aggregate::{AggregateBuildTranslator, AggregateOutputTranslator};
pub use filter::FilterTranslator;
pub use hash_join::{JoinBuildTranslator, JoinProbeTranslator};
pub use index_scan::IndexScanTranslator;
pub use output::OutputTranslator;
pub use projection::ProjectionTranslator;
pub use seq_scan::SeqScanTranslator;
pub use sort::{SortBuildTranslator, SortOutputTranslator};

use crate::compiler::codegen::{CodeGen, FunctionBuilder};
use crate::compiler::CompileError;
use crate::dsl::ast::{ExprId, Stmt};
use crate::dsl::builtins::Builtin;
use crate::sql::SqlTypeId;

/// How a translator exposes the tuple it materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializerKind {
    NotAMaterializer,
    Tuple,
    TuplePointer,
}

/// A query-level state variable a translator needs across pipelines.
#[derive(Debug, Clone)]
pub struct StateField {
    pub name: String,
    pub type_name: String,
}

/// Where a translator's output attributes come from, resolved once its
/// `produce` has run.
#[derive(Debug, Clone)]
pub enum OutputSource {
    /// Typed getter calls against a projected-columns iterator variable.
    Pci { var: String, types: Vec<SqlTypeId> },
    /// Typed getter calls against an index iterator variable.
    IndexIter { var: String, types: Vec<SqlTypeId> },
    /// Member reads on a struct-pointer variable.
    Struct { var: String, fields: Vec<String> },
    /// Aggregation payload: key members plus aggregate results.
    AggPayload {
        var: String,
        key_fields: Vec<String>,
        agg_fields: Vec<String>,
    },
    /// Left columns from one source, right columns from another.
    Pair {
        left: Box<OutputSource>,
        right: Box<OutputSource>,
        split: usize,
    },
    /// Reordered view over an inner source.
    Reorder {
        inner: Box<OutputSource>,
        mapping: Vec<usize>,
    },
}

impl OutputSource {
    /// Emit the expression producing attribute `attr_idx`.
    pub fn expr(&self, cg: &mut CodeGen, attr_idx: usize) -> Result<ExprId, CompileError> {
        match self {
            OutputSource::Pci { var, types } => {
                let type_id = *types
                    .get(attr_idx)
                    .ok_or_else(|| CompileError::Unsupported(format!("attribute {} out of range", attr_idx)))?;
                let pci = cg.ident(var);
                let col = cg.int_lit(attr_idx as i64);
                Ok(cg.call(pci_getter(type_id)?, vec![pci, col]))
            }
            OutputSource::IndexIter { var, types } => {
                let type_id = *types
                    .get(attr_idx)
                    .ok_or_else(|| CompileError::Unsupported(format!("attribute {} out of range", attr_idx)))?;
                let iter = cg.addr_of_ident(var);
                let col = cg.int_lit(attr_idx as i64);
                Ok(cg.call(index_getter(type_id)?, vec![iter, col]))
            }
            OutputSource::Struct { var, fields } => {
                let field = fields
                    .get(attr_idx)
                    .ok_or_else(|| CompileError::Unsupported(format!("attribute {} out of range", attr_idx)))?;
                Ok(cg.member_of_ident(var, field))
            }
            OutputSource::AggPayload { var, key_fields, agg_fields } => {
                if attr_idx < key_fields.len() {
                    Ok(cg.member_of_ident(var, &key_fields[attr_idx]))
                } else {
                    let field = agg_fields
                        .get(attr_idx - key_fields.len())
                        .ok_or_else(|| CompileError::Unsupported(format!("attribute {} out of range", attr_idx)))?;
                    let member = cg.member_of_ident(var, field);
                    let agg_ptr = cg.addr_of(member);
                    Ok(cg.call(Builtin::AggResult, vec![agg_ptr]))
                }
            }
            OutputSource::Pair { left, right, split } => {
                if attr_idx < *split {
                    left.expr(cg, attr_idx)
                } else {
                    right.expr(cg, attr_idx - split)
                }
            }
            OutputSource::Reorder { inner, mapping } => {
                let mapped = *mapping
                    .get(attr_idx)
                    .ok_or_else(|| CompileError::Unsupported(format!("attribute {} out of range", attr_idx)))?;
                inner.expr(cg, mapped)
            }
        }
    }
}

fn pci_getter(type_id: SqlTypeId) -> Result<Builtin, CompileError> {
    Ok(match type_id {
        SqlTypeId::SmallInt => Builtin::PciGetSmallInt,
        SqlTypeId::TinyInt | SqlTypeId::Integer => Builtin::PciGetInt,
        SqlTypeId::BigInt => Builtin::PciGetBigInt,
        SqlTypeId::Decimal => Builtin::PciGetDouble,
        other => {
            return Err(CompileError::Unsupported(format!(
                "no projected-column getter for {} columns",
                other
            )))
        }
    })
}

fn index_getter(type_id: SqlTypeId) -> Result<Builtin, CompileError> {
    Ok(match type_id {
        SqlTypeId::SmallInt => Builtin::IndexIteratorGetSmallInt,
        SqlTypeId::TinyInt | SqlTypeId::Integer => Builtin::IndexIteratorGetInt,
        SqlTypeId::BigInt => Builtin::IndexIteratorGetBigInt,
        SqlTypeId::Decimal => Builtin::IndexIteratorGetDouble,
        other => {
            return Err(CompileError::Unsupported(format!(
                "no index getter for {} columns",
                other
            )))
        }
    })
}

/// The translator interface shared by every operator.
pub trait OperatorTranslator {
    /// Struct declarations this operator needs (build rows, payloads).
    fn initialize_structs(&mut self, _cg: &mut CodeGen) {}

    /// Helper functions (comparators, key checks, vectorized filters).
    fn initialize_helper_functions(&mut self, _cg: &mut CodeGen) {}

    /// Query-level state variables living across pipelines.
    fn initialize_state_fields(&self, _fields: &mut Vec<StateField>) {}

    /// Statements run once at query start, in the driver's scope.
    fn initialize_setup(&self, _cg: &mut CodeGen, _stmts: &mut Vec<Stmt>) {}

    /// Statements run once at query end, in the driver's scope.
    fn initialize_teardown(&self, _cg: &mut CodeGen, _stmts: &mut Vec<Stmt>) {}

    /// Emit this operator's fragment. `child` is the output source of the
    /// upstream operator in the same pipeline, already produced.
    fn produce(
        &mut self,
        cg: &mut CodeGen,
        fb: &mut FunctionBuilder,
        child: Option<&OutputSource>,
    ) -> Result<(), CompileError>;

    /// Where this operator's output attributes come from; set by `produce`.
    fn output_source(&self) -> Option<&OutputSource>;

    /// Output sources of this operator's children, in child order.
    fn child_sources(&self) -> &[OutputSource] {
        &[]
    }

    /// Emit the expression for output attribute `attr_idx`.
    fn get_output(&self, cg: &mut CodeGen, attr_idx: usize) -> Result<ExprId, CompileError> {
        match self.output_source() {
            Some(source) => source.expr(cg, attr_idx),
            None => Err(CompileError::Unsupported("operator output requested before produce".to_string())),
        }
    }

    /// Emit the expression for attribute `attr_idx` of child `child_idx`.
    fn get_child_output(&self, cg: &mut CodeGen, child_idx: usize, attr_idx: usize) -> Result<ExprId, CompileError> {
        match self.child_sources().get(child_idx) {
            Some(source) => source.expr(cg, attr_idx),
            None => Err(CompileError::Unsupported(format!("no child {}", child_idx))),
        }
    }

    fn is_materializer(&self) -> MaterializerKind {
        MaterializerKind::NotAMaterializer
    }

    /// The materialized tuple's variable and type names, for materializers.
    fn materialized_tuple(&self) -> Option<(&str, &str)> {
        None
    }
}
