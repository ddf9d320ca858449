// Plan Expression Translation
//
// Lowers plan predicates into DSL expressions against an operator's output
// source. Conjunctions are split by callers; every conjunct lowers to one
// SQL-boolean expression.

use crate::compiler::codegen::CodeGen;
use crate::compiler::operators::OutputSource;
use crate::compiler::CompileError;
use crate::dsl::ast::{CmpOp, ExprId};
use crate::dsl::builtins::Builtin;
use crate::plan::{CompareOp, PlanExpr};

pub fn cmp_op(op: CompareOp) -> CmpOp {
    match op {
        CompareOp::Eq => CmpOp::Eq,
        CompareOp::Ne => CmpOp::Ne,
        CompareOp::Lt => CmpOp::Lt,
        CompareOp::Le => CmpOp::Le,
        CompareOp::Gt => CmpOp::Gt,
        CompareOp::Ge => CmpOp::Ge,
    }
}

/// Lower one conjunct into a DSL expression producing a SQL boolean.
pub fn translate_conjunct(cg: &mut CodeGen, expr: &PlanExpr, child: &OutputSource) -> Result<ExprId, CompileError> {
    match expr {
        PlanExpr::Compare { op, left, right } => {
            let lhs = translate_value(cg, left, child)?;
            let rhs = translate_value(cg, right, child)?;
            Ok(cg.compare(cmp_op(*op), lhs, rhs))
        }
        PlanExpr::BoolLiteral(v) => {
            let lit = cg.bool_lit(*v);
            Ok(cg.call(Builtin::BoolToSql, vec![lit]))
        }
        other => Err(CompileError::Unsupported(format!("predicate conjunct {}", other))),
    }
}

/// Lower a value-producing plan expression into a SQL value expression.
pub fn translate_value(cg: &mut CodeGen, expr: &PlanExpr, child: &OutputSource) -> Result<ExprId, CompileError> {
    match expr {
        PlanExpr::ColumnRef { attr_idx, .. } => child.expr(cg, *attr_idx),
        PlanExpr::IntLiteral(v) => {
            let lit = cg.int_lit(*v);
            Ok(cg.call(Builtin::IntToSql, vec![lit]))
        }
        PlanExpr::FloatLiteral(v) => {
            let lit = cg.float_lit(*v as f32);
            Ok(cg.call(Builtin::FloatToSql, vec![lit]))
        }
        PlanExpr::BoolLiteral(v) => {
            let lit = cg.bool_lit(*v);
            Ok(cg.call(Builtin::BoolToSql, vec![lit]))
        }
        other => Err(CompileError::Unsupported(format!("value expression {}", other))),
    }
}
