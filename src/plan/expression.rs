// Plan Expressions
//
// The expression language physical plans carry: column references into child
// output, literals, comparisons, and conjunctions.

use std::fmt;

use crate::sql::SqlTypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PlanExpr {
    /// Attribute of a child's output row.
    ColumnRef {
        child: usize,
        attr_idx: usize,
        type_id: SqlTypeId,
    },
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    Compare {
        op: CompareOp,
        left: Box<PlanExpr>,
        right: Box<PlanExpr>,
    },
    And(Vec<PlanExpr>),
}

impl PlanExpr {
    pub fn column(attr_idx: usize, type_id: SqlTypeId) -> Self {
        PlanExpr::ColumnRef { child: 0, attr_idx, type_id }
    }

    pub fn compare(op: CompareOp, left: PlanExpr, right: PlanExpr) -> Self {
        PlanExpr::Compare { op, left: Box::new(left), right: Box::new(right) }
    }

    /// Flatten a conjunction into its conjuncts; a non-conjunction is its own
    /// single conjunct.
    pub fn conjuncts(&self) -> Vec<&PlanExpr> {
        match self {
            PlanExpr::And(parts) => parts.iter().flat_map(|p| p.conjuncts()).collect(),
            other => vec![other],
        }
    }

    /// A conjunct is vectorizable when it compares a column reference with a
    /// constant literal using a plain comparison operator.
    pub fn is_vectorizable(&self) -> bool {
        match self {
            PlanExpr::Compare { left, right, .. } => {
                matches!(&**left, PlanExpr::ColumnRef { .. })
                    && matches!(&**right, PlanExpr::IntLiteral(_) | PlanExpr::FloatLiteral(_))
            }
            _ => false,
        }
    }
}

impl fmt::Display for PlanExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanExpr::ColumnRef { child, attr_idx, .. } => write!(f, "#{}:{}", child, attr_idx),
            PlanExpr::IntLiteral(v) => write!(f, "{}", v),
            PlanExpr::FloatLiteral(v) => write!(f, "{}", v),
            PlanExpr::BoolLiteral(v) => write!(f, "{}", v),
            PlanExpr::StringLiteral(v) => write!(f, "'{}'", v),
            PlanExpr::Compare { op, left, right } => write!(f, "{} {} {}", left, op, right),
            PlanExpr::And(parts) => {
                let joined = parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(" AND ");
                write!(f, "({})", joined)
            }
        }
    }
}

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AggKind {
    CountStar,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggKind::CountStar => "COUNT(*)",
            AggKind::Count => "COUNT",
            AggKind::Sum => "SUM",
            AggKind::Avg => "AVG",
            AggKind::Min => "MIN",
            AggKind::Max => "MAX",
        };
        write!(f, "{}", s)
    }
}

/// One aggregate in an aggregation node: the function plus the input
/// attribute it consumes (none for COUNT(*)).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AggregateExpr {
    pub kind: AggKind,
    pub arg: Option<(usize, SqlTypeId)>,
}

impl AggregateExpr {
    pub fn count_star() -> Self {
        Self { kind: AggKind::CountStar, arg: None }
    }

    pub fn new(kind: AggKind, attr_idx: usize, type_id: SqlTypeId) -> Self {
        Self { kind, arg: Some((attr_idx, type_id)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conjunct_flattening() {
        let expr = PlanExpr::And(vec![
            PlanExpr::compare(
                CompareOp::Eq,
                PlanExpr::column(0, SqlTypeId::Integer),
                PlanExpr::IntLiteral(500),
            ),
            PlanExpr::And(vec![PlanExpr::BoolLiteral(true), PlanExpr::BoolLiteral(false)]),
        ]);
        assert_eq!(expr.conjuncts().len(), 3);
    }

    #[test]
    fn test_vectorizable_classification() {
        let vectorizable = PlanExpr::compare(
            CompareOp::Eq,
            PlanExpr::column(0, SqlTypeId::Integer),
            PlanExpr::IntLiteral(500),
        );
        assert!(vectorizable.is_vectorizable());

        let col_col = PlanExpr::compare(
            CompareOp::Eq,
            PlanExpr::column(0, SqlTypeId::Integer),
            PlanExpr::column(1, SqlTypeId::Integer),
        );
        assert!(!col_col.is_vectorizable());
        assert!(!PlanExpr::BoolLiteral(true).is_vectorizable());
    }
}
