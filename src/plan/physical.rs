// Physical Query Plan Representation
//
// Immutable operator trees handed to the compiler. Every node owns its
// children and its output schema.

use std::fmt;

use crate::plan::expression::{AggregateExpr, PlanExpr};
use crate::plan::schema::OutputSchema;

/// Direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Optional execution hints for a sort node.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SortHints {
    pub top_k: Option<u64>,
    pub parallel: bool,
}

/// A node in the physical query plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalPlan {
    /// Full table scan, optionally with a pushed-down predicate
    SeqScan {
        table_name: String,
        predicate: Option<PlanExpr>,
        schema: OutputSchema,
    },
    /// Point lookup through an index
    IndexScan {
        table_name: String,
        index_name: String,
        /// Scan-key equality predicate, one literal per key column
        key: Vec<PlanExpr>,
        schema: OutputSchema,
    },
    /// Row filter
    Filter {
        input: Box<PhysicalPlan>,
        predicate: PlanExpr,
        schema: OutputSchema,
    },
    /// Column reordering / pruning
    Projection {
        input: Box<PhysicalPlan>,
        columns: Vec<usize>,
        schema: OutputSchema,
    },
    /// Hash join; the left child is the build side
    HashJoin {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        build_keys: Vec<usize>,
        probe_keys: Vec<usize>,
        schema: OutputSchema,
    },
    /// Hash aggregation
    Aggregate {
        input: Box<PhysicalPlan>,
        group_by: Vec<usize>,
        aggregates: Vec<AggregateExpr>,
        schema: OutputSchema,
    },
    /// Sort (ORDER BY)
    Sort {
        input: Box<PhysicalPlan>,
        keys: Vec<(usize, SortDirection)>,
        hints: SortHints,
        schema: OutputSchema,
    },
}

impl PhysicalPlan {
    pub fn schema(&self) -> &OutputSchema {
        match self {
            PhysicalPlan::SeqScan { schema, .. }
            | PhysicalPlan::IndexScan { schema, .. }
            | PhysicalPlan::Filter { schema, .. }
            | PhysicalPlan::Projection { schema, .. }
            | PhysicalPlan::HashJoin { schema, .. }
            | PhysicalPlan::Aggregate { schema, .. }
            | PhysicalPlan::Sort { schema, .. } => schema,
        }
    }

    pub fn children(&self) -> Vec<&PhysicalPlan> {
        match self {
            PhysicalPlan::SeqScan { .. } | PhysicalPlan::IndexScan { .. } => vec![],
            PhysicalPlan::Filter { input, .. }
            | PhysicalPlan::Projection { input, .. }
            | PhysicalPlan::Aggregate { input, .. }
            | PhysicalPlan::Sort { input, .. } => vec![input.as_ref()],
            PhysicalPlan::HashJoin { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        }
    }

    /// Whether this node must fully materialize its input before producing
    /// output.
    pub fn is_pipeline_breaker(&self) -> bool {
        matches!(
            self,
            PhysicalPlan::HashJoin { .. } | PhysicalPlan::Aggregate { .. } | PhysicalPlan::Sort { .. }
        )
    }
}

impl fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalPlan::SeqScan { table_name, predicate, .. } => {
                if let Some(p) = predicate {
                    write!(f, "SeqScan: {} WHERE {}", table_name, p)
                } else {
                    write!(f, "SeqScan: {}", table_name)
                }
            }
            PhysicalPlan::IndexScan { table_name, index_name, .. } => {
                write!(f, "IndexScan: {} USING {}", table_name, index_name)
            }
            PhysicalPlan::Filter { input, predicate, .. } => {
                write!(f, "Filter: {}\n  {}", predicate, input)
            }
            PhysicalPlan::Projection { input, columns, .. } => {
                let cols = columns.iter().map(|c| format!("#{}", c)).collect::<Vec<_>>().join(", ");
                write!(f, "Projection: {}\n  {}", cols, input)
            }
            PhysicalPlan::HashJoin { left, right, build_keys, probe_keys, .. } => {
                write!(
                    f,
                    "HashJoin: build {:?} = probe {:?}\n  Left: {}\n  Right: {}",
                    build_keys, probe_keys, left, right
                )
            }
            PhysicalPlan::Aggregate { input, group_by, aggregates, .. } => {
                let aggs = aggregates.iter().map(|a| a.kind.to_string()).collect::<Vec<_>>().join(", ");
                write!(f, "Aggregate: [{}] GROUP BY {:?}\n  {}", aggs, group_by, input)
            }
            PhysicalPlan::Sort { input, keys, hints, .. } => {
                let keys = keys
                    .iter()
                    .map(|(idx, dir)| {
                        format!("#{} {}", idx, if *dir == SortDirection::Descending { "DESC" } else { "ASC" })
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Some(k) = hints.top_k {
                    write!(f, "Sort: [{}] LIMIT {}\n  {}", keys, k, input)
                } else {
                    write!(f, "Sort: [{}]\n  {}", keys, input)
                }
            }
        }
    }
}
