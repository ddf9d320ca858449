// End-to-end execution: plans compile to the DSL, pass semantic analysis,
// and run through the interpreter; output checkers validate the batches the
// output buffer flushes.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use common::{load_int_table, run_plan_with_checker, setup_engine};
use opaldb::catalog::{DEFAULT_DATABASE_OID, PUBLIC_NAMESPACE_OID};
use opaldb::checker::{MultiChecker, NumChecker, SingleIntComparisonChecker, SingleIntJoinChecker, SingleIntSortChecker, SingleIntSumChecker};
use opaldb::ddl::IndexManager;
use opaldb::exec::interp::execute_query;
use opaldb::exec::ExecutionContext;
use opaldb::plan::{AggregateExpr, CompareOp, OutputColumn, OutputSchema, PhysicalPlan, PlanExpr, SortDirection, SortHints};
use opaldb::sql::SqlTypeId;

fn int_schema(names: &[&str]) -> OutputSchema {
    OutputSchema::new(names.iter().map(|n| OutputColumn::new(*n, SqlTypeId::Integer)).collect())
}

#[test]
fn test_seq_scan_with_constant_filter() -> Result<()> {
    let db = setup_engine();
    let rows: Vec<Vec<i64>> = (0..1000).map(|i| vec![i]).collect();
    load_int_table(&db, "test_1", &["col0"], &rows)?;

    // The col0 = 500 conjunct is vectorizable, so it runs through the filter
    // manager rather than a scalar guard.
    let plan = PhysicalPlan::SeqScan {
        table_name: "test_1".to_string(),
        predicate: Some(PlanExpr::compare(
            CompareOp::Eq,
            PlanExpr::column(0, SqlTypeId::Integer),
            PlanExpr::IntLiteral(500),
        )),
        schema: int_schema(&["col0"]),
    };

    let checker = Rc::new(RefCell::new(MultiChecker::new(vec![
        Box::new(NumChecker::new(1)),
        Box::new(SingleIntComparisonChecker::new(|a, b| a == b, 0, 500)),
    ])));
    run_plan_with_checker(&db, &plan, checker)
}

#[test]
fn test_filter_operator_above_scan() -> Result<()> {
    let db = setup_engine();
    let rows: Vec<Vec<i64>> = (0..100).map(|i| vec![i]).collect();
    load_int_table(&db, "test_2", &["col0"], &rows)?;

    let scan = PhysicalPlan::SeqScan {
        table_name: "test_2".to_string(),
        predicate: None,
        schema: int_schema(&["col0"]),
    };
    let plan = PhysicalPlan::Filter {
        input: Box::new(scan),
        predicate: PlanExpr::And(vec![
            PlanExpr::compare(CompareOp::Ge, PlanExpr::column(0, SqlTypeId::Integer), PlanExpr::IntLiteral(90)),
            PlanExpr::compare(CompareOp::Lt, PlanExpr::column(0, SqlTypeId::Integer), PlanExpr::IntLiteral(95)),
        ]),
        schema: int_schema(&["col0"]),
    };

    let checker = Rc::new(RefCell::new(MultiChecker::new(vec![
        Box::new(NumChecker::new(5)),
        Box::new(SingleIntComparisonChecker::new(|a, b| a >= b, 0, 90)),
    ])));
    run_plan_with_checker(&db, &plan, checker)
}

#[test]
fn test_hash_join_equality() -> Result<()> {
    let db = setup_engine();
    let rows: Vec<Vec<i64>> = (0..100).map(|i| vec![i]).collect();
    load_int_table(&db, "join_l", &["a"], &rows)?;
    load_int_table(&db, "join_r", &["a"], &rows)?;

    let left = PhysicalPlan::SeqScan {
        table_name: "join_l".to_string(),
        predicate: None,
        schema: int_schema(&["a"]),
    };
    let right = PhysicalPlan::SeqScan {
        table_name: "join_r".to_string(),
        predicate: None,
        schema: int_schema(&["a"]),
    };
    let plan = PhysicalPlan::HashJoin {
        left: Box::new(left),
        right: Box::new(right),
        build_keys: vec![0],
        probe_keys: vec![0],
        schema: int_schema(&["left_a", "right_a"]),
    };

    let checker = Rc::new(RefCell::new(MultiChecker::new(vec![
        Box::new(NumChecker::new(100)),
        Box::new(SingleIntJoinChecker::new(0, 1)),
    ])));
    run_plan_with_checker(&db, &plan, checker)
}

#[test]
fn test_sort_ascending_over_shuffled_input() -> Result<()> {
    let db = setup_engine();
    let mut values: Vec<i64> = (0..10_000).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(15721);
    values.shuffle(&mut rng);
    let rows: Vec<Vec<i64>> = values.into_iter().map(|v| vec![v]).collect();
    load_int_table(&db, "sort_t", &["col0"], &rows)?;

    let scan = PhysicalPlan::SeqScan {
        table_name: "sort_t".to_string(),
        predicate: None,
        schema: int_schema(&["col0"]),
    };
    let plan = PhysicalPlan::Sort {
        input: Box::new(scan),
        keys: vec![(0, SortDirection::Ascending)],
        hints: SortHints::default(),
        schema: int_schema(&["col0"]),
    };

    let checker = Rc::new(RefCell::new(MultiChecker::new(vec![
        Box::new(NumChecker::new(10_000)),
        Box::new(SingleIntSortChecker::new(0)),
    ])));
    run_plan_with_checker(&db, &plan, checker)
}

#[test]
fn test_aggregation_sum() -> Result<()> {
    let db = setup_engine();
    let rows: Vec<Vec<i64>> = (1..=1000).map(|i| vec![i]).collect();
    load_int_table(&db, "agg_t", &["col0"], &rows)?;

    let scan = PhysicalPlan::SeqScan {
        table_name: "agg_t".to_string(),
        predicate: None,
        schema: int_schema(&["col0"]),
    };
    let plan = PhysicalPlan::Aggregate {
        input: Box::new(scan),
        group_by: vec![],
        aggregates: vec![AggregateExpr::new(opaldb::plan::AggKind::Sum, 0, SqlTypeId::Integer)],
        schema: int_schema(&["sum_col0"]),
    };

    let checker = Rc::new(RefCell::new(MultiChecker::new(vec![
        Box::new(NumChecker::new(1)),
        Box::new(SingleIntSumChecker::new(0, 500_500)),
    ])));
    run_plan_with_checker(&db, &plan, checker)
}

#[test]
fn test_grouped_aggregation_counts() -> Result<()> {
    let db = setup_engine();
    // Ten rows per group key in {0, 1, 2}.
    let rows: Vec<Vec<i64>> = (0..30).map(|i| vec![i % 3]).collect();
    load_int_table(&db, "group_t", &["g"], &rows)?;

    let scan = PhysicalPlan::SeqScan {
        table_name: "group_t".to_string(),
        predicate: None,
        schema: int_schema(&["g"]),
    };
    let plan = PhysicalPlan::Aggregate {
        input: Box::new(scan),
        group_by: vec![0],
        aggregates: vec![AggregateExpr::count_star()],
        schema: int_schema(&["g", "count"]),
    };

    let checker = Rc::new(RefCell::new(MultiChecker::new(vec![
        Box::new(NumChecker::new(3)),
        Box::new(SingleIntComparisonChecker::new(|a, b| a == b, 1, 10)),
    ])));
    run_plan_with_checker(&db, &plan, checker)
}

#[test]
fn test_projection_reorders_columns() -> Result<()> {
    let db = setup_engine();
    let rows: Vec<Vec<i64>> = (0..10).map(|i| vec![i, i * 100]).collect();
    load_int_table(&db, "proj_t", &["a", "b"], &rows)?;

    let scan = PhysicalPlan::SeqScan {
        table_name: "proj_t".to_string(),
        predicate: None,
        schema: int_schema(&["a", "b"]),
    };
    let plan = PhysicalPlan::Projection {
        input: Box::new(scan),
        columns: vec![1],
        schema: int_schema(&["b"]),
    };

    let checker = Rc::new(RefCell::new(MultiChecker::new(vec![
        Box::new(NumChecker::new(10)),
        Box::new(SingleIntComparisonChecker::new(|a, _| a % 100 == 0, 0, 0)),
    ])));
    run_plan_with_checker(&db, &plan, checker)
}

#[test]
fn test_index_scan_point_lookup() -> Result<()> {
    let db = setup_engine();
    let rows: Vec<Vec<i64>> = (0..100).map(|i| vec![i, i * 10]).collect();
    let (table_oid, _) = load_int_table(&db, "idx_t", &["k", "v"], &rows)?;

    let manager = IndexManager::new();
    manager
        .create_concurrently(
            DEFAULT_DATABASE_OID,
            PUBLIC_NAMESPACE_OID,
            table_oid,
            false,
            "idx_t_k",
            &["k".to_string()],
            &db.tm,
            &db.catalog,
        )
        .map_err(|e| anyhow::anyhow!("create index failed: {}", e))?;

    let plan = PhysicalPlan::IndexScan {
        table_name: "idx_t".to_string(),
        index_name: "idx_t_k".to_string(),
        key: vec![PlanExpr::IntLiteral(42)],
        schema: int_schema(&["k", "v"]),
    };

    let checker = Rc::new(RefCell::new(MultiChecker::new(vec![
        Box::new(NumChecker::new(1)),
        Box::new(SingleIntComparisonChecker::new(|a, b| a == b, 0, 42)),
        Box::new(SingleIntComparisonChecker::new(|a, b| a == b, 1, 420)),
    ])));
    run_plan_with_checker(&db, &plan, checker)
}

#[test]
fn test_cancellation_aborts_execution() -> Result<()> {
    let db = setup_engine();
    let rows: Vec<Vec<i64>> = (0..10).map(|i| vec![i]).collect();
    load_int_table(&db, "cancel_t", &["col0"], &rows)?;

    let plan = PhysicalPlan::SeqScan {
        table_name: "cancel_t".to_string(),
        predicate: None,
        schema: int_schema(&["col0"]),
    };
    let query = opaldb::compile(&plan).map_err(|e| anyhow::anyhow!("{}", e))?;

    let txn = Arc::new(db.tm.begin());
    let ctx = ExecutionContext::new(
        db.catalog.clone(),
        DEFAULT_DATABASE_OID,
        PUBLIC_NAMESPACE_OID,
        txn.clone(),
        Some(plan.schema()),
        Some(Box::new(|_, _, _| {})),
    );
    ctx.cancel();
    let result = execute_query(&query, &ctx);
    assert!(matches!(result, Err(opaldb::exec::ExecError::Cancelled)));
    drop(ctx);
    db.tm.commit(&txn);
    Ok(())
}

#[test]
fn test_compile_rejects_unresolvable_plans() {
    // A predicate comparing against a string has no vector getter; the
    // compiler reports the limitation instead of emitting bad code.
    let plan = PhysicalPlan::SeqScan {
        table_name: "t".to_string(),
        predicate: Some(PlanExpr::compare(
            CompareOp::Eq,
            PlanExpr::column(0, SqlTypeId::Varchar),
            PlanExpr::StringLiteral("x".to_string()),
        )),
        schema: OutputSchema::new(vec![OutputColumn::new("s", SqlTypeId::Varchar)]),
    };
    assert!(opaldb::compile(&plan).is_err());
}
