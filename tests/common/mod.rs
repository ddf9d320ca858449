use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use opaldb::catalog::{Catalog, DEFAULT_DATABASE_OID, PUBLIC_NAMESPACE_OID};
use opaldb::checker::{OutputChecker, OutputStore};
use opaldb::common::types::TableOid;
use opaldb::exec::interp::execute_query;
use opaldb::exec::ExecutionContext;
use opaldb::plan::PhysicalPlan;
use opaldb::sql::{SqlTypeId, SqlValue};
use opaldb::storage::SqlTable;
use opaldb::transaction::TransactionManager;

/// One in-memory engine instance shared by a test.
pub struct TestDb {
    pub tm: Arc<TransactionManager>,
    pub catalog: Arc<Catalog>,
}

#[allow(dead_code)]
pub fn setup_engine() -> TestDb {
    let tm = Arc::new(TransactionManager::new());
    let catalog = Catalog::new(tm.clone());
    TestDb { tm, catalog }
}

/// Create a user table of integer columns and load one row per entry of
/// `rows`.
#[allow(dead_code)]
pub fn load_int_table(db: &TestDb, name: &str, columns: &[&str], rows: &[Vec<i64>]) -> Result<(TableOid, Arc<SqlTable>)> {
    let txn = db.tm.begin();
    let table = db
        .catalog
        .create_user_table(
            &txn,
            DEFAULT_DATABASE_OID,
            PUBLIC_NAMESPACE_OID,
            name,
            columns.iter().map(|c| (c.to_string(), SqlTypeId::Integer)).collect(),
        )
        .map_err(|e| anyhow!("create table failed: {}", e))?;
    for row in rows {
        table.insert(&txn, row.iter().map(|&v| SqlValue::integer(v)).collect());
    }
    db.tm.commit(&txn);
    Ok((table.oid(), table))
}

/// Compile `plan`, run it through the interpreter, and validate the output
/// with `checker`.
#[allow(dead_code)]
pub fn run_plan_with_checker(
    db: &TestDb,
    plan: &PhysicalPlan,
    checker: Rc<RefCell<dyn OutputChecker>>,
) -> Result<()> {
    let query = opaldb::compile(plan).map_err(|e| anyhow!("compilation failed: {}", e))?;
    let store = OutputStore::new(checker, plan.schema());
    let txn = Arc::new(db.tm.begin());
    let ctx = ExecutionContext::new(
        db.catalog.clone(),
        DEFAULT_DATABASE_OID,
        PUBLIC_NAMESPACE_OID,
        txn.clone(),
        Some(plan.schema()),
        Some(store.callback()),
    );
    execute_query(&query, &ctx)?;
    drop(ctx);
    db.tm.commit(&txn);
    store.check_correctness()?;
    Ok(())
}
