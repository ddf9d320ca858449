// Online index build protocol: the two-transaction dance with quiescence
// waiting. Old snapshots never observe the new entry; transactions starting
// after the build commit observe its final validity.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use common::{load_int_table, setup_engine};
use opaldb::catalog::{CatalogError, DEFAULT_DATABASE_OID, PUBLIC_NAMESPACE_OID};
use opaldb::common::types::{IndexId, IndexOid, TableOid};
use opaldb::ddl::IndexManager;

#[test]
fn test_online_build_under_long_running_transaction() -> Result<()> {
    let db = setup_engine();
    let rows: Vec<Vec<i64>> = (0..500).map(|i| vec![i]).collect();
    let (table_oid, table) = load_int_table(&db, "build_t", &["k"], &rows)?;

    // A long-running transaction predating the index build.
    let old_txn = db.tm.begin();

    let manager = IndexManager::new();
    let tm = db.tm.clone();
    let catalog = db.catalog.clone();
    let builder = {
        let manager = manager.clone();
        thread::spawn(move || {
            manager.create_concurrently(
                DEFAULT_DATABASE_OID,
                PUBLIC_NAMESPACE_OID,
                table_oid,
                false,
                "build_t_k",
                &["k".to_string()],
                &tm,
                &catalog,
            )
        })
    };

    // Give T1 time to commit; the coordinator is now parked on the
    // quiescence barrier because old_txn is still active.
    thread::sleep(Duration::from_millis(50));
    assert!(!builder.is_finished(), "build must wait for the old snapshot");

    // The old snapshot must not observe the entry T1 published.
    let db_handle = db.catalog.get_database(DEFAULT_DATABASE_OID);
    let index_handle = db_handle.get_index_handle(DEFAULT_DATABASE_OID).unwrap();
    assert!(index_handle.get_index_entry_for_table(&old_txn, table_oid).is_none());

    // Ending the old transaction releases the barrier.
    db.tm.commit(&old_txn);
    let index_oid = builder.join().unwrap().map_err(|e| anyhow::anyhow!("{}", e))?;

    // A transaction starting after T2's commit sees a usable index.
    let new_txn = db.tm.begin();
    let entry = index_handle.get_index_entry(&new_txn, index_oid).unwrap();
    assert_eq!(entry.get_bool("indisvalid"), Some(true));
    assert_eq!(entry.get_bool("indisready"), Some(false));
    assert_eq!(entry.get_bool("indislive"), Some(false));
    assert_eq!(entry.get_bool("indisunique"), Some(false));
    db.tm.commit(&new_txn);

    // Populate preserved the source row count.
    let index = db.catalog.get_index_object(index_oid).unwrap();
    assert_eq!(index.key_count(), table.slot_count());

    // The build flag is clear and the generation advanced exactly once.
    let index_id = IndexId::new(DEFAULT_DATABASE_OID, PUBLIC_NAMESPACE_OID, index_oid);
    assert!(!manager.is_building(index_id));
    assert_eq!(manager.build_generation(index_id), 1);
    Ok(())
}

#[test]
fn test_unique_violation_leaves_entry_invalid() -> Result<()> {
    let db = setup_engine();
    // Duplicate key values guarantee a uniqueness violation.
    let rows = vec![vec![7], vec![7], vec![8]];
    let (table_oid, _) = load_int_table(&db, "dup_t", &["k"], &rows)?;

    let manager = IndexManager::new();
    let index_oid = manager
        .create_concurrently(
            DEFAULT_DATABASE_OID,
            PUBLIC_NAMESPACE_OID,
            table_oid,
            true,
            "dup_t_k",
            &["k".to_string()],
            &db.tm,
            &db.catalog,
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let txn = db.tm.begin();
    let db_handle = db.catalog.get_database(DEFAULT_DATABASE_OID);
    let index_handle = db_handle.get_index_handle(DEFAULT_DATABASE_OID).unwrap();
    let entry = index_handle.get_index_entry(&txn, index_oid).unwrap();
    assert_eq!(entry.get_bool("indisvalid"), Some(false));
    assert_eq!(entry.get_bool("indisunique"), Some(true));
    db.tm.commit(&txn);
    Ok(())
}

#[test]
fn test_missing_table_aborts_without_partial_state() {
    let db = setup_engine();
    let manager = IndexManager::new();
    let result = manager.create_concurrently(
        DEFAULT_DATABASE_OID,
        PUBLIC_NAMESPACE_OID,
        TableOid(4242),
        false,
        "ghost_idx",
        &["k".to_string()],
        &db.tm,
        &db.catalog,
    );
    assert!(matches!(result, Err(CatalogError::TableNotFound(_))));

    // Nothing leaked into the catalog and no transaction stayed active.
    let txn = db.tm.begin();
    let db_handle = db.catalog.get_database(DEFAULT_DATABASE_OID);
    let index_handle = db_handle.get_index_handle(DEFAULT_DATABASE_OID).unwrap();
    assert!(index_handle.get_index_entry_for_table(&txn, TableOid(4242)).is_none());
    db.tm.commit(&txn);
    assert_eq!(db.tm.active_count(), 0);
}

#[test]
fn test_drop_deletes_entry_and_destroys_object() -> Result<()> {
    let db = setup_engine();
    let rows: Vec<Vec<i64>> = (0..10).map(|i| vec![i]).collect();
    let (table_oid, _) = load_int_table(&db, "drop_t", &["k"], &rows)?;

    let manager = IndexManager::new();
    let index_oid = manager
        .create_concurrently(
            DEFAULT_DATABASE_OID,
            PUBLIC_NAMESPACE_OID,
            table_oid,
            false,
            "drop_t_k",
            &["k".to_string()],
            &db.tm,
            &db.catalog,
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    assert!(db.catalog.get_index_object(index_oid).is_some());

    manager
        .drop_index(DEFAULT_DATABASE_OID, PUBLIC_NAMESPACE_OID, table_oid, index_oid, &db.tm, &db.catalog)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let txn = db.tm.begin();
    let db_handle = db.catalog.get_database(DEFAULT_DATABASE_OID);
    let index_handle = db_handle.get_index_handle(DEFAULT_DATABASE_OID).unwrap();
    assert!(index_handle.get_index_entry(&txn, index_oid).is_none());
    db.tm.commit(&txn);
    assert!(db.catalog.get_index_object(index_oid).is_none());
    Ok(())
}

#[test]
fn test_drop_missing_index_aborts() {
    let db = setup_engine();
    let rows = vec![vec![1]];
    let (table_oid, _) = load_int_table(&db, "nodrop_t", &["k"], &rows).unwrap();

    let manager = IndexManager::new();
    let result = manager.drop_index(
        DEFAULT_DATABASE_OID,
        PUBLIC_NAMESPACE_OID,
        table_oid,
        IndexOid(9999),
        &db.tm,
        &db.catalog,
    );
    assert!(matches!(result, Err(CatalogError::IndexNotFound(_))));
    assert_eq!(db.tm.active_count(), 0);
}
