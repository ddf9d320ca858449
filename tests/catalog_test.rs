// Catalog handle navigation: typed entries over the pg_* tables, read under
// a transaction.

mod common;

use anyhow::Result;

use common::{load_int_table, setup_engine};
use opaldb::catalog::{col, DEFAULT_DATABASE_OID, PUBLIC_NAMESPACE_OID};
use opaldb::common::types::DbOid;
use opaldb::sql::SqlValue;

#[test]
fn test_default_database_entry() {
    let db = setup_engine();
    let txn = db.tm.begin();

    // The default database has oid 828; its datname column carries the
    // bootstrap name oid 15721.
    let handle = db.catalog.get_database(DEFAULT_DATABASE_OID);
    let entry = handle.get_database_entry(&txn, DbOid(828)).unwrap();
    assert_eq!(entry.get_value(col::DATOID).unwrap().as_integer(), Some(828));
    assert_eq!(entry.get_value(col::DATNAME).unwrap().as_integer(), Some(15721));

    assert!(handle.get_database_entry(&txn, DbOid(999)).is_none());
    db.tm.commit(&txn);
}

#[test]
fn test_namespace_to_table_navigation() -> Result<()> {
    let db = setup_engine();
    load_int_table(&db, "nav_t", &["id"], &[vec![1]])?;

    let txn = db.tm.begin();
    let db_handle = db.catalog.get_database(DEFAULT_DATABASE_OID);
    let ns_handle = db_handle.get_namespace_handle(DEFAULT_DATABASE_OID).unwrap();

    let public_ns = ns_handle.get_namespace_entry_by_name(&txn, "public").unwrap();
    assert_eq!(public_ns.oid(), PUBLIC_NAMESPACE_OID);

    let table_handle = ns_handle.get_table_handle(&txn, "public").unwrap();
    assert!(table_handle.table_exists(&txn, "nav_t"));
    let entry = table_handle.get_table_entry_by_name(&txn, "nav_t").unwrap();
    assert_eq!(entry.get_by_name("relname"), Some(&SqlValue::string("nav_t")));
    assert!(table_handle.get_sql_table(&txn, entry.oid()).is_some());

    assert!(!table_handle.table_exists(&txn, "missing"));
    db.tm.commit(&txn);
    Ok(())
}

#[test]
fn test_attribute_entries_back_key_schemas() -> Result<()> {
    let db = setup_engine();
    let (table_oid, _) = load_int_table(&db, "attr_t", &["id", "score"], &[vec![1, 2]])?;

    let txn = db.tm.begin();
    let db_handle = db.catalog.get_database(DEFAULT_DATABASE_OID);
    let attr_handle = db_handle.get_attribute_handle(DEFAULT_DATABASE_OID).unwrap();

    let id_entry = attr_handle.get_attribute_entry(&txn, table_oid, "id").unwrap();
    let score_entry = attr_handle.get_attribute_entry(&txn, table_oid, "score").unwrap();
    assert_ne!(id_entry.oid(), score_entry.oid());
    assert_eq!(id_entry.get_integer("attrelid"), Some(table_oid.0 as i64));
    assert!(id_entry.get_integer("attlen").unwrap() > 0);
    db.tm.commit(&txn);
    Ok(())
}

#[test]
fn test_table_creation_is_transactional() -> Result<()> {
    let db = setup_engine();
    let txn = db.tm.begin();
    db.catalog
        .create_user_table(
            &txn,
            DEFAULT_DATABASE_OID,
            PUBLIC_NAMESPACE_OID,
            "tmp_t",
            vec![("id".to_string(), opaldb::sql::SqlTypeId::Integer)],
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    // A concurrent snapshot does not see the uncommitted pg_class row.
    let other = db.tm.begin();
    let db_handle = db.catalog.get_database(DEFAULT_DATABASE_OID);
    let ns_handle = db_handle.get_namespace_handle(DEFAULT_DATABASE_OID).unwrap();
    let tables = ns_handle.get_table_handle(&other, "public").unwrap();
    assert!(!tables.table_exists(&other, "tmp_t"));
    db.tm.commit(&other);

    db.tm.commit(&txn);
    let later = db.tm.begin();
    let tables = ns_handle.get_table_handle(&later, "public").unwrap();
    assert!(tables.table_exists(&later, "tmp_t"));
    db.tm.commit(&later);
    Ok(())
}
