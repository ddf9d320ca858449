// Catalog Core
//
// Owns the pg_* tables, the oid allocator, and the registries for user
// tables and physical index objects. Handles borrow from here; rows are
// read under the caller's transaction and never cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::common::types::{ColOid, DbOid, IndexOid, NamespaceOid, TableOid};
use crate::sql::{SqlTypeId, SqlValue};
use crate::storage::{ColumnSpec, Index, SqlTable};
use crate::transaction::{Transaction, TransactionManager};

use super::database_handle::DatabaseHandle;

/// The default database installed at bootstrap.
pub const DEFAULT_DATABASE_OID: DbOid = DbOid(828);
/// Name-oid stored in the default database's datname column.
pub const DEFAULT_DATABASE_NAME_OID: i64 = 15721;
/// The namespace user tables land in.
pub const PUBLIC_NAMESPACE_OID: NamespaceOid = NamespaceOid(1002);
pub const CATALOG_NAMESPACE_OID: NamespaceOid = NamespaceOid(1001);
pub const DEFAULT_TABLESPACE_OID: u32 = 1101;

// Column oids of the catalog tables. Column 0 is always the object oid and
// column 1 the name.
pub mod col {
    use crate::common::types::ColOid;

    pub const DATOID: ColOid = ColOid(5001);
    pub const DATNAME: ColOid = ColOid(5002);

    pub const NSPOID: ColOid = ColOid(5101);
    pub const NSPNAME: ColOid = ColOid(5102);

    pub const SPCOID: ColOid = ColOid(5201);
    pub const SPCNAME: ColOid = ColOid(5202);

    pub const RELOID: ColOid = ColOid(5301);
    pub const RELNAME: ColOid = ColOid(5302);
    pub const RELNAMESPACE: ColOid = ColOid(5303);
    pub const RELTABLESPACE: ColOid = ColOid(5304);

    pub const ATTOID: ColOid = ColOid(5401);
    pub const ATTRELID: ColOid = ColOid(5402);
    pub const ATTNAME: ColOid = ColOid(5403);
    pub const ATTTYPID: ColOid = ColOid(5404);
    pub const ATTLEN: ColOid = ColOid(5405);
    pub const ATTNOTNULL: ColOid = ColOid(5406);

    pub const INDOID: ColOid = ColOid(5501);
    pub const INDRELID: ColOid = ColOid(5502);
    pub const INDNATTS: ColOid = ColOid(5503);
    pub const INDNKEYATTS: ColOid = ColOid(5504);
    pub const INDISUNIQUE: ColOid = ColOid(5505);
    pub const INDISPRIMARY: ColOid = ColOid(5506);
    pub const INDISVALID: ColOid = ColOid(5507);
    pub const INDISREADY: ColOid = ColOid(5508);
    pub const INDISLIVE: ColOid = ColOid(5509);
    pub const INDEXPTR: ColOid = ColOid(5510);
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("database {0} not found")]
    DatabaseNotFound(DbOid),
    #[error("table {0} not found")]
    TableNotFound(TableOid),
    #[error("attribute '{0}' not found")]
    AttributeNotFound(String),
    #[error("index {0} not found")]
    IndexNotFound(IndexOid),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Per-database catalog tables.
pub struct DatabaseCatalog {
    pub pg_namespace: Arc<SqlTable>,
    pub pg_tablespace: Arc<SqlTable>,
    pub pg_class: Arc<SqlTable>,
    pub pg_attribute: Arc<SqlTable>,
    pub pg_index: Arc<SqlTable>,
}

/// The central repository of schema metadata.
pub struct Catalog {
    txn_mgr: Arc<TransactionManager>,
    next_oid: AtomicU32,
    pg_database: Arc<SqlTable>,
    databases: RwLock<HashMap<DbOid, Arc<DatabaseCatalog>>>,
    database_names: RwLock<HashMap<String, DbOid>>,
    user_tables: RwLock<HashMap<(DbOid, NamespaceOid, TableOid), Arc<SqlTable>>>,
    user_table_names: RwLock<HashMap<(DbOid, NamespaceOid, String), TableOid>>,
    index_objects: RwLock<HashMap<IndexOid, (Arc<Index>, Arc<SqlTable>)>>,
    index_names: RwLock<HashMap<String, IndexOid>>,
}

impl Catalog {
    /// Create and bootstrap a catalog: the default database, its namespaces,
    /// and its empty pg_* tables.
    pub fn new(txn_mgr: Arc<TransactionManager>) -> Arc<Self> {
        let pg_database = SqlTable::new(
            TableOid(2001),
            "pg_database",
            vec![
                ColumnSpec::new(col::DATOID, "datoid", SqlTypeId::Integer),
                ColumnSpec::new(col::DATNAME, "datname", SqlTypeId::Integer),
            ],
        );
        let catalog = Arc::new(Self {
            txn_mgr: txn_mgr.clone(),
            next_oid: AtomicU32::new(10_000),
            pg_database,
            databases: RwLock::new(HashMap::new()),
            database_names: RwLock::new(HashMap::new()),
            user_tables: RwLock::new(HashMap::new()),
            user_table_names: RwLock::new(HashMap::new()),
            index_objects: RwLock::new(HashMap::new()),
            index_names: RwLock::new(HashMap::new()),
        });
        catalog.bootstrap();
        catalog
    }

    fn bootstrap(self: &Arc<Self>) {
        log::debug!("bootstrapping catalog with default database {}", DEFAULT_DATABASE_OID);
        let txn = self.txn_mgr.begin();
        self.pg_database.insert(
            &txn,
            vec![
                SqlValue::integer(DEFAULT_DATABASE_OID.0 as i64),
                SqlValue::integer(DEFAULT_DATABASE_NAME_OID),
            ],
        );
        self.database_names.write().insert("opal".to_string(), DEFAULT_DATABASE_OID);

        let db_catalog = Self::make_database_catalog();
        db_catalog.pg_namespace.insert(
            &txn,
            vec![
                SqlValue::integer(CATALOG_NAMESPACE_OID.0 as i64),
                SqlValue::string("pg_catalog"),
            ],
        );
        db_catalog.pg_namespace.insert(
            &txn,
            vec![SqlValue::integer(PUBLIC_NAMESPACE_OID.0 as i64), SqlValue::string("public")],
        );
        db_catalog.pg_tablespace.insert(
            &txn,
            vec![SqlValue::integer(DEFAULT_TABLESPACE_OID as i64), SqlValue::string("pg_default")],
        );
        self.databases.write().insert(DEFAULT_DATABASE_OID, Arc::new(db_catalog));
        self.txn_mgr.commit(&txn);
    }

    fn make_database_catalog() -> DatabaseCatalog {
        DatabaseCatalog {
            pg_namespace: SqlTable::new(
                TableOid(2002),
                "pg_namespace",
                vec![
                    ColumnSpec::new(col::NSPOID, "nspoid", SqlTypeId::Integer),
                    ColumnSpec::new(col::NSPNAME, "nspname", SqlTypeId::Varchar),
                ],
            ),
            pg_tablespace: SqlTable::new(
                TableOid(2003),
                "pg_tablespace",
                vec![
                    ColumnSpec::new(col::SPCOID, "spcoid", SqlTypeId::Integer),
                    ColumnSpec::new(col::SPCNAME, "spcname", SqlTypeId::Varchar),
                ],
            ),
            pg_class: SqlTable::new(
                TableOid(2004),
                "pg_class",
                vec![
                    ColumnSpec::new(col::RELOID, "reloid", SqlTypeId::Integer),
                    ColumnSpec::new(col::RELNAME, "relname", SqlTypeId::Varchar),
                    ColumnSpec::new(col::RELNAMESPACE, "relnamespace", SqlTypeId::Integer),
                    ColumnSpec::new(col::RELTABLESPACE, "reltablespace", SqlTypeId::Integer),
                ],
            ),
            pg_attribute: SqlTable::new(
                TableOid(2005),
                "pg_attribute",
                vec![
                    ColumnSpec::new(col::ATTOID, "attoid", SqlTypeId::Integer),
                    ColumnSpec::new(col::ATTRELID, "attrelid", SqlTypeId::Integer),
                    ColumnSpec::new(col::ATTNAME, "attname", SqlTypeId::Varchar),
                    ColumnSpec::new(col::ATTTYPID, "atttypid", SqlTypeId::Integer),
                    ColumnSpec::new(col::ATTLEN, "attlen", SqlTypeId::Integer),
                    ColumnSpec::new(col::ATTNOTNULL, "attnotnull", SqlTypeId::Boolean),
                ],
            ),
            pg_index: SqlTable::new(
                TableOid(2006),
                "pg_index",
                vec![
                    ColumnSpec::new(col::INDOID, "indoid", SqlTypeId::Integer),
                    ColumnSpec::new(col::INDRELID, "indrelid", SqlTypeId::Integer),
                    ColumnSpec::new(col::INDNATTS, "indnatts", SqlTypeId::Integer),
                    ColumnSpec::new(col::INDNKEYATTS, "indnkeyatts", SqlTypeId::Integer),
                    ColumnSpec::new(col::INDISUNIQUE, "indisunique", SqlTypeId::Boolean),
                    ColumnSpec::new(col::INDISPRIMARY, "indisprimary", SqlTypeId::Boolean),
                    ColumnSpec::new(col::INDISVALID, "indisvalid", SqlTypeId::Boolean),
                    ColumnSpec::new(col::INDISREADY, "indisready", SqlTypeId::Boolean),
                    ColumnSpec::new(col::INDISLIVE, "indislive", SqlTypeId::Boolean),
                    ColumnSpec::new(col::INDEXPTR, "indexptr", SqlTypeId::BigInt),
                ],
            ),
        }
    }

    /// Allocate a fresh, globally unique object identifier.
    pub fn get_next_oid(&self) -> u32 {
        self.next_oid.fetch_add(1, Ordering::SeqCst)
    }

    pub fn txn_manager(&self) -> &Arc<TransactionManager> {
        &self.txn_mgr
    }

    pub fn pg_database(&self) -> &Arc<SqlTable> {
        &self.pg_database
    }

    pub fn database_catalog(&self, db_oid: DbOid) -> CatalogResult<Arc<DatabaseCatalog>> {
        self.databases
            .read()
            .get(&db_oid)
            .cloned()
            .ok_or(CatalogError::DatabaseNotFound(db_oid))
    }

    pub fn database_oid_by_name(&self, name: &str) -> Option<DbOid> {
        self.database_names.read().get(name).copied()
    }

    /// Typed accessor over pg_database.
    pub fn get_database(self: &Arc<Self>, db_oid: DbOid) -> DatabaseHandle {
        DatabaseHandle::new(Arc::clone(self), db_oid)
    }

    /// Create a user table: registers pg_class and pg_attribute rows and the
    /// backing row store.
    pub fn create_user_table(
        self: &Arc<Self>,
        txn: &Transaction,
        db_oid: DbOid,
        ns_oid: NamespaceOid,
        name: &str,
        columns: Vec<(String, SqlTypeId)>,
    ) -> CatalogResult<Arc<SqlTable>> {
        let db_catalog = self.database_catalog(db_oid)?;
        let table_oid = TableOid(self.get_next_oid());
        db_catalog.pg_class.insert(
            txn,
            vec![
                SqlValue::integer(table_oid.0 as i64),
                SqlValue::string(name),
                SqlValue::integer(ns_oid.0 as i64),
                SqlValue::integer(DEFAULT_TABLESPACE_OID as i64),
            ],
        );

        let mut specs = Vec::with_capacity(columns.len());
        for (col_name, type_id) in &columns {
            let att_oid = ColOid(self.get_next_oid());
            db_catalog.pg_attribute.insert(
                txn,
                vec![
                    SqlValue::integer(att_oid.0 as i64),
                    SqlValue::integer(table_oid.0 as i64),
                    SqlValue::string(col_name.clone()),
                    SqlValue::integer(type_id_code(*type_id)),
                    SqlValue::integer(type_id.encoded_size() as i64),
                    SqlValue::boolean(false),
                ],
            );
            specs.push(ColumnSpec::new(att_oid, col_name.clone(), *type_id));
        }

        let table = SqlTable::new(table_oid, name, specs);
        self.user_tables.write().insert((db_oid, ns_oid, table_oid), table.clone());
        self.user_table_names
            .write()
            .insert((db_oid, ns_oid, name.to_string()), table_oid);
        log::debug!("created user table '{}' ({}) in db {}", name, table_oid, db_oid);
        Ok(table)
    }

    /// Fetch a user table, checking its pg_class entry is visible to `txn`.
    pub fn get_user_table(
        &self,
        txn: &Transaction,
        db_oid: DbOid,
        ns_oid: NamespaceOid,
        table_oid: TableOid,
    ) -> Option<Arc<SqlTable>> {
        let db_catalog = self.database_catalog(db_oid).ok()?;
        let handle = super::entry::CatalogTable::new(db_catalog.pg_class.clone());
        handle.find_row(txn, 0, &SqlValue::integer(table_oid.0 as i64))?;
        self.user_tables.read().get(&(db_oid, ns_oid, table_oid)).cloned()
    }

    pub fn user_table_by_name(&self, db_oid: DbOid, ns_oid: NamespaceOid, name: &str) -> Option<(TableOid, Arc<SqlTable>)> {
        let oid = *self.user_table_names.read().get(&(db_oid, ns_oid, name.to_string()))?;
        let table = self.user_tables.read().get(&(db_oid, ns_oid, oid)).cloned()?;
        Some((oid, table))
    }

    /// Register / fetch / destroy physical index objects. Entries reference
    /// them through the indexptr column by oid.
    pub fn register_index_object(&self, name: &str, index: Arc<Index>, table: Arc<SqlTable>) {
        self.index_names.write().insert(name.to_string(), index.oid());
        self.index_objects.write().insert(index.oid(), (index, table));
    }

    pub fn get_index_object(&self, oid: IndexOid) -> Option<Arc<Index>> {
        self.index_objects.read().get(&oid).map(|(i, _)| i.clone())
    }

    pub fn destroy_index_object(&self, oid: IndexOid) -> bool {
        self.index_names.write().retain(|_, v| *v != oid);
        self.index_objects.write().remove(&oid).is_some()
    }

    /// The physical index and its base table, by registered name.
    pub fn index_by_name(&self, _db_oid: DbOid, name: &str) -> Option<(Arc<Index>, Arc<SqlTable>)> {
        let objects = self.index_objects.read();
        let names = self.index_names.read();
        names.get(name).and_then(|oid| objects.get(oid).cloned())
    }
}

/// Stable integer code persisted in atttypid.
pub fn type_id_code(type_id: SqlTypeId) -> i64 {
    match type_id {
        SqlTypeId::TinyInt => 1,
        SqlTypeId::SmallInt => 2,
        SqlTypeId::Integer => 3,
        SqlTypeId::BigInt => 4,
        SqlTypeId::Boolean => 5,
        SqlTypeId::Decimal => 6,
        SqlTypeId::Date => 7,
        SqlTypeId::Varchar => 8,
    }
}

pub fn type_id_from_code(code: i64) -> Option<SqlTypeId> {
    Some(match code {
        1 => SqlTypeId::TinyInt,
        2 => SqlTypeId::SmallInt,
        3 => SqlTypeId::Integer,
        4 => SqlTypeId::BigInt,
        5 => SqlTypeId::Boolean,
        6 => SqlTypeId::Decimal,
        7 => SqlTypeId::Date,
        8 => SqlTypeId::Varchar,
        _ => return None,
    })
}
