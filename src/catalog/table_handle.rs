// Table Handle
//
// Typed accessor over pg_class, scoped to one namespace.

use std::sync::Arc;

use crate::common::types::{DbOid, NamespaceOid, TableOid};
use crate::sql::{SqlTypeId, SqlValue};
use crate::storage::SqlTable;
use crate::transaction::Transaction;

use super::catalog::{Catalog, CatalogResult};
use super::entry::{CatalogEntry, CatalogTable};

pub type TableEntry = CatalogEntry<TableOid>;

pub struct TableHandle {
    catalog: Arc<Catalog>,
    db_oid: DbOid,
    ns_oid: NamespaceOid,
    pg_class: CatalogTable,
    // Retained for cross-checks; the handle is composed from the triple.
    _pg_namespace: CatalogTable,
    _pg_tablespace: CatalogTable,
}

impl TableHandle {
    pub(crate) fn new(
        catalog: Arc<Catalog>,
        db_oid: DbOid,
        ns_oid: NamespaceOid,
        pg_class: Arc<SqlTable>,
        pg_namespace: Arc<SqlTable>,
        pg_tablespace: Arc<SqlTable>,
    ) -> Self {
        Self {
            catalog,
            db_oid,
            ns_oid,
            pg_class: CatalogTable::new(pg_class),
            _pg_namespace: CatalogTable::new(pg_namespace),
            _pg_tablespace: CatalogTable::new(pg_tablespace),
        }
    }

    /// Look up a class row by oid (column 0).
    pub fn get_table_entry(&self, txn: &Transaction, oid: TableOid) -> Option<TableEntry> {
        let (slot, row) = self.pg_class.find_row(txn, 0, &SqlValue::integer(oid.0 as i64))?;
        Some(TableEntry::new(oid, slot, row))
    }

    /// Look up a class row by name (column 1).
    pub fn get_table_entry_by_name(&self, txn: &Transaction, name: &str) -> Option<TableEntry> {
        let (slot, row) = self.pg_class.find_row(txn, 1, &SqlValue::string(name))?;
        let oid = TableOid(row.get_by_index(0).as_integer()? as u32);
        Some(TableEntry::new(oid, slot, row))
    }

    pub fn table_exists(&self, txn: &Transaction, name: &str) -> bool {
        self.get_table_entry_by_name(txn, name).is_some()
    }

    /// Create a user table in this namespace.
    pub fn create_table(
        &self,
        txn: &Transaction,
        name: &str,
        columns: Vec<(String, SqlTypeId)>,
    ) -> CatalogResult<Arc<SqlTable>> {
        self.catalog.create_user_table(txn, self.db_oid, self.ns_oid, name, columns)
    }

    /// Backing row store for a table entry.
    pub fn get_sql_table(&self, txn: &Transaction, oid: TableOid) -> Option<Arc<SqlTable>> {
        self.catalog.get_user_table(txn, self.db_oid, self.ns_oid, oid)
    }
}
