// Database Handle
//
// Typed accessor over pg_database; the root of cross-handle navigation.

use std::sync::Arc;

use crate::common::types::DbOid;
use crate::sql::SqlValue;
use crate::transaction::Transaction;

use super::attribute_handle::AttributeHandle;
use super::catalog::Catalog;
use super::entry::{CatalogEntry, CatalogTable};
use super::index_handle::IndexHandle;
use super::namespace_handle::NamespaceHandle;

pub type DatabaseEntry = CatalogEntry<DbOid>;

pub struct DatabaseHandle {
    catalog: Arc<Catalog>,
    db_oid: DbOid,
}

impl DatabaseHandle {
    pub(crate) fn new(catalog: Arc<Catalog>, db_oid: DbOid) -> Self {
        Self { catalog, db_oid }
    }

    pub fn oid(&self) -> DbOid {
        self.db_oid
    }

    /// Look up a database row by oid (column 0).
    pub fn get_database_entry(&self, txn: &Transaction, oid: DbOid) -> Option<DatabaseEntry> {
        let table = CatalogTable::new(self.catalog.pg_database().clone());
        let (slot, row) = table.find_row(txn, 0, &SqlValue::integer(oid.0 as i64))?;
        Some(DatabaseEntry::new(oid, slot, row))
    }

    /// Look up a database row by name.
    pub fn get_database_entry_by_name(&self, txn: &Transaction, name: &str) -> Option<DatabaseEntry> {
        let oid = self.catalog.database_oid_by_name(name)?;
        self.get_database_entry(txn, oid)
    }

    pub fn get_namespace_handle(&self, db_oid: DbOid) -> Option<NamespaceHandle> {
        let db_catalog = self.catalog.database_catalog(db_oid).ok()?;
        Some(NamespaceHandle::new(self.catalog.clone(), db_oid, db_catalog))
    }

    pub fn get_attribute_handle(&self, db_oid: DbOid) -> Option<AttributeHandle> {
        let db_catalog = self.catalog.database_catalog(db_oid).ok()?;
        Some(AttributeHandle::new(db_catalog))
    }

    pub fn get_index_handle(&self, db_oid: DbOid) -> Option<IndexHandle> {
        let db_catalog = self.catalog.database_catalog(db_oid).ok()?;
        Some(IndexHandle::new(self.catalog.clone(), db_catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog::{col, DEFAULT_DATABASE_NAME_OID, DEFAULT_DATABASE_OID};
    use crate::transaction::TransactionManager;

    #[test]
    fn test_default_database_lookup() {
        let tm = Arc::new(TransactionManager::new());
        let catalog = Catalog::new(tm.clone());
        let txn = tm.begin();

        let handle = catalog.get_database(DEFAULT_DATABASE_OID);
        let entry = handle.get_database_entry(&txn, DEFAULT_DATABASE_OID).unwrap();
        assert_eq!(entry.get_value(col::DATOID).unwrap().as_integer(), Some(828));
        assert_eq!(
            entry.get_value(col::DATNAME).unwrap().as_integer(),
            Some(DEFAULT_DATABASE_NAME_OID)
        );
        tm.commit(&txn);
    }

    #[test]
    fn test_missing_database_entry() {
        let tm = Arc::new(TransactionManager::new());
        let catalog = Catalog::new(tm.clone());
        let txn = tm.begin();
        let handle = catalog.get_database(DEFAULT_DATABASE_OID);
        assert!(handle.get_database_entry(&txn, DbOid(999)).is_none());
        tm.commit(&txn);
    }
}
