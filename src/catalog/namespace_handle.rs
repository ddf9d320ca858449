// Namespace Handle
//
// Typed accessor over pg_namespace. Table handles are composed from the
// (pg_class, pg_namespace, pg_tablespace) triple for the target database.

use std::sync::Arc;

use crate::common::types::NamespaceOid;
use crate::sql::SqlValue;
use crate::transaction::Transaction;

use super::catalog::{Catalog, DatabaseCatalog};
use super::entry::{CatalogEntry, CatalogTable};
use super::table_handle::TableHandle;

pub type NamespaceEntry = CatalogEntry<NamespaceOid>;

pub struct NamespaceHandle {
    catalog: Arc<Catalog>,
    db_oid: crate::common::types::DbOid,
    db_catalog: Arc<DatabaseCatalog>,
}

impl NamespaceHandle {
    pub(crate) fn new(
        catalog: Arc<Catalog>,
        db_oid: crate::common::types::DbOid,
        db_catalog: Arc<DatabaseCatalog>,
    ) -> Self {
        Self { catalog, db_oid, db_catalog }
    }

    /// Look up a namespace row by oid (column 0).
    pub fn get_namespace_entry(&self, txn: &Transaction, oid: NamespaceOid) -> Option<NamespaceEntry> {
        let table = CatalogTable::new(self.db_catalog.pg_namespace.clone());
        let (slot, row) = table.find_row(txn, 0, &SqlValue::integer(oid.0 as i64))?;
        Some(NamespaceEntry::new(oid, slot, row))
    }

    /// Look up a namespace row by name (column 1), recovering the oid.
    pub fn get_namespace_entry_by_name(&self, txn: &Transaction, name: &str) -> Option<NamespaceEntry> {
        let table = CatalogTable::new(self.db_catalog.pg_namespace.clone());
        let (slot, row) = table.find_row(txn, 1, &SqlValue::string(name))?;
        let oid = NamespaceOid(row.get_by_index(0).as_integer()? as u32);
        Some(NamespaceEntry::new(oid, slot, row))
    }

    /// Compose a table handle for the named namespace.
    pub fn get_table_handle(&self, txn: &Transaction, nsp_name: &str) -> Option<TableHandle> {
        log::trace!("getting table handle for namespace '{}'", nsp_name);
        let entry = self.get_namespace_entry_by_name(txn, nsp_name)?;
        Some(TableHandle::new(
            self.catalog.clone(),
            self.db_oid,
            entry.oid(),
            self.db_catalog.pg_class.clone(),
            self.db_catalog.pg_namespace.clone(),
            self.db_catalog.pg_tablespace.clone(),
        ))
    }
}
