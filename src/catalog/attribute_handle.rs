// Attribute Handle
//
// Typed accessor over pg_attribute, keyed by (attrelid, attname).

use std::sync::Arc;

use crate::common::types::{ColOid, TableOid};
use crate::sql::SqlValue;
use crate::transaction::Transaction;

use super::catalog::DatabaseCatalog;
use super::entry::{CatalogEntry, CatalogTable};

pub type AttributeEntry = CatalogEntry<ColOid>;

pub struct AttributeHandle {
    db_catalog: Arc<DatabaseCatalog>,
}

impl AttributeHandle {
    pub(crate) fn new(db_catalog: Arc<DatabaseCatalog>) -> Self {
        Self { db_catalog }
    }

    /// Attribute of `table_oid` with the given name.
    pub fn get_attribute_entry(&self, txn: &Transaction, table_oid: TableOid, name: &str) -> Option<AttributeEntry> {
        let table = CatalogTable::new(self.db_catalog.pg_attribute.clone());
        let (slot, row) = table.find_row2(
            txn,
            1,
            &SqlValue::integer(table_oid.0 as i64),
            2,
            &SqlValue::string(name),
        )?;
        let oid = ColOid(row.get_by_index(0).as_integer()? as u32);
        Some(AttributeEntry::new(oid, slot, row))
    }
}
