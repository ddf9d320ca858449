// Index Handle
//
// Typed accessor over pg_index. Carries the five visibility flags the
// online build protocol flips and the indexptr column referencing the
// physical index object.

use std::sync::Arc;

use crate::common::types::{IndexOid, TableOid};
use crate::sql::SqlValue;
use crate::storage::Index;
use crate::transaction::Transaction;

use super::catalog::{Catalog, DatabaseCatalog};
use super::entry::{CatalogEntry, CatalogTable};

pub type IndexEntry = CatalogEntry<IndexOid>;

pub struct IndexHandle {
    catalog: Arc<Catalog>,
    db_catalog: Arc<DatabaseCatalog>,
}

impl IndexHandle {
    pub(crate) fn new(catalog: Arc<Catalog>, db_catalog: Arc<DatabaseCatalog>) -> Self {
        Self { catalog, db_catalog }
    }

    fn pg_index(&self) -> CatalogTable {
        CatalogTable::new(self.db_catalog.pg_index.clone())
    }

    /// Insert a pg_index row for a freshly built (still empty) index.
    #[allow(clippy::too_many_arguments)]
    pub fn add_entry(
        &self,
        txn: &Transaction,
        index: &Arc<Index>,
        index_oid: IndexOid,
        table_oid: TableOid,
        indnatts: i64,
        indnkeyatts: i64,
        indisunique: bool,
        indisprimary: bool,
        indisvalid: bool,
        indisready: bool,
        indislive: bool,
    ) {
        self.db_catalog.pg_index.insert(
            txn,
            vec![
                SqlValue::integer(index_oid.0 as i64),
                SqlValue::integer(table_oid.0 as i64),
                SqlValue::integer(indnatts),
                SqlValue::integer(indnkeyatts),
                SqlValue::boolean(indisunique),
                SqlValue::boolean(indisprimary),
                SqlValue::boolean(indisvalid),
                SqlValue::boolean(indisready),
                SqlValue::boolean(indislive),
                SqlValue::integer(index.oid().0 as i64),
            ],
        );
    }

    /// Look up an index row by oid (column 0).
    pub fn get_index_entry(&self, txn: &Transaction, oid: IndexOid) -> Option<IndexEntry> {
        let (slot, row) = self.pg_index().find_row(txn, 0, &SqlValue::integer(oid.0 as i64))?;
        Some(IndexEntry::new(oid, slot, row))
    }

    /// Look up an index row by its base table (column 1), recovering the
    /// index oid.
    pub fn get_index_entry_for_table(&self, txn: &Transaction, table_oid: TableOid) -> Option<IndexEntry> {
        let (slot, row) = self.pg_index().find_row(txn, 1, &SqlValue::integer(table_oid.0 as i64))?;
        let oid = IndexOid(row.get_by_index(0).as_integer()? as u32);
        Some(IndexEntry::new(oid, slot, row))
    }

    /// Flip one column of an index entry under `txn`. The update becomes
    /// visible to other transactions only after commit.
    pub fn set_entry_column(&self, txn: &Transaction, oid: IndexOid, column: &str, value: SqlValue) -> bool {
        let Some(entry) = self.get_index_entry(txn, oid) else {
            return false;
        };
        let Some(col_idx) = self
            .db_catalog
            .pg_index
            .columns()
            .iter()
            .position(|c| c.name == column)
        else {
            return false;
        };
        self.db_catalog.pg_index.update_column(txn, entry.slot(), col_idx, value);
        true
    }

    /// Delete an index entry.
    pub fn delete_entry(&self, txn: &Transaction, entry: &IndexEntry) {
        self.db_catalog.pg_index.delete(txn, entry.slot());
    }

    /// The physical index object an entry points at.
    pub fn index_object(&self, entry: &IndexEntry) -> Option<Arc<Index>> {
        let oid = entry.get_integer("indexptr")?;
        self.catalog.get_index_object(IndexOid(oid as u32))
    }
}
