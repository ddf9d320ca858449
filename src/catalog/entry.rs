// Catalog Rows and Entries
//
// A `CatalogTable` scans a pg_* table for a row matching one column; an
// entry wraps the returned projected row plus its column-oid -> slot map.
// Entries borrow storage rows; their lifetime is bounded by the enclosing
// transaction, and handles never cache them.

use std::sync::Arc;

use crate::common::types::{ColOid, TupleSlot};
use crate::sql::SqlValue;
use crate::storage::{ProjectedRow, SqlTable};
use crate::transaction::Transaction;

/// Read/write view over one catalog table.
pub(crate) struct CatalogTable {
    table: Arc<SqlTable>,
}

impl CatalogTable {
    pub(crate) fn new(table: Arc<SqlTable>) -> Self {
        Self { table }
    }

    pub(crate) fn table(&self) -> &Arc<SqlTable> {
        &self.table
    }

    /// Find the first visible row whose column `col_idx` equals `value`.
    pub(crate) fn find_row(&self, txn: &Transaction, col_idx: usize, value: &SqlValue) -> Option<(TupleSlot, ProjectedRow)> {
        let init = self.table.full_row_initializer();
        for slot in 0..self.table.slot_count() as TupleSlot {
            let mut row = init.initialize_row();
            if self.table.select(txn, slot, &mut row) && row.get_by_index(col_idx) == value {
                return Some((slot, row));
            }
        }
        None
    }

    /// Find the first visible row matching two column predicates.
    pub(crate) fn find_row2(
        &self,
        txn: &Transaction,
        col_a: usize,
        value_a: &SqlValue,
        col_b: usize,
        value_b: &SqlValue,
    ) -> Option<(TupleSlot, ProjectedRow)> {
        let init = self.table.full_row_initializer();
        for slot in 0..self.table.slot_count() as TupleSlot {
            let mut row = init.initialize_row();
            if self.table.select(txn, slot, &mut row)
                && row.get_by_index(col_a) == value_a
                && row.get_by_index(col_b) == value_b
            {
                return Some((slot, row));
            }
        }
        None
    }
}

/// A catalog entry: an object oid plus its projected row.
#[derive(Debug, Clone)]
pub struct CatalogEntry<K> {
    oid: K,
    slot: TupleSlot,
    row: ProjectedRow,
}

impl<K: Copy> CatalogEntry<K> {
    pub(crate) fn new(oid: K, slot: TupleSlot, row: ProjectedRow) -> Self {
        Self { oid, slot, row }
    }

    pub fn oid(&self) -> K {
        self.oid
    }

    pub(crate) fn slot(&self) -> TupleSlot {
        self.slot
    }

    /// Value of the column with the given oid.
    pub fn get_value(&self, col: ColOid) -> Option<&SqlValue> {
        self.row.get(col)
    }

    /// Value of the column with the given name.
    pub fn get_by_name(&self, name: &str) -> Option<&SqlValue> {
        let idx = self.row.columns().iter().position(|c| c.name == name)?;
        Some(self.row.get_by_index(idx))
    }

    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.get_by_name(name)?.as_integer()
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_by_name(name)?.as_bool()
    }

    pub fn row(&self) -> &ProjectedRow {
        &self.row
    }
}
