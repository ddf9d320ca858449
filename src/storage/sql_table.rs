// Version-Visible Row Store
//
// The narrow SqlTable contract the engine consumes: insert/delete under a
// transaction, visibility by start timestamp, and slot-wise selection into
// projected rows. This is a contract implementation, not a storage engine;
// block layout lives elsewhere.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::{TableOid, Timestamp, TupleSlot};
use crate::sql::SqlValue;
use crate::storage::projected_row::{ColumnSpec, ProjectedRow, ProjectedRowInitializer};
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VersionStamp {
    Committed(Timestamp),
    Uncommitted(u64),
    Aborted,
}

#[derive(Debug, Clone)]
struct RowVersion {
    values: Vec<SqlValue>,
    begin: VersionStamp,
    end: Option<VersionStamp>,
}

impl RowVersion {
    fn visible_to(&self, txn_id: u64, start_ts: Timestamp) -> bool {
        let begin_ok = match self.begin {
            VersionStamp::Committed(ts) => ts <= start_ts,
            VersionStamp::Uncommitted(id) => id == txn_id,
            VersionStamp::Aborted => false,
        };
        if !begin_ok {
            return false;
        }
        match self.end {
            None | Some(VersionStamp::Aborted) => true,
            // A committed delete hides the version from later snapshots.
            Some(VersionStamp::Committed(ts)) => ts > start_ts,
            // An uncommitted delete hides the version from its own writer.
            Some(VersionStamp::Uncommitted(id)) => id != txn_id,
        }
    }
}

/// In-memory table with per-version visibility stamps.
pub struct SqlTable {
    oid: TableOid,
    name: String,
    columns: Vec<ColumnSpec>,
    rows: RwLock<Vec<RowVersion>>,
}

impl SqlTable {
    pub fn new(oid: TableOid, name: impl Into<String>, columns: Vec<ColumnSpec>) -> Arc<Self> {
        Arc::new(Self {
            oid,
            name: name.into(),
            columns,
            rows: RwLock::new(Vec::new()),
        })
    }

    pub fn oid(&self) -> TableOid {
        self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Projected-row initializer for a column-oid subset, in the given order.
    pub fn initializer_for_projected_row(&self, col_oids: &[crate::common::types::ColOid]) -> ProjectedRowInitializer {
        let columns = col_oids
            .iter()
            .filter_map(|oid| self.columns.iter().find(|c| c.oid == *oid).cloned())
            .collect();
        ProjectedRowInitializer::new(columns)
    }

    pub fn full_row_initializer(&self) -> ProjectedRowInitializer {
        ProjectedRowInitializer::new(self.columns.clone())
    }

    /// Insert a row under `txn`. The version becomes durable at commit and
    /// disappears on abort.
    pub fn insert(self: &Arc<Self>, txn: &Transaction, values: Vec<SqlValue>) -> TupleSlot {
        debug_assert_eq!(values.len(), self.columns.len());
        let slot = {
            let mut rows = self.rows.write();
            rows.push(RowVersion {
                values,
                begin: VersionStamp::Uncommitted(txn.id()),
                end: None,
            });
            (rows.len() - 1) as TupleSlot
        };

        let table = Arc::clone(self);
        txn.register_commit_action(move |ts| {
            table.rows.write()[slot as usize].begin = VersionStamp::Committed(ts);
        });
        let table = Arc::clone(self);
        txn.register_undo(move || {
            table.rows.write()[slot as usize].begin = VersionStamp::Aborted;
        });
        slot
    }

    /// Delete the version at `slot` under `txn`.
    pub fn delete(self: &Arc<Self>, txn: &Transaction, slot: TupleSlot) {
        {
            let mut rows = self.rows.write();
            rows[slot as usize].end = Some(VersionStamp::Uncommitted(txn.id()));
        }
        let table = Arc::clone(self);
        txn.register_commit_action(move |ts| {
            table.rows.write()[slot as usize].end = Some(VersionStamp::Committed(ts));
        });
        let table = Arc::clone(self);
        txn.register_undo(move || {
            table.rows.write()[slot as usize].end = None;
        });
    }

    /// Replace one column of the row at `slot`: deletes the old version and
    /// inserts the updated one. Returns the new slot.
    pub fn update_column(
        self: &Arc<Self>,
        txn: &Transaction,
        slot: TupleSlot,
        col_idx: usize,
        value: SqlValue,
    ) -> TupleSlot {
        let mut values = self.rows.read()[slot as usize].values.clone();
        values[col_idx] = value;
        self.delete(txn, slot);
        self.insert(txn, values)
    }

    /// Fill `out` from the visible version at `slot`; false when the slot is
    /// not visible to `txn`.
    pub fn select(&self, txn: &Transaction, slot: TupleSlot, out: &mut ProjectedRow) -> bool {
        let rows = self.rows.read();
        let Some(row) = rows.get(slot as usize) else {
            return false;
        };
        if !row.visible_to(txn.id(), txn.start_ts()) {
            return false;
        }
        for i in 0..out.num_columns() {
            let oid = out.columns()[i].oid;
            if let Some(pos) = self.columns.iter().position(|c| c.oid == oid) {
                out.set_by_index(i, row.values[pos].clone());
            }
        }
        true
    }

    /// Every slot ever allocated; callers filter by visibility via `select`.
    pub fn slot_count(&self) -> usize {
        self.rows.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::ColOid;
    use crate::sql::SqlTypeId;
    use crate::transaction::TransactionManager;

    fn test_table() -> Arc<SqlTable> {
        SqlTable::new(
            TableOid(1),
            "t",
            vec![
                ColumnSpec::new(ColOid(1), "a", SqlTypeId::Integer),
                ColumnSpec::new(ColOid(2), "b", SqlTypeId::Boolean),
            ],
        )
    }

    #[test]
    fn test_insert_visible_to_self_and_later_txns() {
        let tm = TransactionManager::new();
        let table = test_table();

        let writer = tm.begin();
        let slot = table.insert(&writer, vec![SqlValue::integer(1), SqlValue::boolean(true)]);

        let mut row = table.full_row_initializer().initialize_row();
        assert!(table.select(&writer, slot, &mut row));

        // Concurrent snapshot does not see the uncommitted row.
        let reader = tm.begin();
        assert!(!table.select(&reader, slot, &mut row));
        tm.commit(&reader);

        tm.commit(&writer);

        let late = tm.begin();
        assert!(table.select(&late, slot, &mut row));
        assert_eq!(row.get(ColOid(1)).unwrap().as_integer(), Some(1));
        tm.commit(&late);
    }

    #[test]
    fn test_aborted_insert_invisible() {
        let tm = TransactionManager::new();
        let table = test_table();
        let writer = tm.begin();
        let slot = table.insert(&writer, vec![SqlValue::integer(1), SqlValue::boolean(false)]);
        tm.abort(&writer);

        let reader = tm.begin();
        let mut row = table.full_row_initializer().initialize_row();
        assert!(!table.select(&reader, slot, &mut row));
        tm.commit(&reader);
    }

    #[test]
    fn test_snapshot_isolation_for_old_readers() {
        let tm = TransactionManager::new();
        let table = test_table();

        let setup = tm.begin();
        let slot = table.insert(&setup, vec![SqlValue::integer(1), SqlValue::boolean(true)]);
        tm.commit(&setup);

        let old_reader = tm.begin();

        let deleter = tm.begin();
        table.delete(&deleter, slot);
        tm.commit(&deleter);

        // The old snapshot still sees the deleted version.
        let mut row = table.full_row_initializer().initialize_row();
        assert!(table.select(&old_reader, slot, &mut row));
        tm.commit(&old_reader);

        let new_reader = tm.begin();
        assert!(!table.select(&new_reader, slot, &mut row));
        tm.commit(&new_reader);
    }

    #[test]
    fn test_update_column_versions() {
        let tm = TransactionManager::new();
        let table = test_table();

        let setup = tm.begin();
        let slot = table.insert(&setup, vec![SqlValue::integer(1), SqlValue::boolean(true)]);
        tm.commit(&setup);

        let updater = tm.begin();
        let new_slot = table.update_column(&updater, slot, 0, SqlValue::integer(2));
        tm.commit(&updater);

        let reader = tm.begin();
        let mut row = table.full_row_initializer().initialize_row();
        assert!(!table.select(&reader, slot, &mut row));
        assert!(table.select(&reader, new_slot, &mut row));
        assert_eq!(row.get(ColOid(1)).unwrap().as_integer(), Some(2));
        tm.commit(&reader);
    }
}
