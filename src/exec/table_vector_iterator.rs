// Table Vector Iterator
//
// Outer scan cursor over a table: each advance materializes the next vector
// of visible rows as a projected-columns batch.

use std::sync::Arc;

use crate::common::types::{TupleSlot, VECTOR_SIZE};
use crate::exec::projected_columns::{ProjectedColumns, ProjectedColumnsIterator};
use crate::sql::SqlTypeId;
use crate::storage::SqlTable;
use crate::transaction::Transaction;

pub struct TableVectorIterator {
    table: Arc<SqlTable>,
    txn: Arc<Transaction>,
    next_slot: TupleSlot,
    end_slot: TupleSlot,
    pci: Option<ProjectedColumnsIterator>,
}

impl TableVectorIterator {
    pub fn new(table: Arc<SqlTable>, txn: Arc<Transaction>) -> Self {
        let end = table.slot_count() as TupleSlot;
        Self::with_bounds(table, txn, 0, end)
    }

    /// A cursor over one slot partition, for partitioned parallel scans.
    pub fn with_bounds(table: Arc<SqlTable>, txn: Arc<Transaction>, start: TupleSlot, end: TupleSlot) -> Self {
        Self {
            table,
            txn,
            next_slot: start,
            end_slot: end,
            pci: None,
        }
    }

    fn column_types(&self) -> Vec<SqlTypeId> {
        self.table.columns().iter().map(|c| c.type_id).collect()
    }

    /// Load the next vector of visible rows. False once the table range is
    /// exhausted.
    pub fn advance(&mut self) -> bool {
        let mut pc = ProjectedColumns::new(self.column_types());
        let init = self.table.full_row_initializer();
        let mut row = init.initialize_row();
        while self.next_slot < self.end_slot && pc.num_rows() < VECTOR_SIZE {
            if self.table.select(&self.txn, self.next_slot, &mut row) {
                pc.push_row(row.values().to_vec());
            }
            self.next_slot += 1;
        }
        if pc.num_rows() == 0 {
            self.pci = None;
            return false;
        }
        self.pci = Some(ProjectedColumnsIterator::new(pc));
        true
    }

    pub fn pci_mut(&mut self) -> Option<&mut ProjectedColumnsIterator> {
        self.pci.as_mut()
    }

    pub fn close(&mut self) {
        self.pci = None;
        self.next_slot = self.end_slot;
    }

    /// Partitioned parallel scan: split the slot range into `partitions`
    /// contiguous chunks and run `scanner` on a per-thread cursor for each.
    pub fn parallel_scan(
        table: Arc<SqlTable>,
        txn: Arc<Transaction>,
        partitions: usize,
        scanner: impl Fn(usize, &mut TableVectorIterator) + Send + Sync,
    ) {
        let total = table.slot_count() as TupleSlot;
        let partitions = partitions.max(1) as TupleSlot;
        let chunk = total.div_ceil(partitions).max(1);
        std::thread::scope(|scope| {
            for p in 0..partitions {
                let start = p * chunk;
                if start >= total {
                    break;
                }
                let end = (start + chunk).min(total);
                let table = table.clone();
                let txn = txn.clone();
                let scanner = &scanner;
                scope.spawn(move || {
                    let mut tvi = TableVectorIterator::with_bounds(table, txn, start, end);
                    scanner(p as usize, &mut tvi);
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{ColOid, TableOid};
    use crate::sql::SqlValue;
    use crate::storage::ColumnSpec;
    use crate::transaction::TransactionManager;
    use parking_lot::Mutex;

    fn table_with_rows(n: i64) -> (Arc<TransactionManager>, Arc<SqlTable>) {
        let tm = Arc::new(TransactionManager::new());
        let table = SqlTable::new(
            TableOid(1),
            "t",
            vec![ColumnSpec::new(ColOid(1), "col0", SqlTypeId::Integer)],
        );
        let txn = tm.begin();
        for i in 0..n {
            table.insert(&txn, vec![SqlValue::integer(i)]);
        }
        tm.commit(&txn);
        (tm, table)
    }

    #[test]
    fn test_scan_sees_all_rows_across_vectors() {
        let (tm, table) = table_with_rows(VECTOR_SIZE as i64 + 10);
        let txn = Arc::new(tm.begin());
        let mut tvi = TableVectorIterator::new(table, txn.clone());

        let mut total = 0;
        while tvi.advance() {
            let pci = tvi.pci_mut().unwrap();
            total += pci.num_rows();
        }
        assert_eq!(total, VECTOR_SIZE + 10);
        tvi.close();
        tm.commit(&txn);
    }

    #[test]
    fn test_empty_table_scan() {
        let (tm, table) = table_with_rows(0);
        let txn = Arc::new(tm.begin());
        let mut tvi = TableVectorIterator::new(table, txn.clone());
        assert!(!tvi.advance());
        tm.commit(&txn);
    }

    #[test]
    fn test_parallel_scan_covers_every_slot_once() {
        let (tm, table) = table_with_rows(1000);
        let txn = Arc::new(tm.begin());
        let sum = Mutex::new(0i64);
        TableVectorIterator::parallel_scan(table, txn.clone(), 4, |_, tvi| {
            let mut local = 0;
            while tvi.advance() {
                let pci = tvi.pci_mut().unwrap();
                while pci.has_next() {
                    local += pci.get(0).as_integer().unwrap();
                    pci.advance();
                }
            }
            *sum.lock() += local;
        });
        assert_eq!(*sum.lock(), (0..1000).sum::<i64>());
        tm.commit(&txn);
    }
}
