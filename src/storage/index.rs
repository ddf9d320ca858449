// Index Contract
//
// An ordered key map honoring the insert / insert-unique / scan-key surface
// the execution engine consumes. The real tree structures live in the
// storage engine; this is the contract boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::{ColOid, IndexOid, TupleSlot};
use crate::sql::{SqlTypeId, SqlValue};
use crate::storage::projected_row::{ColumnSpec, ProjectedRow, ProjectedRowInitializer};
use crate::transaction::Transaction;

/// One column of an index key schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKeyColumn {
    pub oid: ColOid,
    pub type_id: SqlTypeId,
    pub nullable: bool,
}

/// Ordered list of key columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexKeySchema {
    pub columns: Vec<IndexKeyColumn>,
}

/// Totally ordered key part so mixed-type keys can live in one tree.
/// Nulls order first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Date(i64),
    Str(String),
}

fn key_part(value: &SqlValue) -> KeyPart {
    if value.is_null() {
        return KeyPart::Null;
    }
    match value {
        SqlValue::Integer { val, .. } => KeyPart::Int(*val),
        SqlValue::Real { val, .. } => {
            // Order-preserving bit flip for non-negative/negative floats.
            let bits = val.to_bits();
            let ordered = if *val >= 0.0 { bits ^ (1 << 63) } else { !bits };
            KeyPart::Float(ordered)
        }
        SqlValue::Bool { val, .. } => KeyPart::Bool(*val),
        SqlValue::Date { val, .. } => KeyPart::Date(val.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp()),
        SqlValue::Str { val, .. } => KeyPart::Str(val.clone()),
    }
}

/// Metadata surface the index build consults.
#[derive(Debug, Clone)]
pub struct IndexMetadata {
    key_schema: IndexKeySchema,
    initializer: ProjectedRowInitializer,
}

impl IndexMetadata {
    pub fn key_schema(&self) -> &IndexKeySchema {
        &self.key_schema
    }

    pub fn projected_row_initializer(&self) -> &ProjectedRowInitializer {
        &self.initializer
    }
}

pub struct Index {
    oid: IndexOid,
    unique: bool,
    metadata: IndexMetadata,
    entries: RwLock<BTreeMap<Vec<KeyPart>, Vec<TupleSlot>>>,
}

impl Index {
    pub fn new(oid: IndexOid, unique: bool, key_schema: IndexKeySchema) -> Arc<Self> {
        let columns = key_schema
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| ColumnSpec::new(c.oid, format!("key{}", i), c.type_id))
            .collect();
        let metadata = IndexMetadata {
            key_schema,
            initializer: ProjectedRowInitializer::new(columns),
        };
        Arc::new(Self {
            oid,
            unique,
            metadata,
            entries: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn oid(&self) -> IndexOid {
        self.oid
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn projected_row_initializer(&self) -> &ProjectedRowInitializer {
        &self.metadata.initializer
    }

    fn key_of(&self, key_row: &ProjectedRow) -> Vec<KeyPart> {
        key_row.values().iter().map(key_part).collect()
    }

    /// Insert a key/slot pair. Duplicate keys accumulate.
    pub fn insert(self: &Arc<Self>, txn: &Transaction, key_row: &ProjectedRow, slot: TupleSlot) -> bool {
        let key = self.key_of(key_row);
        self.entries.write().entry(key.clone()).or_default().push(slot);
        let index = Arc::clone(self);
        txn.register_undo(move || {
            let mut entries = index.entries.write();
            if let Some(slots) = entries.get_mut(&key) {
                slots.retain(|&s| s != slot);
                if slots.is_empty() {
                    entries.remove(&key);
                }
            }
        });
        true
    }

    /// Insert a key/slot pair, failing when the key already exists.
    pub fn insert_unique(self: &Arc<Self>, txn: &Transaction, key_row: &ProjectedRow, slot: TupleSlot) -> bool {
        let key = self.key_of(key_row);
        {
            let mut entries = self.entries.write();
            if entries.contains_key(&key) {
                return false;
            }
            entries.insert(key.clone(), vec![slot]);
        }
        let index = Arc::clone(self);
        txn.register_undo(move || {
            index.entries.write().remove(&key);
        });
        true
    }

    /// Slots matching an exact key.
    pub fn scan_key(&self, key_row: &ProjectedRow) -> Vec<TupleSlot> {
        let key = self.key_of(key_row);
        self.entries.read().get(&key).cloned().unwrap_or_default()
    }

    pub fn key_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionManager;

    fn int_key_index(unique: bool) -> Arc<Index> {
        Index::new(
            IndexOid(9),
            unique,
            IndexKeySchema {
                columns: vec![IndexKeyColumn { oid: ColOid(1), type_id: SqlTypeId::Integer, nullable: false }],
            },
        )
    }

    fn key_row(index: &Index, v: i64) -> ProjectedRow {
        let mut row = index.projected_row_initializer().initialize_row();
        row.set_by_index(0, SqlValue::integer(v));
        row
    }

    #[test]
    fn test_insert_and_scan() {
        let tm = TransactionManager::new();
        let index = int_key_index(false);
        let txn = tm.begin();
        assert!(index.insert(&txn, &key_row(&index, 5), 100));
        assert!(index.insert(&txn, &key_row(&index, 5), 101));
        tm.commit(&txn);
        assert_eq!(index.scan_key(&key_row(&index, 5)), vec![100, 101]);
        assert!(index.scan_key(&key_row(&index, 6)).is_empty());
    }

    #[test]
    fn test_insert_unique_rejects_duplicates() {
        let tm = TransactionManager::new();
        let index = int_key_index(true);
        let txn = tm.begin();
        assert!(index.insert_unique(&txn, &key_row(&index, 5), 100));
        assert!(!index.insert_unique(&txn, &key_row(&index, 5), 101));
        tm.commit(&txn);
        assert_eq!(index.key_count(), 1);
    }

    #[test]
    fn test_abort_removes_entries() {
        let tm = TransactionManager::new();
        let index = int_key_index(false);
        let txn = tm.begin();
        index.insert(&txn, &key_row(&index, 1), 7);
        tm.abort(&txn);
        assert_eq!(index.key_count(), 0);
    }
}
