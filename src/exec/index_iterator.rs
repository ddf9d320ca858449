// Index Iterator
//
// Point-lookup bridge over the index contract. Owns two projected-row
// buffers, one laid out for the index key schema and one for the base
// table's projected columns; both are allocated at init.

use std::sync::Arc;

use crate::common::types::{ColOid, TupleSlot};
use crate::exec::ExecError;
use crate::sql::SqlValue;
use crate::storage::{Index, ProjectedRow, SqlTable};
use crate::transaction::Transaction;

pub struct IndexIterator {
    index: Arc<Index>,
    table: Arc<SqlTable>,
    txn: Arc<Transaction>,
    col_oids: Vec<ColOid>,
    index_pr: Option<ProjectedRow>,
    table_pr: Option<ProjectedRow>,
    matches: Vec<TupleSlot>,
    pos: usize,
}

impl IndexIterator {
    pub fn new(index: Arc<Index>, table: Arc<SqlTable>, txn: Arc<Transaction>) -> Self {
        Self {
            index,
            table,
            txn,
            col_oids: Vec::new(),
            index_pr: None,
            table_pr: None,
            matches: Vec::new(),
            pos: 0,
        }
    }

    /// Columns of the base table this iterator materializes. Must be
    /// non-empty before `init`.
    pub fn add_col(&mut self, oid: ColOid) {
        self.col_oids.push(oid);
    }

    pub fn set_cols(&mut self, oids: Vec<ColOid>) {
        self.col_oids = oids;
    }

    /// Allocate the key and table row buffers.
    pub fn init(&mut self) -> Result<(), ExecError> {
        if self.col_oids.is_empty() {
            return Err(ExecError::EmptyColumnList);
        }
        self.index_pr = Some(self.index.projected_row_initializer().initialize_row());
        self.table_pr = Some(self.table.initializer_for_projected_row(&self.col_oids).initialize_row());
        Ok(())
    }

    /// Decode an encoded key buffer per the index key schema and collect the
    /// matching slots.
    pub fn scan_key_from_bytes(&mut self, bytes: &[u8]) -> Result<(), ExecError> {
        let key_schema = self.index.metadata().key_schema().clone();
        let mut values = Vec::with_capacity(key_schema.columns.len());
        let mut offset = 0;
        for col in &key_schema.columns {
            values.push(SqlValue::read_from(col.type_id, &bytes[offset..])?);
            offset += col.type_id.encoded_size();
        }
        self.scan_key(&values)
    }

    /// Collect slots matching the given key values.
    pub fn scan_key(&mut self, key: &[SqlValue]) -> Result<(), ExecError> {
        let index_pr = self.index_pr.as_mut().ok_or(ExecError::NotInitialized("IndexIterator"))?;
        for (i, value) in key.iter().enumerate() {
            index_pr.set_by_index(i, value.clone());
        }
        self.matches = self.index.scan_key(index_pr);
        self.pos = 0;
        Ok(())
    }

    /// Move to the next visible matching tuple.
    pub fn advance(&mut self) -> bool {
        let Some(table_pr) = self.table_pr.as_mut() else {
            return false;
        };
        while self.pos < self.matches.len() {
            let slot = self.matches[self.pos];
            self.pos += 1;
            if self.table.select(&self.txn, slot, table_pr) {
                return true;
            }
        }
        false
    }

    /// Column `idx` of the current tuple.
    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.table_pr.as_ref().map(|pr| pr.get_by_index(idx))
    }
}
