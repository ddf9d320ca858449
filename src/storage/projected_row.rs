// Projected Rows
//
// A projected row is a materialized subset of a relation's columns, laid out
// per a column-oid -> slot map owned by its initializer.

use std::collections::HashMap;

use crate::common::types::ColOid;
use crate::sql::{SqlTypeId, SqlValue};

/// Column description shared by tables and projections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub oid: ColOid,
    pub name: String,
    pub type_id: SqlTypeId,
}

impl ColumnSpec {
    pub fn new(oid: ColOid, name: impl Into<String>, type_id: SqlTypeId) -> Self {
        Self { oid, name: name.into(), type_id }
    }
}

/// Builds projected rows for a fixed column subset.
#[derive(Debug, Clone)]
pub struct ProjectedRowInitializer {
    columns: Vec<ColumnSpec>,
}

impl ProjectedRowInitializer {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Size in slots of a row built by this initializer.
    pub fn projected_row_size(&self) -> usize {
        self.columns.len()
    }

    pub fn initialize_row(&self) -> ProjectedRow {
        let values = self.columns.iter().map(|c| SqlValue::null_of(c.type_id)).collect();
        let pr_map = self.columns.iter().enumerate().map(|(i, c)| (c.oid, i)).collect();
        ProjectedRow { columns: self.columns.clone(), values, pr_map }
    }
}

/// A materialized row over a projected column subset.
#[derive(Debug, Clone)]
pub struct ProjectedRow {
    columns: Vec<ColumnSpec>,
    values: Vec<SqlValue>,
    pr_map: HashMap<ColOid, usize>,
}

impl ProjectedRow {
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Column-oid -> slot index map.
    pub fn pr_map(&self) -> &HashMap<ColOid, usize> {
        &self.pr_map
    }

    pub fn get(&self, oid: ColOid) -> Option<&SqlValue> {
        self.pr_map.get(&oid).map(|&i| &self.values[i])
    }

    pub fn get_by_index(&self, idx: usize) -> &SqlValue {
        &self.values[idx]
    }

    pub fn set(&mut self, oid: ColOid, value: SqlValue) -> bool {
        match self.pr_map.get(&oid) {
            Some(&i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn set_by_index(&mut self, idx: usize, value: SqlValue) {
        self.values[idx] = value;
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}
