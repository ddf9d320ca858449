// Online Index Build Coordinator
//
// CREATE INDEX runs as two transactions separated by a quiescence barrier:
// T1 publishes the catalog entry (ready, not valid) so concurrent writers
// start maintaining the index; once every transaction older than T1's commit
// is gone, T2 flips ready off, populates the index from a full table scan,
// and publishes the final validity. DROP deletes the entry, quiesces, then
// destroys the physical object.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::catalog::CatalogError;
use crate::catalog::{Catalog, CatalogResult};
use crate::common::types::{ColOid, DbOid, IndexId, IndexOid, NamespaceOid, TableOid};
use crate::storage::{Index, IndexKeyColumn, IndexKeySchema, SqlTable};
use crate::transaction::{Transaction, TransactionManager};

#[derive(Debug, Clone, Copy, Default)]
struct BuildState {
    building: bool,
    generation: u64,
}

/// Coordinates concurrent index creation and removal.
#[derive(Default)]
pub struct IndexManager {
    build_states: Mutex<HashMap<IndexId, BuildState>>,
}

impl IndexManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn set_building_flag(&self, id: IndexId, building: bool) {
        let mut states = self.build_states.lock();
        let state = states.entry(id).or_default();
        state.building = building;
        if building {
            state.generation += 1;
        }
    }

    pub fn is_building(&self, id: IndexId) -> bool {
        self.build_states.lock().get(&id).map(|s| s.building).unwrap_or(false)
    }

    pub fn build_generation(&self, id: IndexId) -> u64 {
        self.build_states.lock().get(&id).map(|s| s.generation).unwrap_or(0)
    }

    /// Build an empty index whose key schema is derived from the attribute
    /// catalog entries of `key_attrs`.
    fn get_empty_index(
        &self,
        txn: &Transaction,
        catalog: &Arc<Catalog>,
        db_oid: DbOid,
        table_oid: TableOid,
        index_oid: IndexOid,
        unique: bool,
        key_attrs: &[String],
    ) -> CatalogResult<Arc<Index>> {
        let db_handle = catalog.get_database(db_oid);
        let attr_handle = db_handle
            .get_attribute_handle(db_oid)
            .ok_or(CatalogError::DatabaseNotFound(db_oid))?;

        let mut columns = Vec::with_capacity(key_attrs.len());
        for key_name in key_attrs {
            let entry = attr_handle
                .get_attribute_entry(txn, table_oid, key_name)
                .ok_or_else(|| CatalogError::AttributeNotFound(key_name.clone()))?;
            let type_code = entry.get_integer("atttypid").unwrap_or_default();
            let type_id = crate::catalog::catalog::type_id_from_code(type_code)
                .ok_or_else(|| CatalogError::AttributeNotFound(key_name.clone()))?;
            let nullable = !entry.get_bool("attnotnull").unwrap_or(false);
            columns.push(IndexKeyColumn {
                oid: ColOid(entry.oid().0),
                type_id,
                nullable,
            });
        }
        Ok(Index::new(index_oid, unique, IndexKeySchema { columns }))
    }

    /// Online CREATE INDEX. Returns the new index oid, or the catalog error
    /// that aborted the protocol before any state became visible.
    #[allow(clippy::too_many_arguments)]
    pub fn create_concurrently(
        self: &Arc<Self>,
        db_oid: DbOid,
        ns_oid: NamespaceOid,
        table_oid: TableOid,
        unique: bool,
        index_name: &str,
        key_attrs: &[String],
        txn_mgr: &Arc<TransactionManager>,
        catalog: &Arc<Catalog>,
    ) -> CatalogResult<IndexOid> {
        // T1: publish the entry so new transactions maintain the index.
        let txn1 = txn_mgr.begin();
        let Some(sql_table) = catalog.get_user_table(&txn1, db_oid, ns_oid, table_oid) else {
            txn_mgr.abort(&txn1);
            return Err(CatalogError::TableNotFound(table_oid));
        };
        let db_handle = catalog.get_database(db_oid);
        let Some(index_handle) = db_handle.get_index_handle(db_oid) else {
            txn_mgr.abort(&txn1);
            return Err(CatalogError::DatabaseNotFound(db_oid));
        };

        let index_oid = IndexOid(catalog.get_next_oid());
        let indnatts = key_attrs.len() as i64;
        let indnkeyatts = key_attrs.len() as i64;
        let indisunique = unique;
        let indisprimary = false;
        let indisvalid = false;
        let indisready = true;
        let indislive = false;

        let index = match self.get_empty_index(&txn1, catalog, db_oid, table_oid, index_oid, unique, key_attrs) {
            Ok(index) => index,
            Err(e) => {
                txn_mgr.abort(&txn1);
                return Err(e);
            }
        };
        catalog.register_index_object(index_name, index.clone(), sql_table.clone());

        index_handle.add_entry(
            &txn1,
            &index,
            index_oid,
            table_oid,
            indnatts,
            indnkeyatts,
            indisunique,
            indisprimary,
            indisvalid,
            indisready,
            indislive,
        );

        let index_id = IndexId::new(db_oid, ns_oid, index_oid);
        self.set_building_flag(index_id, false);

        let commit_ts = txn_mgr.commit(&txn1);
        log::debug!("index {} entry published at ts {}", index_oid, commit_ts);

        // Quiescence barrier: every transaction that could read the table
        // without seeing the entry must be gone before the build starts.
        txn_mgr.wait_until_oldest_reaches(commit_ts);

        // T2: the build transaction flags itself at begin, then populates.
        let manager = Arc::clone(self);
        let build_txn = txn_mgr.begin_with_action(|| manager.set_building_flag(index_id, true));

        index_handle.set_entry_column(
            &build_txn,
            index_oid,
            "indisready",
            crate::sql::SqlValue::boolean(false),
        );
        let populated = Self::populate_index(&build_txn, &sql_table, &index, unique);
        index_handle.set_entry_column(
            &build_txn,
            index_oid,
            "indisvalid",
            crate::sql::SqlValue::boolean(populated),
        );

        let manager = Arc::clone(self);
        build_txn.register_commit_action(move |_| manager.set_building_flag(index_id, false));
        let build_ts = txn_mgr.commit(&build_txn);
        log::debug!("index {} build committed at ts {} (valid={})", index_oid, build_ts, populated);

        Ok(index_oid)
    }

    /// DROP INDEX: delete the entry, wait out old snapshots, destroy the
    /// physical object.
    pub fn drop_index(
        &self,
        db_oid: DbOid,
        ns_oid: NamespaceOid,
        table_oid: TableOid,
        index_oid: IndexOid,
        txn_mgr: &Arc<TransactionManager>,
        catalog: &Arc<Catalog>,
    ) -> CatalogResult<()> {
        let txn = txn_mgr.begin();
        if catalog.get_user_table(&txn, db_oid, ns_oid, table_oid).is_none() {
            txn_mgr.abort(&txn);
            return Err(CatalogError::TableNotFound(table_oid));
        }
        let db_handle = catalog.get_database(db_oid);
        let Some(index_handle) = db_handle.get_index_handle(db_oid) else {
            txn_mgr.abort(&txn);
            return Err(CatalogError::DatabaseNotFound(db_oid));
        };
        let Some(entry) = index_handle.get_index_entry(&txn, index_oid) else {
            txn_mgr.abort(&txn);
            return Err(CatalogError::IndexNotFound(index_oid));
        };
        let physical_oid = IndexOid(entry.get_integer("indexptr").unwrap_or_default() as u32);
        index_handle.delete_entry(&txn, &entry);
        let commit_ts = txn_mgr.commit(&txn);

        // No snapshot that could still use the index may survive the barrier.
        txn_mgr.wait_until_oldest_reaches(commit_ts);
        catalog.destroy_index_object(physical_oid);
        log::debug!("index {} dropped and destroyed", index_oid);
        Ok(())
    }

    /// Scan the base table and insert every visible row's key. Fails fast on
    /// the first uniqueness violation.
    pub fn populate_index(txn: &Transaction, sql_table: &Arc<SqlTable>, index: &Arc<Index>, unique: bool) -> bool {
        let index_pr_init = index.projected_row_initializer().clone();
        let mut index_pr = index_pr_init.initialize_row();

        let col_oids: Vec<ColOid> = index.metadata().key_schema().columns.iter().map(|c| c.oid).collect();
        let table_pr_init = sql_table.initializer_for_projected_row(&col_oids);
        let mut select_pr = table_pr_init.initialize_row();

        let mut success = true;
        for slot in 0..sql_table.slot_count() as u32 {
            if sql_table.select(txn, slot, &mut select_pr) {
                for i in 0..select_pr.num_columns() {
                    index_pr.set_by_index(i, select_pr.get_by_index(i).clone());
                }
                let inserted = if unique {
                    index.insert_unique(txn, &index_pr, slot)
                } else {
                    index.insert(txn, &index_pr, slot)
                };
                if !inserted {
                    success = false;
                    break;
                }
            }
        }
        success
    }
}
