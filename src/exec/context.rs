// Execution Context
//
// The per-query context handed to every compiled plan: memory pool, output
// buffer with its callback, the snapshot transaction, and the cancellation
// flag emitted loops consult at pipeline boundaries.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::Catalog;
use crate::common::types::{DbOid, NamespaceOid};
use crate::exec::bytes::ByteBuffer;
use crate::exec::output::OutputBuffer;
use crate::plan::OutputSchema;
use crate::storage::{Index, SqlTable};
use crate::transaction::Transaction;

/// Aligned allocation contract.
#[derive(Default)]
pub struct MemoryPool {
    allocated: AtomicUsize,
}

impl MemoryPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn allocate_aligned(&self, size: usize) -> ByteBuffer {
        self.allocated.fetch_add(size, Ordering::Relaxed);
        ByteBuffer::with_size(size)
    }

    pub fn bytes_allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

/// Thread-local state buffers for parallel phases. Each participating thread
/// owns one state of `state_size` bytes.
#[derive(Default)]
pub struct ThreadStateContainer {
    state_size: AtomicUsize,
    states: Mutex<Vec<ByteBuffer>>,
}

impl ThreadStateContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop existing states and set the per-thread state size.
    pub fn reset(&self, state_size: usize) {
        self.state_size.store(state_size, Ordering::SeqCst);
        self.states.lock().clear();
    }

    pub fn state_size(&self) -> usize {
        self.state_size.load(Ordering::SeqCst)
    }

    /// State buffer for one thread, allocated on first access.
    pub fn state_for(&self, thread_idx: usize) -> ByteBuffer {
        let mut states = self.states.lock();
        while states.len() <= thread_idx {
            states.push(ByteBuffer::with_size(self.state_size.load(Ordering::SeqCst)));
        }
        states[thread_idx].clone()
    }

    pub fn iterate(&self, mut f: impl FnMut(&ByteBuffer)) {
        for state in self.states.lock().iter() {
            f(state);
        }
    }

    pub fn thread_count(&self) -> usize {
        self.states.lock().len()
    }
}

/// Callback receiving finished output batches as raw tuples.
pub type OutputCallback = Box<dyn FnMut(&[u8], u32, u32)>;

pub struct ExecutionContext {
    catalog: Arc<Catalog>,
    db_oid: DbOid,
    ns_oid: NamespaceOid,
    txn: Arc<Transaction>,
    mem_pool: Arc<MemoryPool>,
    output: RefCell<Option<OutputBuffer>>,
    cancelled: AtomicBool,
}

impl ExecutionContext {
    pub fn new(
        catalog: Arc<Catalog>,
        db_oid: DbOid,
        ns_oid: NamespaceOid,
        txn: Arc<Transaction>,
        output_schema: Option<&OutputSchema>,
        callback: Option<OutputCallback>,
    ) -> Self {
        let output = match (output_schema, callback) {
            (Some(schema), Some(callback)) => Some(OutputBuffer::new(schema, callback)),
            _ => None,
        };
        Self {
            catalog,
            db_oid,
            ns_oid,
            txn,
            mem_pool: MemoryPool::new(),
            output: RefCell::new(output),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn txn(&self) -> &Arc<Transaction> {
        &self.txn
    }

    pub fn mem_pool(&self) -> &Arc<MemoryPool> {
        &self.mem_pool
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lookup_table(&self, name: &str) -> Option<Arc<SqlTable>> {
        self.catalog.user_table_by_name(self.db_oid, self.ns_oid, name).map(|(_, t)| t)
    }

    /// The physical index and its base table, by name.
    pub fn lookup_index(&self, name: &str) -> Option<(Arc<Index>, Arc<SqlTable>)> {
        self.catalog.index_by_name(self.db_oid, name)
    }

    /// Access the output buffer; none when the query produces no output.
    pub fn with_output<R>(&self, f: impl FnOnce(&mut OutputBuffer) -> R) -> Option<R> {
        self.output.borrow_mut().as_mut().map(f)
    }

    /// Flip the cancellation flag; emitted loops observe it at pipeline
    /// boundaries.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
