use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::common::types::Timestamp;

type UndoAction = Box<dyn FnOnce() + Send>;
type CommitAction = Box<dyn FnOnce(Timestamp) + Send>;

/// An in-flight transaction. Writers register undo and commit actions as
/// they touch shared state; the manager runs them at abort or commit.
pub struct Transaction {
    id: u64,
    start_ts: Timestamp,
    undo_actions: Mutex<Vec<UndoAction>>,
    commit_actions: Mutex<Vec<CommitAction>>,
}

impl Transaction {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    /// Register a compensation action run if this transaction aborts.
    /// Actions run in reverse registration order.
    pub fn register_undo(&self, action: impl FnOnce() + Send + 'static) {
        self.undo_actions.lock().push(Box::new(action));
    }

    /// Register an action run at commit with the commit timestamp.
    pub fn register_commit_action(&self, action: impl FnOnce(Timestamp) + Send + 'static) {
        self.commit_actions.lock().push(Box::new(action));
    }
}

/// Transaction manager - allocates timestamps, tracks the active set, and
/// wakes quiescence waiters whenever a transaction ends.
pub struct TransactionManager {
    /// Global timestamp clock; begin and commit each draw the next tick
    clock: AtomicU64,

    /// Next transaction ID to assign
    next_txn_id: AtomicU64,

    /// Active transactions map (txn_id -> start timestamp)
    active: Mutex<HashMap<u64, Timestamp>>,

    /// Signaled every time a transaction commits or aborts
    txn_ended: Condvar,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            clock: AtomicU64::new(0),
            next_txn_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
            txn_ended: Condvar::new(),
        }
    }

    /// Begin a new transaction.
    pub fn begin(&self) -> Transaction {
        self.begin_with_action(|| {})
    }

    /// Begin a new transaction, running `action` inside the same critical
    /// section that registers the transaction as active.
    pub fn begin_with_action(&self, action: impl FnOnce()) -> Transaction {
        let id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let mut active = self.active.lock();
        let start_ts = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        action();
        active.insert(id, start_ts);
        log::trace!("txn {} begins at ts {}", id, start_ts);
        Transaction {
            id,
            start_ts,
            undo_actions: Mutex::new(Vec::new()),
            commit_actions: Mutex::new(Vec::new()),
        }
    }

    /// Commit a transaction, running its commit actions with the assigned
    /// commit timestamp. Returns that timestamp.
    pub fn commit(&self, txn: &Transaction) -> Timestamp {
        let commit_ts = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let actions = std::mem::take(&mut *txn.commit_actions.lock());
        for action in actions {
            action(commit_ts);
        }
        // Undo actions are dropped; the writes stand.
        txn.undo_actions.lock().clear();
        let mut active = self.active.lock();
        active.remove(&txn.id);
        log::trace!("txn {} commits at ts {}", txn.id, commit_ts);
        drop(active);
        self.txn_ended.notify_all();
        commit_ts
    }

    /// Abort a transaction, undoing its writes in reverse order.
    pub fn abort(&self, txn: &Transaction) {
        let undo = std::mem::take(&mut *txn.undo_actions.lock());
        for action in undo.into_iter().rev() {
            action();
        }
        txn.commit_actions.lock().clear();
        let mut active = self.active.lock();
        active.remove(&txn.id);
        log::trace!("txn {} aborts", txn.id);
        drop(active);
        self.txn_ended.notify_all();
    }

    /// Minimum start timestamp among in-flight transactions; the current
    /// clock value when none are active. Monotonic non-decreasing as old
    /// transactions end.
    pub fn oldest_active_start_ts(&self) -> Timestamp {
        let active = self.active.lock();
        active.values().copied().min().unwrap_or_else(|| self.clock.load(Ordering::SeqCst))
    }

    /// Block until every transaction older than `ts` has ended. Backed by a
    /// condition variable signaled on transaction end rather than a spin on
    /// the oldest-active timestamp.
    pub fn wait_until_oldest_reaches(&self, ts: Timestamp) {
        let mut active = self.active.lock();
        loop {
            let oldest = active.values().copied().min().unwrap_or_else(|| self.clock.load(Ordering::SeqCst));
            if oldest >= ts {
                return;
            }
            self.txn_ended.wait(&mut active);
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_begin_assigns_increasing_timestamps() {
        let tm = TransactionManager::new();
        let t1 = tm.begin();
        let t2 = tm.begin();
        assert!(t2.start_ts() > t1.start_ts());
        assert_eq!(tm.active_count(), 2);
        tm.commit(&t1);
        tm.commit(&t2);
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn test_commit_ts_exceeds_start_ts() {
        let tm = TransactionManager::new();
        let txn = tm.begin();
        let start = txn.start_ts();
        let commit = tm.commit(&txn);
        assert!(commit > start);
    }

    #[test]
    fn test_commit_actions_receive_commit_ts() {
        let tm = TransactionManager::new();
        let txn = tm.begin();
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        txn.register_commit_action(move |ts| *seen2.lock() = Some(ts));
        let commit_ts = tm.commit(&txn);
        assert_eq!(*seen.lock(), Some(commit_ts));
    }

    #[test]
    fn test_abort_runs_undo_in_reverse() {
        let tm = TransactionManager::new();
        let txn = tm.begin();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            txn.register_undo(move || order.lock().push(i));
        }
        tm.abort(&txn);
        assert_eq!(*order.lock(), vec![2, 1, 0]);
    }

    #[test]
    fn test_oldest_active_tracks_minimum() {
        let tm = TransactionManager::new();
        let t1 = tm.begin();
        let t2 = tm.begin();
        assert_eq!(tm.oldest_active_start_ts(), t1.start_ts());
        let t1_start = t1.start_ts();
        tm.commit(&t1);
        assert!(tm.oldest_active_start_ts() > t1_start);
        tm.commit(&t2);
    }

    #[test]
    fn test_quiescence_wait_unblocks() {
        let tm = Arc::new(TransactionManager::new());
        let old_txn = tm.begin();
        let barrier_ts = tm.begin_and_commit_marker();
        let tm2 = tm.clone();
        let waiter = std::thread::spawn(move || tm2.wait_until_oldest_reaches(barrier_ts));
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!waiter.is_finished());
        tm.commit(&old_txn);
        waiter.join().unwrap();
    }

    impl TransactionManager {
        /// Test helper: a committed marker transaction whose commit timestamp
        /// acts as a barrier point.
        fn begin_and_commit_marker(&self) -> Timestamp {
            let txn = self.begin();
            self.commit(&txn)
        }
    }
}
