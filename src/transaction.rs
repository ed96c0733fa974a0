//! Transaction manager: debounced batching of row mutations against the indexed store.
//!
//! Debouncing is realized without blocking the caller's thread: a background timer thread parks
//! until `debounce_ms` after the most recent enqueue, then signals a drain-due flag over a
//! channel. Nothing but that signal crosses threads -- the actual drain (mutating the store,
//! invoking subscribers) always runs on whichever thread calls [`TransactionManager::pump`].

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::row::{Row, RowId};
use crate::store::IndexedDataStore;
use crate::value::CellValue;

pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

enum Op {
    Add { rows: Vec<Row>, at_index: Option<usize> },
    Remove { ids: Vec<RowId> },
    UpdateCell { id: RowId, field: String, value: CellValue },
    UpdateRow { id: RowId, patch: Vec<(String, CellValue)> },
}

/// Aggregate counts produced by a drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

impl TransactionSummary {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

struct Deadline {
    due_at: Instant,
}

/// Shared between the manager and its timer thread: the instant the timer should next fire.
/// Rescheduling just overwrites the deadline and notifies; the timer thread always re-reads it
/// under the lock, so a superseded deadline is simply never observed.
struct TimerState {
    deadline: Mutex<Option<Deadline>>,
    condvar: Condvar,
    shutdown: Mutex<bool>,
}

pub struct TransactionManager {
    pending: Mutex<Vec<Op>>,
    debounce_ms: u64,
    timer: Arc<TimerState>,
    drain_due_rx: Receiver<()>,
    drain_due_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl TransactionManager {
    pub fn new(debounce_ms: u64) -> Self {
        let timer = Arc::new(TimerState { deadline: Mutex::new(None), condvar: Condvar::new(), shutdown: Mutex::new(false) });
        let (drain_due_tx, drain_due_rx) = mpsc::channel();

        let thread_timer = timer.clone();
        let thread_tx = drain_due_tx.clone();
        let thread = std::thread::spawn(move || Self::run_timer(thread_timer, thread_tx));

        Self { pending: Mutex::new(Vec::new()), debounce_ms, timer, drain_due_rx, drain_due_tx, thread: Some(thread) }
    }

    fn run_timer(timer: Arc<TimerState>, drain_due_tx: Sender<()>) {
        loop {
            let mut guard = timer.deadline.lock().unwrap();
            loop {
                if *timer.shutdown.lock().unwrap() {
                    return;
                }
                match &*guard {
                    None => {
                        guard = timer.condvar.wait(guard).unwrap();
                    }
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline.due_at {
                            break;
                        }
                        let (g, timeout) = timer.condvar.wait_timeout(guard, deadline.due_at - now).unwrap();
                        guard = g;
                        let _ = timeout;
                    }
                }
            }
            if guard.take().is_some() {
                drop(guard);
                let _ = drain_due_tx.send(());
            }
        }
    }

    fn reschedule(&self) {
        let mut deadline = self.timer.deadline.lock().unwrap();
        *deadline = Some(Deadline { due_at: Instant::now() + Duration::from_millis(self.debounce_ms) });
        self.timer.condvar.notify_all();
    }

    pub fn enqueue_add(&self, rows: Vec<Row>, at_index: Option<usize>) {
        self.pending.lock().unwrap().push(Op::Add { rows, at_index });
        self.reschedule();
    }

    pub fn enqueue_remove(&self, ids: Vec<RowId>) {
        self.pending.lock().unwrap().push(Op::Remove { ids });
        self.reschedule();
    }

    pub fn enqueue_update_cell(&self, id: RowId, field: impl Into<String>, value: CellValue) {
        self.pending.lock().unwrap().push(Op::UpdateCell { id, field: field.into(), value });
        self.reschedule();
    }

    pub fn enqueue_update_row(&self, id: RowId, patch: Vec<(String, CellValue)>) {
        self.pending.lock().unwrap().push(Op::UpdateRow { id, patch });
        self.reschedule();
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.lock().unwrap().is_empty()
    }

    /// Drains any drain-due signals from the timer thread and, if one arrived, flushes. Must be
    /// called at the start of every public façade operation; never performs the drain itself
    /// outside of this call.
    pub fn pump(&self, store: &mut IndexedDataStore) -> Option<TransactionSummary> {
        let mut fired = false;
        while self.drain_due_rx.try_recv().is_ok() {
            fired = true;
        }
        if fired { self.flush(store) } else { None }
    }

    /// Forces an immediate drain regardless of the debounce timer.
    pub fn flush(&self, store: &mut IndexedDataStore) -> Option<TransactionSummary> {
        let span = tracing::debug_span!("transaction_drain");
        let _enter = span.enter();

        let ops: Vec<Op> = std::mem::take(&mut *self.pending.lock().unwrap());
        if ops.is_empty() {
            return None;
        }
        *self.timer.deadline.lock().unwrap() = None;

        let mut summary = TransactionSummary::default();
        for op in ops {
            match op {
                Op::Add { rows, at_index } => {
                    summary.added += rows.len();
                    store.insert(rows, at_index);
                }
                Op::Remove { ids } => {
                    summary.removed += store.remove(&ids);
                }
                Op::UpdateCell { id, field, value } => {
                    if store.update_cell(id, &field, value) {
                        summary.updated += 1;
                    }
                }
                Op::UpdateRow { id, patch } => {
                    if store.update_row(id, &patch) {
                        summary.updated += 1;
                    }
                }
            }
        }
        if summary.is_empty() { None } else { Some(summary) }
    }
}

impl Drop for TransactionManager {
    fn drop(&mut self) {
        *self.timer.shutdown.lock().unwrap() = true;
        self.timer.condvar.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let _ = &self.drain_due_tx;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;

    #[test]
    fn flush_forces_immediate_drain_and_aggregates_counts() {
        let manager = TransactionManager::new(DEFAULT_DEBOUNCE_MS);
        let mut store = IndexedDataStore::new();
        manager.enqueue_add(vec![Row::new(1, json!({})), Row::new(2, json!({}))], None);
        manager.enqueue_remove(vec![1]);
        assert!(manager.has_pending());

        let summary = manager.flush(&mut store).unwrap();
        assert_eq!(summary, TransactionSummary { added: 2, removed: 1, updated: 0 });
        assert_eq!(store.get_total_row_count(), 1);
        assert!(!manager.has_pending());
    }

    #[test]
    fn flush_with_nothing_pending_returns_none() {
        let manager = TransactionManager::new(DEFAULT_DEBOUNCE_MS);
        let mut store = IndexedDataStore::new();
        assert!(manager.flush(&mut store).is_none());
    }

    #[test]
    fn pump_drains_only_after_debounce_elapses() {
        let manager = TransactionManager::new(20);
        let mut store = IndexedDataStore::new();
        manager.enqueue_add(vec![Row::new(1, json!({}))], None);

        assert!(manager.pump(&mut store).is_none());
        assert!(manager.has_pending());

        sleep(Duration::from_millis(80));
        let summary = manager.pump(&mut store);
        assert_eq!(summary, Some(TransactionSummary { added: 1, removed: 0, updated: 0 }));
        assert!(!manager.has_pending());
    }

    #[derive(Debug, Clone, Copy)]
    enum FuzzOp {
        Add,
        Remove(usize),
    }

    proptest::proptest! {
        /// Invariant 8: after a drain, `added <= sum of per-op add counts`, `removed <= sum of
        /// per-op remove counts`, and `total_rows` reflects the net of what actually landed.
        #[test]
        fn drain_counts_never_exceed_enqueued_ops(ops in proptest::collection::vec(
            proptest::prop_oneof![
                proptest::strategy::Just(FuzzOp::Add),
                (0usize..200).prop_map(FuzzOp::Remove),
            ],
            0..100,
        )) {
            let manager = TransactionManager::new(DEFAULT_DEBOUNCE_MS);
            let mut store = IndexedDataStore::new();
            let mut next_id: i64 = 0;
            let mut add_ops = 0usize;
            let mut remove_ops = 0usize;

            for op in &ops {
                match op {
                    FuzzOp::Add => {
                        manager.enqueue_add(vec![Row::new(next_id, json!({}))], None);
                        next_id += 1;
                        add_ops += 1;
                    }
                    FuzzOp::Remove(target) => {
                        // Every id is unique per add, so a single remove op matches at most one row.
                        manager.enqueue_remove(vec![*target as i64]);
                        remove_ops += 1;
                    }
                }
            }

            let summary = manager.flush(&mut store).unwrap_or_default();
            proptest::prop_assert!(summary.added <= add_ops);
            proptest::prop_assert!(summary.removed <= remove_ops);
            proptest::prop_assert_eq!(store.get_total_row_count() as i64, summary.added as i64 - summary.removed as i64);
        }
    }
}
