//! Transactions (spec §4.D).
//!
//! `ReadTxn` is a shallow, `Arc`-cheap snapshot of every table's current
//! committed state, captured at the instant it is created, so a reader
//! never observes a write that commits after it started. `WriteTxn`
//! acquires the write lock of every table it names, in table-id order
//! (so two transactions naming the same tables in a different order
//! never deadlock), clones each table's current state into a staging
//! area, and publishes all of them atomically on commit — every
//! touched table's `ArcSwap` is updated before any of their replaced
//! watches are closed, so a watcher that wakes on one table's change
//! already sees every other table's new state too.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OwnedMutexGuard;

use crate::error::{CResult, Error};
use crate::metrics::DbMetrics;
use crate::table::{ErasedTable, TableId, TableState};
use crate::watch::Watch;

/// Implemented by both [`ReadTxn`] and [`WriteTxn`] so `Table` read
/// operations work uniformly inside either: a write transaction sees
/// its own uncommitted writes, matching "read your own writes" within
/// a single transaction (spec §4.D).
pub trait Readable {
    #[doc(hidden)]
    fn table_state<T: Send + Sync + 'static>(&self, id: TableId, name: &str) -> CResult<&TableState<T>>;
}

/// A consistent snapshot across every registered table, captured when
/// the transaction was created.
pub struct ReadTxn {
    snapshots: HashMap<TableId, Box<dyn Any + Send + Sync>>,
}

impl ReadTxn {
    pub(crate) fn new(tables: &[Arc<dyn ErasedTable>]) -> Self {
        let snapshots = tables.iter().map(|t| (t.id(), t.fresh_staged())).collect();
        ReadTxn { snapshots }
    }
}

impl Readable for ReadTxn {
    fn table_state<T: Send + Sync + 'static>(&self, id: TableId, name: &str) -> CResult<&TableState<T>> {
        self.snapshots
            .get(&id)
            .ok_or_else(|| Error::TableNotRegistered(name.to_string()))?
            .downcast_ref::<TableState<T>>()
            .ok_or_else(|| Error::Internal("table state type mismatch".into()))
    }
}

/// A single-writer transaction spanning the tables it was opened with.
/// Every `Table` mutation goes through this staging area; nothing is
/// visible to other transactions until [`WriteTxn::commit`].
pub struct WriteTxn {
    tables: HashMap<TableId, Arc<dyn ErasedTable>>,
    staged: HashMap<TableId, Box<dyn Any + Send + Sync>>,
    to_close: Vec<Arc<Watch>>,
    _guards: Vec<OwnedMutexGuard<()>>,
    closed: bool,
    metrics: DbMetrics,
    opened_at: Instant,
}

impl WriteTxn {
    pub(crate) fn new(
        tables: HashMap<TableId, Arc<dyn ErasedTable>>,
        guards: Vec<OwnedMutexGuard<()>>,
        metrics: DbMetrics,
    ) -> Self {
        let staged = tables.iter().map(|(id, t)| (*id, t.fresh_staged())).collect();
        WriteTxn {
            tables,
            staged,
            to_close: Vec::new(),
            _guards: guards,
            closed: false,
            metrics,
            opened_at: Instant::now(),
        }
    }

    #[doc(hidden)]
    pub fn state_mut<T: Send + Sync + 'static>(&mut self, id: TableId, name: &str) -> CResult<&mut TableState<T>> {
        if self.closed {
            return Err(Error::TransactionClosed);
        }
        self.staged
            .get_mut(&id)
            .ok_or_else(|| Error::TableNotRegistered(name.to_string()))?
            .downcast_mut::<TableState<T>>()
            .ok_or_else(|| Error::Internal("table state type mismatch".into()))
    }

    #[doc(hidden)]
    pub fn state_ref<T: Send + Sync + 'static>(&self, id: TableId, name: &str) -> CResult<&TableState<T>> {
        if self.closed {
            return Err(Error::TransactionClosed);
        }
        self.staged
            .get(&id)
            .ok_or_else(|| Error::TableNotRegistered(name.to_string()))?
            .downcast_ref::<TableState<T>>()
            .ok_or_else(|| Error::Internal("table state type mismatch".into()))
    }

    #[doc(hidden)]
    pub fn to_close_mut(&mut self) -> &mut Vec<Arc<Watch>> {
        &mut self.to_close
    }

    /// Publishes every touched table's staged state atomically, then
    /// closes every watch that was replaced along the way.
    pub fn commit(mut self) -> CResult<()> {
        if self.closed {
            return Err(Error::TransactionClosed);
        }
        self.closed = true;
        let tables = self.staged.len();
        for (id, staged) in self.staged.drain() {
            let table = self.tables.get(&id).expect("staged table always has a matching handle");
            table.commit_erased(staged);
        }
        for watch in self.to_close.drain(..) {
            watch.close();
        }
        log::debug!("write txn committed ({tables} table(s) touched)");
        Ok(())
    }

    /// Discards every staged change. No table is touched; its
    /// committed state is exactly as it was before this transaction
    /// began.
    pub fn abort(mut self) {
        self.closed = true;
        log::debug!("write txn aborted ({} table(s) staged)", self.staged.len());
    }
}

impl Readable for WriteTxn {
    fn table_state<T: Send + Sync + 'static>(&self, id: TableId, name: &str) -> CResult<&TableState<T>> {
        self.state_ref(id, name)
    }
}

impl Drop for WriteTxn {
    fn drop(&mut self) {
        // An un-committed, un-aborted transaction is simply dropped:
        // its mutex guards release and nothing it staged was ever
        // published. `commit`/`abort` both set `closed` first so this
        // is a no-op in the common case. Duration is recorded here,
        // once, regardless of which of the three paths got us here.
        self.closed = true;
        self.metrics.observe_write_txn_duration(self.opened_at.elapsed());
    }
}
