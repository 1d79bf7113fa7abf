//! The embedding surface (spec §6): table registration, transactions,
//! and the background graveyard GC lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{CResult, Error};
use crate::metrics::DbMetrics;
use crate::table::schema::TableSchema;
use crate::table::{ErasedTable, Table, TableId};
use crate::txn::{ReadTxn, WriteTxn};

/// Tunables for the background graveyard sweep (spec §4.F). Deserializable
/// `confy`-style: every field is optional, falling back to `Default`,
/// so an embedder can load it from a config file or env with no
/// required keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Minimum spacing between GC sweeps. The embedder can lower this
    /// at runtime via [`Database::set_gc_rate_limit_interval`].
    pub rate_limit_interval: Duration,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig { rate_limit_interval: Duration::from_secs(30) }
    }
}

struct GcState {
    interval: Mutex<Duration>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// The database: an open-ended registry of independently-locked
/// tables, a shared metrics surface, and a background GC task the
/// embedder starts and stops around its own process lifecycle.
pub struct Database {
    tables: Mutex<HashMap<TableId, Arc<dyn ErasedTable>>>,
    names: Mutex<HashMap<String, TableId>>,
    next_id: AtomicU32,
    metrics: DbMetrics,
    gc: GcState,
    gc_sweeps_total: AtomicU64,
}

impl Database {
    pub fn new(gc_config: GcConfig) -> Self {
        Database {
            tables: Mutex::new(HashMap::new()),
            names: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(0),
            metrics: DbMetrics::new().expect("metrics registration is infallible for a fresh registry"),
            gc: GcState {
                interval: Mutex::new(gc_config.rate_limit_interval),
                cancel: CancellationToken::new(),
                handle: Mutex::new(None),
            },
            gc_sweeps_total: AtomicU64::new(0),
        }
    }

    pub fn metrics(&self) -> &DbMetrics {
        &self.metrics
    }

    /// Registers a new table. `name` must be unique across this
    /// database.
    pub fn register_table<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        schema: TableSchema<T>,
    ) -> CResult<Table<T>> {
        let name = name.into();
        let mut names = self.names.lock().expect("table name registry poisoned");
        if names.contains_key(&name) {
            return Err(Error::Internal(format!("table {name:?} is already registered")));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let table = Table::new(id, name.clone(), schema);
        log::info!("registered table {name:?} (id={id})");
        names.insert(name, id);
        self.tables
            .lock()
            .expect("table registry poisoned")
            .insert(id, Arc::new(table.clone()));
        Ok(table)
    }

    /// A shallow, consistent snapshot across every registered table,
    /// captured right now.
    pub fn read_txn(&self) -> ReadTxn {
        let tables: Vec<Arc<dyn ErasedTable>> =
            self.tables.lock().expect("table registry poisoned").values().cloned().collect();
        ReadTxn::new(&tables)
    }

    /// Opens a write transaction spanning exactly the given tables.
    /// Acquires each table's write lock in table-id order (not the
    /// caller's order) so two overlapping transactions never deadlock.
    /// Locks are taken with the mutex's async `lock_owned`, not
    /// `blocking_lock_owned`, so this is safe to call directly from an
    /// async task instead of needing a `spawn_blocking` wrapper.
    pub async fn write_txn(&self, tables: &[&dyn ErasedTable]) -> CResult<WriteTxn> {
        let registry = self.tables.lock().expect("table registry poisoned");
        let mut resolved: Vec<Arc<dyn ErasedTable>> = Vec::with_capacity(tables.len());
        for t in tables {
            let handle = registry
                .get(&t.id())
                .ok_or_else(|| Error::TableNotRegistered(t.name().to_string()))?
                .clone();
            resolved.push(handle);
        }
        drop(registry);

        resolved.sort_by_key(|t| t.id());

        let started = Instant::now();
        let mut guards = Vec::with_capacity(resolved.len());
        for t in &resolved {
            guards.push(t.write_lock_handle().lock_owned().await);
        }
        self.metrics.observe_write_txn(started.elapsed());

        let map: HashMap<TableId, Arc<dyn ErasedTable>> = resolved.into_iter().map(|t| (t.id(), t)).collect();
        Ok(WriteTxn::new(map, guards, self.metrics.clone()))
    }

    pub fn set_gc_rate_limit_interval(&self, interval: Duration) {
        *self.gc.interval.lock().expect("gc interval lock poisoned") = interval;
    }

    /// Dumps `tables` (all, or a caller-selected subset) to `out` as a
    /// single JSON object keyed by table name, against one consistent
    /// read snapshot of this database (spec §4.H).
    pub fn dump_json_to(&self, tables: &[&dyn crate::snapshot::JsonDumpable], out: impl std::io::Write) -> CResult<()> {
        let txn = self.read_txn();
        crate::snapshot::dump_database_json(&txn, tables, out)
    }

    /// Runs one graveyard sweep across every registered table right
    /// now, returning the total number of tombstones reclaimed. Used
    /// by the background loop and directly by tests.
    pub fn gc_once(&self) -> usize {
        let tables: Vec<Arc<dyn ErasedTable>> =
            self.tables.lock().expect("table registry poisoned").values().cloned().collect();
        let started = Instant::now();
        let removed: usize = tables.iter().map(|t| t.gc_once()).sum();
        self.gc_sweeps_total.fetch_add(1, Ordering::Relaxed);
        self.metrics.observe_gc_sweep(started.elapsed(), removed);
        for t in &tables {
            self.metrics.refresh_table_stats(t.name(), t.table_stats());
        }
        removed
    }

    pub fn gc_sweeps_total(&self) -> u64 {
        self.gc_sweeps_total.load(Ordering::Relaxed)
    }

    /// Starts the background GC loop. Idempotent: calling it twice
    /// while already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.gc.handle.lock().expect("gc handle lock poisoned");
        if handle.is_some() {
            return;
        }
        let db = self.clone();
        let cancel = self.gc.cancel.clone();
        *handle = Some(tokio::spawn(async move {
            loop {
                let interval = *db.gc.interval.lock().expect("gc interval lock poisoned");
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => break,
                }
                // gc_once() takes each table's write lock with
                // blocking_lock(), which panics if called from inside
                // an async task; spawn_blocking escapes this task's
                // async context before touching it.
                let db2 = db.clone();
                let removed = match tokio::task::spawn_blocking(move || db2.gc_once()).await {
                    Ok(removed) => removed,
                    Err(_) => break,
                };
                if removed > 0 {
                    log::info!("graveyard gc reclaimed {removed} tombstones");
                }
            }
        }));
    }

    /// Signals the background GC loop to stop and waits for it to
    /// exit. Safe to call even if `start` was never called.
    pub async fn stop(&self) {
        self.gc.cancel.cancel();
        let handle = self.gc.handle.lock().expect("gc handle lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexSchema;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    struct Item(u32);

    fn schema() -> TableSchema<Item> {
        TableSchema::new(IndexSchema::unique("id", |i: &Item| i.0.to_be_bytes().to_vec())).unwrap()
    }

    #[test]
    fn registering_a_duplicate_name_fails() {
        let db = Database::new(GcConfig::default());
        db.register_table("items", schema()).unwrap();
        assert!(db.register_table("items", schema()).is_err());
    }

    #[tokio::test]
    async fn write_txn_on_unregistered_table_fails() {
        let db1 = Database::new(GcConfig::default());
        let db2 = Database::new(GcConfig::default());
        let items = db1.register_table("items", schema()).unwrap();
        assert!(matches!(db2.write_txn(&[&items]).await, Err(Error::TableNotRegistered(_))));
    }

    #[tokio::test]
    async fn gc_once_reclaims_tombstones_with_no_active_trackers() {
        let db = Database::new(GcConfig::default());
        let items = db.register_table("items", schema()).unwrap();
        let mut txn = db.write_txn(&[&items]).await.unwrap();
        let tracker = items.delete_tracker(&mut txn, "t").unwrap();
        items.insert(&mut txn, Item(1)).unwrap();
        items.delete(&mut txn, &Item(1)).unwrap();
        txn.commit().unwrap();
        assert_eq!(items.graveyard_len(), 1);

        tracker.close();
        // gc_once() takes each table's write lock with blocking_lock(),
        // which panics if called directly from inside this async test body.
        let removed = tokio::task::spawn_blocking(move || db.gc_once()).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(items.graveyard_len(), 0);
    }

    #[tokio::test]
    async fn start_and_stop_is_idempotent_and_clean() {
        let db = Arc::new(Database::new(GcConfig {
            rate_limit_interval: Duration::from_millis(5),
        }));
        db.start();
        db.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        db.stop().await;
    }

    #[derive(Clone, Debug, serde::Serialize)]
    struct Named {
        id: u32,
    }

    #[tokio::test]
    async fn dump_json_to_wraps_a_fresh_read_snapshot() {
        let db = Database::new(GcConfig::default());
        let items = db
            .register_table(
                "items",
                TableSchema::new(IndexSchema::unique("id", |i: &Named| i.id.to_be_bytes().to_vec())).unwrap(),
            )
            .unwrap();
        let mut txn = db.write_txn(&[&items]).await.unwrap();
        items.insert(&mut txn, Named { id: 1 }).unwrap();
        txn.commit().unwrap();

        let mut buf = Vec::new();
        db.dump_json_to(&[&items], &mut buf).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["items"][0]["object"]["id"], 1);
    }
}
