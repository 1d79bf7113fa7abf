//! Prometheus metrics (spec §6).
//!
//! The teacher crate never depended on a metrics stack; this is
//! enriched from `clockworklabs-SpacetimeDB`'s `crates/metrics` /
//! `db_metrics` module, which wraps the `prometheus` crate for exactly
//! this surface (table row counts, transaction timings). We depend on
//! `prometheus` directly rather than SpacetimeDB's internal
//! `metrics_group!` macro, which isn't a fetchable crate on its own.
//!
//! Unlike SpacetimeDB's process-wide static registry, each `Database`
//! owns its own `Registry` (spec §6 "process-wide state" note: metrics
//! are scoped to the embedding process's database instance, not a
//! global singleton), so two databases in the same process never
//! collide on metric names.

use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGaugeVec, Opts, Registry};

use crate::error::{CResult, Error};
use crate::table::TableStats;

#[derive(Clone)]
pub struct DbMetrics {
    registry: Registry,
    table_rows: IntGaugeVec,
    table_revision: IntGaugeVec,
    graveyard_rows: IntGaugeVec,
    tracker_count: IntGaugeVec,
    write_txn_total: IntCounter,
    write_txn_acquire_seconds: Histogram,
    write_txn_duration_seconds: Histogram,
    gc_sweeps_total: IntCounter,
    gc_tombstones_reclaimed_total: IntCounter,
    gc_duration_seconds: Histogram,
}

impl DbMetrics {
    pub fn new() -> CResult<Self> {
        let registry = Registry::new();
        let table_rows = IntGaugeVec::new(
            Opts::new("statedb_table_rows", "Live objects currently stored in a table's primary index"),
            &["table"],
        )
        .map_err(prom_err)?;
        let table_revision = IntGaugeVec::new(
            Opts::new("statedb_table_revision", "Next revision a table's write transaction will assign"),
            &["table"],
        )
        .map_err(prom_err)?;
        let graveyard_rows = IntGaugeVec::new(
            Opts::new("statedb_graveyard_rows", "Tombstones awaiting GC in a table's graveyard"),
            &["table"],
        )
        .map_err(prom_err)?;
        let tracker_count =
            IntGaugeVec::new(Opts::new("statedb_tracker_count", "Active delete trackers on a table"), &["table"])
                .map_err(prom_err)?;
        let write_txn_total =
            IntCounter::new("statedb_write_txn_total", "Write transactions opened").map_err(prom_err)?;
        let write_txn_acquire_seconds = Histogram::with_opts(HistogramOpts::new(
            "statedb_write_txn_acquire_seconds",
            "Time spent acquiring every table lock a write transaction named",
        ))
        .map_err(prom_err)?;
        let write_txn_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "statedb_write_txn_duration_seconds",
            "Time a write transaction stays open, from acquisition to commit/abort/drop",
        ))
        .map_err(prom_err)?;
        let gc_sweeps_total =
            IntCounter::new("statedb_gc_sweeps_total", "Graveyard GC sweeps performed").map_err(prom_err)?;
        let gc_tombstones_reclaimed_total = IntCounter::new(
            "statedb_gc_tombstones_reclaimed_total",
            "Tombstones removed from graveyards across all GC sweeps",
        )
        .map_err(prom_err)?;
        let gc_duration_seconds =
            Histogram::with_opts(HistogramOpts::new("statedb_gc_duration_seconds", "Duration of a GC sweep across all tables"))
                .map_err(prom_err)?;

        for collector in [
            Box::new(table_rows.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(table_revision.clone()),
            Box::new(graveyard_rows.clone()),
            Box::new(tracker_count.clone()),
            Box::new(write_txn_total.clone()),
            Box::new(write_txn_acquire_seconds.clone()),
            Box::new(write_txn_duration_seconds.clone()),
            Box::new(gc_sweeps_total.clone()),
            Box::new(gc_tombstones_reclaimed_total.clone()),
            Box::new(gc_duration_seconds.clone()),
        ] {
            registry.register(collector).map_err(prom_err)?;
        }

        Ok(DbMetrics {
            registry,
            table_rows,
            table_revision,
            graveyard_rows,
            tracker_count,
            write_txn_total,
            write_txn_acquire_seconds,
            write_txn_duration_seconds,
            gc_sweeps_total,
            gc_tombstones_reclaimed_total,
            gc_duration_seconds,
        })
    }

    /// The registry an embedder hands to its own metrics exporter.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn observe_write_txn(&self, acquire: Duration) {
        self.write_txn_total.inc();
        self.write_txn_acquire_seconds.observe(acquire.as_secs_f64());
    }

    pub(crate) fn observe_write_txn_duration(&self, duration: Duration) {
        self.write_txn_duration_seconds.observe(duration.as_secs_f64());
    }

    pub(crate) fn observe_gc_sweep(&self, duration: Duration, tombstones_reclaimed: usize) {
        self.gc_sweeps_total.inc();
        self.gc_tombstones_reclaimed_total.inc_by(tombstones_reclaimed as u64);
        self.gc_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn refresh_table_stats(&self, table_name: &str, stats: TableStats) {
        self.table_rows.with_label_values(&[table_name]).set(stats.live_count as i64);
        self.table_revision.with_label_values(&[table_name]).set(stats.revision as i64);
        self.graveyard_rows.with_label_values(&[table_name]).set(stats.graveyard_count as i64);
        self.tracker_count.with_label_values(&[table_name]).set(stats.tracker_count as i64);
    }
}

fn prom_err(e: prometheus::Error) -> Error {
    Error::Internal(format!("prometheus: {e}"))
}
