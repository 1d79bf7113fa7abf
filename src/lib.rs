//! An in-memory, transactional, multi-version object store built on
//! persistent radix trees (see `SPEC_FULL.md`).
//!
//! Tables are declared with one or more indexes (spec §3); reads go
//! through a cheap, consistent [`txn::ReadTxn`] snapshot or against an
//! in-progress [`txn::WriteTxn`]'s own staged state; writes are
//! batched per-table into a [`txn::WriteTxn`] and published atomically
//! on commit. Deletions optionally leave a tombstone behind for any
//! active [`table::tracker::DeleteTracker`], reclaimed by a background
//! GC once every tracker has observed it.

pub mod db;
pub mod error;
pub mod index;
pub mod key;
pub mod metrics;
pub mod observer;
pub mod snapshot;
pub mod table;
pub mod tree;
pub mod txn;
pub mod watch;

/// A table-scoped, monotonically increasing mutation counter. Assigned
/// by every insert/delete inside a write transaction (spec §3).
pub type Revision = u64;

pub use db::{Database, GcConfig};
pub use error::{CResult, Error};
pub use index::IndexSchema;
pub use observer::{observe, DeleteEvent};
pub use snapshot::{dump_database_json, dump_table_json, JsonDumpable};
pub use table::query::Query;
pub use table::schema::TableSchema;
pub use table::tracker::{DeleteTracker, IterateError};
pub use table::{ErasedTable, Table, TableStats};
pub use txn::{ReadTxn, Readable, WriteTxn};
pub use watch::Watch;
