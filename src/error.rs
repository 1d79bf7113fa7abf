use std::fmt;

use crate::Revision;

/// Errors returned by the core. Mirrors the sentinels named in the
/// embedding contract (`TransactionClosed`, `ObjectNotFound`, ...) plus
/// a couple of internal/encoding variants inherited from the storage
/// layer this crate grew out of.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// An operation was attempted on a transaction that already committed
    /// or aborted.
    TransactionClosed,

    /// `CompareAndSwap` on a primary key that does not exist.
    ObjectNotFound,

    /// A compare-and-X call's expected revision did not match the
    /// object's current revision. Carries the revision actually stored,
    /// so the caller can decide whether to retry.
    RevisionNotEqual { current: Revision },

    /// `DeleteTracker` registration used a name already active on the
    /// table.
    DuplicateTrackerName(String),

    /// A write transaction touched a table it never declared, or a
    /// table handle from a different database.
    TableNotRegistered(String),

    /// An index declared on a table collided with an existing index
    /// name.
    DuplicateIndexName(String),

    /// Encoding/decoding a key or a JSON snapshot failed.
    Encoding(String),

    /// Catch-all for invariant violations surfaced as ordinary errors
    /// rather than a process abort (see spec §7 policy).
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TransactionClosed => write!(f, "transaction is closed"),
            Error::ObjectNotFound => write!(f, "object not found"),
            Error::RevisionNotEqual { current } => {
                write!(f, "revision mismatch: current revision is {current}")
            }
            Error::DuplicateTrackerName(name) => {
                write!(f, "delete tracker {name:?} is already registered on this table")
            }
            Error::TableNotRegistered(name) => {
                write!(f, "table {name:?} is not registered for this write transaction")
            }
            Error::DuplicateIndexName(name) => {
                write!(f, "index {name:?} is already declared on this table")
            }
            Error::Encoding(msg) => write!(f, "encoding error: {msg}"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Crate-wide result alias: every fallible signature in this crate
/// returns it.
pub type CResult<T> = Result<T, Error>;
