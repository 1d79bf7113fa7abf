//! Streaming adapter over a delete tracker (spec §6/§4.F).
//!
//! Wraps a [`crate::table::tracker::DeleteTracker`] in a loop that wakes on the table's change
//! watch, drains every new live object and tombstone into a channel,
//! and exposes the receiving half as a `Stream`. Uses
//! `tokio::sync::mpsc` + `tokio_stream::wrappers::UnboundedReceiverStream`
//! rather than pulling in a new `async-stream` dependency.

use std::sync::Arc;

use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::error::CResult;
use crate::table::Table;
use crate::Revision;

/// One observed mutation: a live insert/replace or a tombstone.
#[derive(Debug, Clone)]
pub struct DeleteEvent<T> {
    pub object: Arc<T>,
    pub deleted: bool,
    pub revision: Revision,
}

/// Registers a new delete tracker named `tracker_name` on `table` and
/// returns a stream of every subsequent mutation. The stream ends when
/// `cancel` fires; the tracker is deregistered at that point. Each
/// woken batch is delivered through an unbounded channel so the
/// synchronous `iterate` callback never has to block on a slow
/// consumer mid-batch; the tracker's own mark still only advances once
/// a batch is fully queued, so a dropped receiver simply stops the
/// loop rather than losing events.
pub async fn observe<T: Send + Sync + 'static>(
    db: Arc<Database>,
    table: Table<T>,
    tracker_name: impl Into<String>,
    cancel: CancellationToken,
) -> CResult<UnboundedReceiverStream<DeleteEvent<T>>> {
    let tracker_name = tracker_name.into();
    let mut txn = db.write_txn(&[&table]).await?;
    let tracker = table.delete_tracker(&mut txn, tracker_name)?;
    txn.commit()?;

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let watch = table.change_watch();
            let read = db.read_txn();
            let mut send_failed = false;
            let result = tracker.iterate(&read, |object, deleted, revision| {
                if tx.send(DeleteEvent { object, deleted, revision }).is_err() {
                    send_failed = true;
                }
            });
            drop(read);
            if result.is_err() || send_failed {
                break;
            }
            if !watch.changed_or_cancelled(&cancel).await {
                break;
            }
        }
        tracker.close();
    });

    Ok(UnboundedReceiverStream::new(rx))
}
