//! Delete trackers and the graveyard they read from (spec §4.F).
//!
//! A tracker's `mark` is the highest revision it has fully observed.
//! `iterate` walks both the live (by revision) and graveyard trees for
//! revisions past the mark, in ascending revision order, delivering
//! live objects with `deleted = false` and tombstones with `deleted =
//! true`. On success the mark advances to the highest revision seen;
//! on a callback error it advances only past the last revision that
//! succeeded, so the failed item (and everything after it) is
//! redelivered on the next call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Error;
use crate::table::Table;
use crate::txn::Readable;
use crate::Revision;

/// Either a core error (bad transaction, unknown table) or the user
/// callback's own error, surfaced verbatim (spec §7).
#[derive(Debug)]
pub enum IterateError<E> {
    Core(Error),
    Callback(E),
}

pub struct DeleteTracker<T> {
    table: Table<T>,
    name: String,
    mark: Arc<AtomicU64>,
    closed: bool,
}

impl<T> DeleteTracker<T> {
    pub(crate) fn new(table: Table<T>, name: String, mark: Arc<AtomicU64>) -> Self {
        DeleteTracker { table, name, mark, closed: false }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mark(&self) -> Revision {
        self.mark.load(Ordering::SeqCst)
    }

    /// Manually advances (or rewinds) the mark without iterating.
    pub fn mark_to(&self, rev: Revision) {
        self.mark.store(rev, Ordering::SeqCst);
    }

    /// Deregisters this tracker. Its graveyard entries are no longer
    /// held back by it; a subsequent GC pass may reclaim them.
    pub fn close(mut self) {
        self.closed = true;
        self.table.remove_tracker(&self.name);
    }

    /// Delivers every live object and tombstone with revision past the
    /// mark, in ascending revision order, then advances the mark. The
    /// callback cannot fail; see [`Self::iterate_with_error`] for one
    /// that can.
    pub fn iterate<R: Readable>(&self, txn: &R, mut f: impl FnMut(Arc<T>, bool, Revision)) -> Result<(), Error> {
        match self.iterate_with_error::<R, std::convert::Infallible>(txn, |o, d, r| {
            f(o, d, r);
            Ok(())
        }) {
            Ok(()) => Ok(()),
            Err(IterateError::Core(e)) => Err(e),
            Err(IterateError::Callback(never)) => match never {},
        }
    }

    pub fn iterate_with_error<R: Readable, E>(
        &self,
        txn: &R,
        mut f: impl FnMut(Arc<T>, bool, Revision) -> Result<(), E>,
    ) -> Result<(), IterateError<E>> {
        let mark = self.mark();
        let state = txn
            .table_state::<T>(self.table.id(), self.table.name())
            .map_err(IterateError::Core)?;

        let (live, _w1) = state.revisions.iter_all();
        let (graveyard, _w2) = state.graveyard.iter_all();

        let mut highest_ok = mark;
        for (_, entry) in live.into_iter().filter(|(_, e)| e.revision > mark) {
            if let Err(e) = f(entry.object.clone(), false, entry.revision) {
                self.mark.store(highest_ok, Ordering::SeqCst);
                return Err(IterateError::Callback(e));
            }
            highest_ok = entry.revision;
        }
        for (_, entry) in graveyard.into_iter().filter(|(_, e)| e.revision > mark) {
            if let Err(e) = f(entry.object.clone(), true, entry.revision) {
                self.mark.store(highest_ok, Ordering::SeqCst);
                return Err(IterateError::Callback(e));
            }
            highest_ok = entry.revision;
        }
        self.mark.store(highest_ok, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::index::IndexSchema;
    use crate::table::query::Query;
    use crate::table::schema::TableSchema;

    #[derive(Clone, Debug, PartialEq)]
    struct Item(u32);

    fn schema() -> TableSchema<Item> {
        TableSchema::new(IndexSchema::unique("id", |i: &Item| i.0.to_be_bytes().to_vec())).unwrap()
    }

    #[tokio::test]
    async fn reinsert_between_two_deletes_evicts_the_superseded_tombstone() {
        let db = Database::new(Default::default());
        let items = db.register_table("items", schema()).unwrap();

        let mut txn = db.write_txn(&[&items]).await.unwrap();
        let t1 = items.delete_tracker(&mut txn, "t1").unwrap();
        let t2 = items.delete_tracker(&mut txn, "t2").unwrap();
        items.insert(&mut txn, Item(71)).unwrap();
        items.delete(&mut txn, &Item(71)).unwrap();
        items.insert(&mut txn, Item(71)).unwrap();
        items.delete(&mut txn, &Item(71)).unwrap();
        txn.commit().unwrap();

        let read = db.read_txn();
        let mut seen1 = Vec::new();
        t1.iterate(&read, |obj, deleted, rev| seen1.push((obj.0, deleted, rev))).unwrap();
        let mut seen2 = Vec::new();
        t2.iterate(&read, |obj, deleted, rev| seen2.push((obj.0, deleted, rev))).unwrap();

        // A primary key lives in at most one of {primary, graveyard}: the
        // reinsert between the two deletes evicts the first tombstone, so
        // only the final delete survives to be observed.
        assert_eq!(seen1, seen2);
        let tombstone_count = seen1.iter().filter(|(_, deleted, _)| *deleted).count();
        assert_eq!(tombstone_count, 1);
        assert_eq!(items.graveyard_len(), 1);

        assert!(items.get(&read, Query::by_index("id", &71u32.to_be_bytes())).unwrap().0.is_empty());
    }

    #[tokio::test]
    async fn callback_error_does_not_advance_mark_past_the_failing_item() {
        let db = Database::new(Default::default());
        let items = db.register_table("items", schema()).unwrap();
        let mut txn = db.write_txn(&[&items]).await.unwrap();
        let tracker = items.delete_tracker(&mut txn, "t").unwrap();
        items.insert(&mut txn, Item(1)).unwrap();
        items.insert(&mut txn, Item(2)).unwrap();
        txn.commit().unwrap();

        let read = db.read_txn();
        let mut seen = 0u32;
        let result = tracker.iterate_with_error::<_, &'static str>(&read, |_, _, _| {
            seen += 1;
            if seen == 2 {
                Err("boom")
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(IterateError::Callback("boom"))));
        assert_eq!(tracker.mark(), 0);

        let mut redelivered = 0;
        tracker.iterate(&read, |_, _, _| redelivered += 1).unwrap();
        assert_eq!(redelivered, 2);
    }
}
