//! Tables (spec §4.C/§4.D invariants 1-4).
//!
//! A table owns one persistent [`Tree`] per declared index, a tree keyed
//! by revision, and a graveyard tree of tombstones. All trees are
//! staged together inside a [`WriteTxn`](crate::txn::WriteTxn) and
//! published atomically on commit by swapping the table's
//! [`ArcSwap`] pointer — readers never block behind a writer, since
//! they only ever load that pointer.

pub mod query;
pub mod schema;
pub mod tracker;

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tokio::sync::Mutex as TokioMutex;

use crate::error::{CResult, Error};
use crate::index::IndexSchema;
use crate::key;
use crate::table::query::Query;
use crate::table::schema::TableSchema;
use crate::table::tracker::DeleteTracker;
use crate::tree::Tree;
use crate::txn::{Readable, WriteTxn};
use crate::watch::Watch;
use crate::Revision;

pub type TableId = u32;

pub struct Entry<T> {
    pub object: Arc<T>,
    pub revision: Revision,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Entry { object: self.object.clone(), revision: self.revision }
    }
}

/// A point-in-time snapshot of a table's committed state. Cloning is
/// cheap (every field is `Arc`-backed or `Copy`); `WriteTxn` clones the
/// currently-committed state to build its staging area, mutates the
/// clone, and publishes it wholesale on commit.
pub struct TableState<T> {
    pub indexes: HashMap<String, Tree<Entry<T>>>,
    pub revisions: Tree<Entry<T>>,
    pub graveyard: Tree<Entry<T>>,
    /// Primary key → pending tombstone revision, for at most one
    /// graveyard entry per primary key at a time (spec §4.B invariant
    /// 2: a primary key lives in at most one of {primary, graveyard}).
    /// A reinsert looks its key up here to evict the superseded
    /// tombstone from `graveyard` too.
    pub graveyard_by_key: Tree<Revision>,
    pub next_revision: Revision,
}

impl<T> TableState<T> {
    fn empty(schema: &TableSchema<T>) -> Self {
        let mut indexes = HashMap::new();
        for index in schema.all_indexes() {
            indexes.insert(index.name().to_string(), Tree::new());
        }
        TableState {
            indexes,
            revisions: Tree::new(),
            graveyard: Tree::new(),
            graveyard_by_key: Tree::new(),
            next_revision: 0,
        }
    }
}

impl<T> Clone for TableState<T> {
    fn clone(&self) -> Self {
        TableState {
            indexes: self.indexes.clone(),
            revisions: self.revisions.clone(),
            graveyard: self.graveyard.clone(),
            graveyard_by_key: self.graveyard_by_key.clone(),
            next_revision: self.next_revision,
        }
    }
}

/// Cheap, O(1) stats backing the metrics module and interactive
/// inspection (spec §6, §4.C supplement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub revision: Revision,
    pub live_count: usize,
    pub graveyard_count: usize,
    pub tracker_count: usize,
}

struct TableInner<T> {
    id: TableId,
    name: String,
    schema: TableSchema<T>,
    state: ArcSwap<TableState<T>>,
    write_lock: Arc<TokioMutex<()>>,
    trackers: Mutex<HashMap<String, Arc<AtomicU64>>>,
}

/// A handle to a registered table. Cheap to clone (one `Arc` bump);
/// every clone refers to the same underlying state.
pub struct Table<T> {
    inner: Arc<TableInner<T>>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Table { inner: self.inner.clone() }
    }
}

impl<T> Table<T> {
    pub(crate) fn new(id: TableId, name: impl Into<String>, schema: TableSchema<T>) -> Self {
        let name = name.into();
        let state = TableState::empty(&schema);
        Table {
            inner: Arc::new(TableInner {
                id,
                name,
                schema,
                state: ArcSwap::from_pointee(state),
                write_lock: Arc::new(TokioMutex::new(())),
                trackers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn id(&self) -> TableId {
        self.inner.id
    }

    fn primary_tree<'s>(state: &'s TableState<T>, schema: &TableSchema<T>) -> &'s Tree<Entry<T>> {
        state
            .indexes
            .get(schema.primary().name())
            .expect("primary index tree always present")
    }

    /// Resolves a query against a committed or staged snapshot, without
    /// touching any mutable state (used by all read-only operations).
    fn resolve<'s>(
        &self,
        state: &'s TableState<T>,
        query: &Query<'_>,
    ) -> CResult<(Vec<(Vec<u8>, Arc<Entry<T>>)>, Arc<Watch>)> {
        match query {
            Query::ByRevision(rev) => {
                let rev_key = key::encode_revision(*rev);
                Ok(state.revisions.lower_bound(&rev_key))
            }
            Query::Index { name, key: lookup } => {
                let index = self
                    .inner
                    .schema
                    .index_named(name)
                    .ok_or_else(|| Error::Internal(format!("index {name:?} not declared on table {:?}", self.inner.name)))?;
                let tree = state.indexes.get(index.name()).expect("declared index always has a tree");
                if index.is_unique() {
                    let (value, watch) = tree.get(lookup);
                    let entries = value.into_iter().map(|v| (lookup.to_vec(), v)).collect();
                    Ok((entries, watch))
                } else {
                    Ok(tree.prefix(&key::non_unique_prefix(lookup)))
                }
            }
        }
    }

    pub fn get<R: Readable>(&self, txn: &R, query: Query<'_>) -> CResult<(Vec<(Arc<T>, Revision)>, Arc<Watch>)> {
        let state = txn.table_state::<T>(self.inner.id, &self.inner.name)?;
        let (entries, watch) = self.resolve(state, &query)?;
        Ok((entries.into_iter().map(|(_, e)| (e.object.clone(), e.revision)).collect(), watch))
    }

    pub fn lower_bound<R: Readable>(
        &self,
        txn: &R,
        query: Query<'_>,
    ) -> CResult<(Vec<(Arc<T>, Revision)>, Arc<Watch>)> {
        self.get(txn, query)
    }

    pub fn first<R: Readable>(&self, txn: &R, query: Query<'_>) -> CResult<Option<(Arc<T>, Revision)>> {
        Ok(self.get(txn, query)?.0.into_iter().next())
    }

    pub fn first_watch<R: Readable>(
        &self,
        txn: &R,
        query: Query<'_>,
    ) -> CResult<(Option<(Arc<T>, Revision)>, Arc<Watch>)> {
        let (entries, watch) = self.get(txn, query)?;
        Ok((entries.into_iter().next(), watch))
    }

    pub fn last<R: Readable>(&self, txn: &R, query: Query<'_>) -> CResult<Option<(Arc<T>, Revision)>> {
        Ok(self.get(txn, query)?.0.into_iter().last())
    }

    pub fn last_watch<R: Readable>(
        &self,
        txn: &R,
        query: Query<'_>,
    ) -> CResult<(Option<(Arc<T>, Revision)>, Arc<Watch>)> {
        let (entries, watch) = self.get(txn, query)?;
        Ok((entries.into_iter().last(), watch))
    }

    /// Every live object, in ascending insertion order (spec §4.E: the
    /// revision tree, not the primary index, so a key inserted out of
    /// primary-key order still comes back in the order it was written).
    pub fn all<R: Readable>(&self, txn: &R) -> CResult<(Vec<(Arc<T>, Revision)>, Arc<Watch>)> {
        let state = txn.table_state::<T>(self.inner.id, &self.inner.name)?;
        let (entries, watch) = state.revisions.iter_all();
        Ok((entries.into_iter().map(|(_, e)| (e.object.clone(), e.revision)).collect(), watch))
    }

    pub fn revision<R: Readable>(&self, txn: &R) -> CResult<Revision> {
        let state = txn.table_state::<T>(self.inner.id, &self.inner.name)?;
        Ok(state.next_revision)
    }

    /// Current committed stats, independent of any transaction (spec §6,
    /// used for metrics and interactive inspection).
    pub fn stats(&self) -> TableStats {
        let state = self.inner.state.load();
        TableStats {
            revision: state.next_revision,
            live_count: Self::primary_tree(&state, &self.inner.schema).len(),
            graveyard_count: state.graveyard.len(),
            tracker_count: self.inner.trackers.lock().expect("tracker registry poisoned").len(),
        }
    }

    pub fn len(&self) -> usize {
        let state = self.inner.state.load();
        Self::primary_tree(&state, &self.inner.schema).len()
    }

    pub fn graveyard_len(&self) -> usize {
        self.inner.state.load().graveyard.len()
    }

    /// A signal that closes on every commit touching this table (every
    /// insert/delete writes the revision tree), for the observer
    /// adapter's wait loop (spec §6/§4.F).
    pub fn change_watch(&self) -> Arc<Watch> {
        self.inner.state.load().revisions.root_watch()
    }

    fn remove_object_from_indexes(
        &self,
        state: &mut TableState<T>,
        primary_key: &[u8],
        obj: &T,
        rev: Revision,
        to_close: &mut Vec<Arc<Watch>>,
    ) {
        let rev_key = key::encode_revision(rev);
        let (new_revisions, _) = state.revisions.delete(&rev_key, to_close);
        state.revisions = new_revisions;

        for index in self.inner.schema.secondary_indexes() {
            let keys = index.keys_for(obj);
            let tree = state.indexes.get_mut(index.name()).expect("declared index always has a tree");
            for k in keys {
                let encoded = Self::encode_index_key(index, primary_key, &k);
                let (new_tree, _) = tree.delete(&encoded, to_close);
                *tree = new_tree;
            }
        }
    }

    fn encode_index_key(index: &IndexSchema<T>, primary_key: &[u8], secondary_key: &[u8]) -> Vec<u8> {
        if index.is_unique() {
            secondary_key.to_vec()
        } else {
            key::encode_non_unique(primary_key, secondary_key).expect("secondary key within length limit")
        }
    }

    /// Inserts or replaces `obj`, keyed by its primary index. Returns the
    /// previous object, if any, and whether an insert (vs. replace)
    /// happened (spec §4.C "Insert").
    pub fn insert(&self, txn: &mut WriteTxn, obj: T) -> CResult<(Option<Arc<T>>, bool)> {
        let obj = Arc::new(obj);
        let primary_key = self
            .inner
            .schema
            .primary()
            .keys_for(&obj)
            .into_iter()
            .next()
            .expect("primary index must extract exactly one key");
        let primary_name = self.inner.schema.primary().name().to_string();

        let to_close = txn.to_close_mut();
        let state = txn.state_mut::<T>(self.inner.id, &self.inner.name)?;

        let previous = state
            .indexes
            .get(&primary_name)
            .expect("primary index tree always present")
            .get(&primary_key)
            .0;

        if let Some(prev_entry) = &previous {
            self.remove_object_from_indexes(state, &primary_key, &prev_entry.object, prev_entry.revision, to_close);
        }

        // A primary key lives in at most one of {primary, graveyard}: if
        // this key has a pending tombstone (from a delete no tracker has
        // observed yet), the reinsert supersedes it.
        if let Some(tomb_rev) = state.graveyard_by_key.get(&primary_key).0 {
            let tomb_key = key::encode_revision(*tomb_rev);
            let (new_graveyard, _) = state.graveyard.delete(&tomb_key, to_close);
            state.graveyard = new_graveyard;
            let (new_gbk, _) = state.graveyard_by_key.delete(&primary_key, to_close);
            state.graveyard_by_key = new_gbk;
        }

        let new_rev = state.next_revision;
        state.next_revision += 1;
        let entry = Entry { object: obj.clone(), revision: new_rev };

        let primary_tree = state.indexes.get_mut(&primary_name).expect("primary index tree always present");
        let (new_primary, _) = primary_tree.insert(&primary_key, entry.clone(), to_close);
        *primary_tree = new_primary;

        let rev_key = key::encode_revision(new_rev);
        let (new_revisions, _) = state.revisions.insert(&rev_key, entry.clone(), to_close);
        state.revisions = new_revisions;

        for index in self.inner.schema.secondary_indexes() {
            for secondary_key in index.keys_for(&obj) {
                let encoded = Self::encode_index_key(index, &primary_key, &secondary_key);
                let tree = state.indexes.get_mut(index.name()).expect("declared index always has a tree");
                let (new_tree, _) = tree.insert(&encoded, entry.clone(), to_close);
                *tree = new_tree;
            }
        }

        Ok((previous.map(|e| e.object.clone()), true))
    }

    /// Removes the object sharing `obj`'s primary key, if one is live.
    /// Advances the table's revision counter regardless, and records a
    /// tombstone in the graveyard only while at least one delete
    /// tracker is active (spec §4.F).
    pub fn delete(&self, txn: &mut WriteTxn, obj: &T) -> CResult<(Option<Arc<T>>, bool)> {
        let primary_key = self
            .inner
            .schema
            .primary()
            .keys_for(obj)
            .into_iter()
            .next()
            .expect("primary index must extract exactly one key");
        let primary_name = self.inner.schema.primary().name().to_string();
        let has_trackers = !self.inner.trackers.lock().expect("tracker registry poisoned").is_empty();

        let to_close = txn.to_close_mut();
        let state = txn.state_mut::<T>(self.inner.id, &self.inner.name)?;

        let primary_tree = state.indexes.get(&primary_name).expect("primary index tree always present");
        let (existing, _) = primary_tree.get(&primary_key);
        let Some(existing) = existing else {
            return Ok((None, false));
        };

        let prev_obj = existing.object.clone();
        let prev_rev = existing.revision;

        let primary_tree = state.indexes.get_mut(&primary_name).expect("primary index tree always present");
        let (new_primary, _) = primary_tree.delete(&primary_key, to_close);
        *primary_tree = new_primary;

        self.remove_object_from_indexes(state, &primary_key, &prev_obj, prev_rev, to_close);

        let del_rev = state.next_revision;
        state.next_revision += 1;

        if has_trackers {
            let tomb_key = key::encode_revision(del_rev);
            let tomb = Entry { object: prev_obj.clone(), revision: del_rev };
            let (new_grave, _) = state.graveyard.insert(&tomb_key, tomb, to_close);
            state.graveyard = new_grave;
            let (new_gbk, _) = state.graveyard_by_key.insert(&primary_key, del_rev, to_close);
            state.graveyard_by_key = new_gbk;
        }

        Ok((Some(prev_obj), true))
    }

    /// Like [`Table::insert`], but fails unless the object currently
    /// stored under the same primary key has revision `expected`.
    pub fn compare_and_swap(&self, txn: &mut WriteTxn, expected: Revision, obj: T) -> CResult<(Option<Arc<T>>, bool)> {
        let primary_key = self
            .inner
            .schema
            .primary()
            .keys_for(&obj)
            .into_iter()
            .next()
            .expect("primary index must extract exactly one key");
        {
            let state = txn.state_ref::<T>(self.inner.id, &self.inner.name)?;
            let primary_tree = state
                .indexes
                .get(self.inner.schema.primary().name())
                .expect("primary index tree always present");
            match primary_tree.get(&primary_key).0 {
                None => return Err(Error::ObjectNotFound),
                Some(entry) if entry.revision != expected => {
                    return Err(Error::RevisionNotEqual { current: entry.revision })
                }
                Some(_) => {}
            }
        }
        self.insert(txn, obj)
    }

    /// Like [`Table::delete`], but fails unless the live object's
    /// revision is `expected`. A missing object is reported as `(None,
    /// false)` rather than `ObjectNotFound`, matching the source this
    /// spec is drawn from (see DESIGN.md).
    pub fn compare_and_delete(&self, txn: &mut WriteTxn, expected: Revision, obj: &T) -> CResult<(Option<Arc<T>>, bool)> {
        let primary_key = self
            .inner
            .schema
            .primary()
            .keys_for(obj)
            .into_iter()
            .next()
            .expect("primary index must extract exactly one key");
        {
            let state = txn.state_ref::<T>(self.inner.id, &self.inner.name)?;
            let primary_tree = state
                .indexes
                .get(self.inner.schema.primary().name())
                .expect("primary index tree always present");
            match primary_tree.get(&primary_key).0 {
                None => return Ok((None, false)),
                Some(entry) if entry.revision != expected => {
                    return Err(Error::RevisionNotEqual { current: entry.revision })
                }
                Some(_) => {}
            }
        }
        self.delete(txn, obj)
    }

    /// Deletes every live object (spec §4.C "DeleteAll").
    pub fn delete_all(&self, txn: &mut WriteTxn) -> CResult<()> {
        let objects: Vec<Arc<T>> = {
            let state = txn.state_ref::<T>(self.inner.id, &self.inner.name)?;
            let (entries, _watch) = Self::primary_tree(state, &self.inner.schema).iter_all();
            entries.into_iter().map(|(_, e)| e.object.clone()).collect()
        };
        for obj in objects {
            self.delete(txn, &obj)?;
        }
        Ok(())
    }

    /// Registers a new delete tracker on this table, starting at
    /// revision 0 (spec §4.F): its first `iterate` call sees every
    /// object currently live, not just future changes. Must be called
    /// inside a write transaction that declared this table.
    pub fn delete_tracker(&self, txn: &mut WriteTxn, name: impl Into<String>) -> CResult<DeleteTracker<T>> {
        let name = name.into();
        let _ = txn.state_ref::<T>(self.inner.id, &self.inner.name)?;
        let mut trackers = self.inner.trackers.lock().expect("tracker registry poisoned");
        if trackers.contains_key(&name) {
            return Err(Error::DuplicateTrackerName(name));
        }
        let mark = Arc::new(AtomicU64::new(0));
        trackers.insert(name.clone(), mark.clone());
        Ok(DeleteTracker::new(self.clone(), name, mark))
    }

    pub(crate) fn remove_tracker(&self, name: &str) {
        self.inner.trackers.lock().expect("tracker registry poisoned").remove(name);
    }

    pub(crate) fn tracker_marks(&self) -> Vec<Revision> {
        self.inner
            .trackers
            .lock()
            .expect("tracker registry poisoned")
            .values()
            .map(|m| m.load(Ordering::SeqCst))
            .collect()
    }
}

/// Object-safe surface a [`crate::db::Database`] needs without knowing
/// each table's element type: lock acquisition for `WriteTxn`, staged
/// state for type-erased commit/abort, and the periodic graveyard
/// sweep. Implemented by [`Table<T>`] for every `T`.
pub trait ErasedTable: Send + Sync {
    fn id(&self) -> TableId;
    fn name(&self) -> &str;
    fn write_lock_handle(&self) -> Arc<TokioMutex<()>>;
    fn fresh_staged(&self) -> Box<dyn Any + Send + Sync>;
    fn commit_erased(&self, staged: Box<dyn Any + Send + Sync>);
    fn table_stats(&self) -> TableStats;

    /// Removes every graveyard tombstone at or below the minimum mark
    /// across this table's active trackers (spec §4.F GC). Acquires
    /// this table's own write lock for the duration of the sweep.
    fn gc_once(&self) -> usize;
}

impl<T: Send + Sync + 'static> ErasedTable for Table<T> {
    fn id(&self) -> TableId {
        self.inner.id
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn write_lock_handle(&self) -> Arc<TokioMutex<()>> {
        self.inner.write_lock.clone()
    }

    fn fresh_staged(&self) -> Box<dyn Any + Send + Sync> {
        Box::new((**self.inner.state.load()).clone())
    }

    fn commit_erased(&self, staged: Box<dyn Any + Send + Sync>) {
        let state = staged
            .downcast::<TableState<T>>()
            .expect("WriteTxn always stages this table's own concrete TableState<T>");
        self.inner.state.store(Arc::new(*state));
    }

    fn table_stats(&self) -> TableStats {
        self.stats()
    }

    fn gc_once(&self) -> usize {
        let _guard = self.inner.write_lock.blocking_lock();
        let marks = self.tracker_marks();
        let Some(safe_rev) = (if marks.is_empty() { None } else { marks.into_iter().min() }) else {
            // No active trackers: every tombstone is observed by
            // nobody and can be dropped outright.
            let current = self.inner.state.load();
            let count = current.graveyard.len();
            if count == 0 {
                return 0;
            }
            let mut next = (**current).clone();
            next.graveyard = Tree::new();
            next.graveyard_by_key = Tree::new();
            self.inner.state.store(Arc::new(next));
            return count;
        };

        let current = self.inner.state.load();
        let (tombstones, _watch) = current.graveyard.iter_all();
        let mut to_close = Vec::new();
        let mut graveyard = current.graveyard.clone();
        let mut graveyard_by_key = current.graveyard_by_key.clone();
        let mut removed = 0;
        for (k, entry) in &tombstones {
            if entry.revision > safe_rev {
                continue;
            }
            let (new_graveyard, _) = graveyard.delete(k, &mut to_close);
            graveyard = new_graveyard;
            let primary_key = self
                .inner
                .schema
                .primary()
                .keys_for(&entry.object)
                .into_iter()
                .next()
                .expect("primary index must extract exactly one key");
            let (new_gbk, _) = graveyard_by_key.delete(&primary_key, &mut to_close);
            graveyard_by_key = new_gbk;
            removed += 1;
        }
        if removed > 0 {
            let mut next = (**current).clone();
            next.graveyard = graveyard;
            next.graveyard_by_key = graveyard_by_key;
            self.inner.state.store(Arc::new(next));
            for w in to_close {
                w.close();
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::index::IndexSchema;
    use crate::table::schema::TableSchema;

    #[derive(Clone, Debug, PartialEq)]
    struct Person {
        id: u32,
        name: String,
    }

    fn schema() -> TableSchema<Person> {
        TableSchema::new(IndexSchema::unique("id", |p: &Person| p.id.to_be_bytes().to_vec()))
            .unwrap()
            .with_index(IndexSchema::unique("name", |p: &Person| p.name.as_bytes().to_vec()))
            .unwrap()
    }

    #[tokio::test]
    async fn insert_then_get_by_primary_and_by_secondary() {
        let db = Database::new(Default::default());
        let people = db.register_table("people", schema()).unwrap();
        let mut txn = db.write_txn(&[&people]).await.unwrap();
        people.insert(&mut txn, Person { id: 1, name: "ada".into() }).unwrap();
        txn.commit().unwrap();

        let read = db.read_txn();
        let (rows, _w) = people.get(&read, Query::by_index("id", &1u32.to_be_bytes())).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.name, "ada");

        let (rows, _w) = people.get(&read, Query::by_index("name", b"ada")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.id, 1);
    }

    #[tokio::test]
    async fn delete_advances_revision_even_without_trackers() {
        let db = Database::new(Default::default());
        let people = db.register_table("people", schema()).unwrap();
        let mut txn = db.write_txn(&[&people]).await.unwrap();
        people.insert(&mut txn, Person { id: 1, name: "ada".into() }).unwrap();
        let rev_before = people.revision(&txn).unwrap();
        people.delete(&mut txn, &Person { id: 1, name: "ada".into() }).unwrap();
        let rev_after = people.revision(&txn).unwrap();
        txn.commit().unwrap();

        assert_eq!(rev_after, rev_before + 1);
        assert_eq!(people.len(), 0);
    }

    #[tokio::test]
    async fn compare_and_swap_rejects_stale_revision() {
        let db = Database::new(Default::default());
        let people = db.register_table("people", schema()).unwrap();
        let mut txn = db.write_txn(&[&people]).await.unwrap();
        people.insert(&mut txn, Person { id: 1, name: "ada".into() }).unwrap();
        txn.commit().unwrap();

        let mut txn = db.write_txn(&[&people]).await.unwrap();
        let err = people.compare_and_swap(&mut txn, 999, Person { id: 1, name: "ada2".into() }).unwrap_err();
        assert!(matches!(err, Error::RevisionNotEqual { .. }));
    }

    #[tokio::test]
    async fn compare_and_delete_on_missing_key_returns_false_not_error() {
        let db = Database::new(Default::default());
        let people = db.register_table("people", schema()).unwrap();
        let mut txn = db.write_txn(&[&people]).await.unwrap();
        let (prev, ok) = people.compare_and_delete(&mut txn, 0, &Person { id: 9, name: "x".into() }).unwrap();
        assert!(prev.is_none());
        assert!(!ok);
    }

    #[tokio::test]
    async fn delete_all_removes_every_live_object() {
        let db = Database::new(Default::default());
        let people = db.register_table("people", schema()).unwrap();
        let mut txn = db.write_txn(&[&people]).await.unwrap();
        people.insert(&mut txn, Person { id: 1, name: "a".into() }).unwrap();
        people.insert(&mut txn, Person { id: 2, name: "b".into() }).unwrap();
        people.delete_all(&mut txn).unwrap();
        txn.commit().unwrap();
        assert_eq!(people.len(), 0);
    }

    #[tokio::test]
    async fn all_returns_objects_in_insertion_order_not_primary_key_order() {
        let db = Database::new(Default::default());
        let people = db.register_table("people", schema()).unwrap();
        let mut txn = db.write_txn(&[&people]).await.unwrap();
        people.insert(&mut txn, Person { id: 5, name: "a".into() }).unwrap();
        people.insert(&mut txn, Person { id: 2, name: "b".into() }).unwrap();
        people.insert(&mut txn, Person { id: 9, name: "c".into() }).unwrap();
        txn.commit().unwrap();

        let read = db.read_txn();
        let (rows, _w) = people.all(&read).unwrap();
        let ids: Vec<u32> = rows.iter().map(|(p, _)| p.id).collect();
        assert_eq!(ids, vec![5, 2, 9], "all() must preserve insertion order, not sort by primary key");
    }
}
