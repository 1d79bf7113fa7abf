//! Persistent radix tree (spec §4.A).
//!
//! An immutable prefix tree with structural sharing: `insert`/`delete`
//! return a new root that shares every untouched subtree with the
//! original, which stays valid for any reader still holding it. Every
//! node owns a [`Watch`](crate::watch::Watch) created at construction;
//! a commit closes the watch of every node it replaces.
//!
//! Children are keyed by the next byte of the key in a `BTreeMap`, so
//! iteration in ascending byte order falls out of `BTreeMap`'s own
//! ordering instead of needing a separate sort step.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::watch::Watch;

struct Node<V> {
    value: Option<Arc<V>>,
    children: BTreeMap<u8, Arc<Node<V>>>,
    watch: Arc<Watch>,
    /// Number of live values in this node's subtree, including this
    /// node's own value if present. Kept up to date on every path copy
    /// so `Tree::len` is O(1).
    count: usize,
}

impl<V> Node<V> {
    fn empty() -> Arc<Self> {
        Arc::new(Node { value: None, children: BTreeMap::new(), watch: Watch::new(), count: 0 })
    }
}

/// An immutable snapshot of a radix tree. Cloning a `Tree` is an O(1)
/// `Arc` bump; cloning the whole keyspace never happens.
pub struct Tree<V> {
    root: Arc<Node<V>>,
}

impl<V> Clone for Tree<V> {
    fn clone(&self) -> Self {
        Tree { root: self.root.clone() }
    }
}

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Tree<V> {
    pub fn new() -> Self {
        Tree { root: Node::empty() }
    }

    pub fn len(&self) -> usize {
        self.root.count
    }

    pub fn is_empty(&self) -> bool {
        self.root.count == 0
    }

    /// The watch covering the whole tree. Closed on every commit that
    /// touches this tree, anywhere in the keyspace.
    pub fn root_watch(&self) -> Arc<Watch> {
        self.root.watch.clone()
    }

    /// Exact-match lookup. The returned watch is the deepest node
    /// reached while walking the key, which is the smallest subtree
    /// that is guaranteed to be rebuilt (and hence have its watch
    /// closed) by any future mutation that could change this result.
    pub fn get(&self, key: &[u8]) -> (Option<Arc<V>>, Arc<Watch>) {
        let mut node = &self.root;
        let mut rest = key;
        loop {
            if rest.is_empty() {
                return (node.value.clone(), node.watch.clone());
            }
            match node.children.get(&rest[0]) {
                Some(child) => {
                    node = child;
                    rest = &rest[1..];
                }
                None => return (None, node.watch.clone()),
            }
        }
    }

    /// Inserts `value` at `key`, returning the new tree and the value
    /// previously stored there, if any. Every replaced node's old watch
    /// is pushed onto `to_close`.
    pub fn insert(&self, key: &[u8], value: V, to_close: &mut Vec<Arc<Watch>>) -> (Tree<V>, Option<Arc<V>>) {
        let (new_root, replaced) = insert_rec(Some(&self.root), key, value, to_close);
        (Tree { root: new_root }, replaced)
    }

    /// Deletes `key`, returning the new tree and the value that was
    /// removed, if any. Nodes on the path are pruned once they carry no
    /// value and no children, so deleting every key returns a tree
    /// equivalent to a freshly constructed one.
    pub fn delete(&self, key: &[u8], to_close: &mut Vec<Arc<Watch>>) -> (Tree<V>, Option<Arc<V>>) {
        let result = delete_rec(Some(&self.root), key, to_close);
        let new_root = result.node.unwrap_or_else(Node::empty);
        (Tree { root: new_root }, result.removed)
    }

    /// All entries whose key starts with `prefix`, in ascending order,
    /// plus the watch of the node exactly at `prefix` (or the tree's
    /// root watch, if no such node currently exists — any future
    /// insert under that prefix necessarily rebuilds the root too).
    pub fn prefix(&self, prefix: &[u8]) -> (Vec<(Vec<u8>, Arc<V>)>, Arc<Watch>) {
        let mut out = Vec::new();
        let watch = match self.node_at(prefix) {
            Some(node) => {
                collect(node, prefix.to_vec(), &mut out);
                node.watch.clone()
            }
            None => self.root_watch(),
        };
        (out, watch)
    }

    /// All entries with key >= `key`, in ascending order.
    pub fn lower_bound(&self, key: &[u8]) -> (Vec<(Vec<u8>, Arc<V>)>, Arc<Watch>) {
        let mut out = Vec::new();
        collect(&self.root, Vec::new(), &mut out);
        out.retain(|(k, _)| k.as_slice() >= key);
        (out, self.root_watch())
    }

    /// All entries in ascending key order.
    pub fn iter_all(&self) -> (Vec<(Vec<u8>, Arc<V>)>, Arc<Watch>) {
        let mut out = Vec::new();
        collect(&self.root, Vec::new(), &mut out);
        (out, self.root_watch())
    }

    fn node_at(&self, prefix: &[u8]) -> Option<&Arc<Node<V>>> {
        let mut node = &self.root;
        let mut rest = prefix;
        loop {
            if rest.is_empty() {
                return Some(node);
            }
            match node.children.get(&rest[0]) {
                Some(child) => {
                    node = child;
                    rest = &rest[1..];
                }
                None => return None,
            }
        }
    }
}

fn collect<V>(node: &Arc<Node<V>>, prefix: Vec<u8>, out: &mut Vec<(Vec<u8>, Arc<V>)>) {
    if let Some(v) = &node.value {
        out.push((prefix.clone(), v.clone()));
    }
    for (b, child) in &node.children {
        let mut child_prefix = prefix.clone();
        child_prefix.push(*b);
        collect(child, child_prefix, out);
    }
}

fn insert_rec<V>(
    existing: Option<&Arc<Node<V>>>,
    key: &[u8],
    value: V,
    to_close: &mut Vec<Arc<Watch>>,
) -> (Arc<Node<V>>, Option<Arc<V>>) {
    if let Some(node) = existing {
        to_close.push(node.watch.clone());
    }

    if key.is_empty() {
        let replaced = existing.and_then(|n| n.value.clone());
        let children = existing.map(|n| n.children.clone()).unwrap_or_default();
        let base_count = existing.map(|n| n.count).unwrap_or(0);
        let count = base_count - if replaced.is_some() { 1 } else { 0 } + 1;
        let new_node = Arc::new(Node { value: Some(Arc::new(value)), children, watch: Watch::new(), count });
        return (new_node, replaced);
    }

    let b = key[0];
    let rest = &key[1..];
    let existing_child = existing.and_then(|n| n.children.get(&b));
    let (new_child, replaced) = insert_rec(existing_child, rest, value, to_close);

    let mut children = existing.map(|n| n.children.clone()).unwrap_or_default();
    let old_child_count = existing_child.map(|c| c.count).unwrap_or(0);
    children.insert(b, new_child.clone());

    let base_count = existing.map(|n| n.count).unwrap_or(0);
    let count = base_count - old_child_count + new_child.count;
    let value = existing.and_then(|n| n.value.clone());
    let new_node = Arc::new(Node { value, children, watch: Watch::new(), count });
    (new_node, replaced)
}

struct DeleteResult<V> {
    node: Option<Arc<Node<V>>>,
    removed: Option<Arc<V>>,
    changed: bool,
}

impl<V> DeleteResult<V> {
    fn unchanged() -> Self {
        DeleteResult { node: None, removed: None, changed: false }
    }
}

fn delete_rec<V>(existing: Option<&Arc<Node<V>>>, key: &[u8], to_close: &mut Vec<Arc<Watch>>) -> DeleteResult<V> {
    let node = match existing {
        Some(n) => n,
        None => return DeleteResult::unchanged(),
    };

    if key.is_empty() {
        let removed = match &node.value {
            Some(v) => v.clone(),
            None => return DeleteResult::unchanged(),
        };
        to_close.push(node.watch.clone());
        let count = node.count - 1;
        let new_node = if count == 0 && node.children.is_empty() {
            None
        } else {
            Some(Arc::new(Node { value: None, children: node.children.clone(), watch: Watch::new(), count }))
        };
        return DeleteResult { node: new_node, removed: Some(removed), changed: true };
    }

    let b = key[0];
    let rest = &key[1..];
    let child_result = delete_rec(node.children.get(&b), rest, to_close);
    if !child_result.changed {
        return DeleteResult::unchanged();
    }
    to_close.push(node.watch.clone());

    let mut children = node.children.clone();
    let old_child_count = node.children.get(&b).map(|c| c.count).unwrap_or(0);
    match &child_result.node {
        Some(new_child) => {
            children.insert(b, new_child.clone());
        }
        None => {
            children.remove(&b);
        }
    }
    let new_child_count = child_result.node.as_ref().map(|c| c.count).unwrap_or(0);
    let count = node.count - old_child_count + new_child_count;

    let new_node = if count == 0 && node.value.is_none() {
        None
    } else {
        Some(Arc::new(Node { value: node.value.clone(), children, watch: Watch::new(), count }))
    };
    DeleteResult { node: new_node, removed: child_result.removed, changed: true }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_close() -> Vec<Arc<Watch>> {
        Vec::new()
    }

    #[test]
    fn insert_then_get_round_trips() {
        let t = Tree::new();
        let (t, replaced) = t.insert(b"hello", 1u32, &mut to_close());
        assert_eq!(replaced, None);
        let (t, replaced) = t.insert(b"world", 2u32, &mut to_close());
        assert_eq!(replaced, None);
        assert_eq!(*t.get(b"hello").0.unwrap(), 1);
        assert_eq!(*t.get(b"world").0.unwrap(), 2);
        assert!(t.get(b"missing").0.is_none());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn insert_replaces_existing_value() {
        let t = Tree::new();
        let (t, _) = t.insert(b"k", 1u32, &mut to_close());
        let (t, replaced) = t.insert(b"k", 2u32, &mut to_close());
        assert_eq!(replaced, Some(Arc::new(1)));
        assert_eq!(*t.get(b"k").0.unwrap(), 2);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn original_root_is_unaffected_by_later_inserts() {
        let t0 = Tree::new();
        let (t1, _) = t0.insert(b"a", 1u32, &mut to_close());
        let (t2, _) = t1.insert(b"b", 2u32, &mut to_close());
        assert_eq!(t1.len(), 1);
        assert!(t1.get(b"b").0.is_none());
        assert_eq!(t2.len(), 2);
    }

    #[test]
    fn delete_removes_value_and_prunes_empty_nodes() {
        let t = Tree::new();
        let (t, _) = t.insert(b"a", 1u32, &mut to_close());
        let (t, removed) = t.delete(b"a", &mut to_close());
        assert_eq!(removed, Some(Arc::new(1)));
        assert!(t.is_empty());
        assert!(t.get(b"a").0.is_none());
    }

    #[test]
    fn delete_missing_key_is_a_no_op() {
        let t = Tree::new();
        let (t, _) = t.insert(b"a", 1u32, &mut to_close());
        let (t2, removed) = t.delete(b"z", &mut to_close());
        assert_eq!(removed, None);
        assert_eq!(t2.len(), 1);
    }

    #[test]
    fn prefix_scan_groups_shared_prefixes() {
        let t = Tree::new();
        let (t, _) = t.insert(b"ba", 1u32, &mut to_close());
        let (t, _) = t.insert(b"bb", 2u32, &mut to_close());
        let (t, _) = t.insert(b"c", 3u32, &mut to_close());
        let (entries, _watch) = t.prefix(b"b");
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![b"ba".to_vec(), b"bb".to_vec()]);
    }

    #[test]
    fn lower_bound_returns_keys_in_ascending_order() {
        let t = Tree::new();
        let (t, _) = t.insert(&crate::key::encode_revision(1), 10u32, &mut to_close());
        let (t, _) = t.insert(&crate::key::encode_revision(5), 50u32, &mut to_close());
        let (t, _) = t.insert(&crate::key::encode_revision(9), 90u32, &mut to_close());
        let (entries, _watch) = t.lower_bound(&crate::key::encode_revision(5));
        let values: Vec<u32> = entries.iter().map(|(_, v)| **v).collect();
        assert_eq!(values, vec![50, 90]);
    }

    #[tokio::test]
    async fn insert_closes_watches_of_every_replaced_ancestor() {
        let t = Tree::new();
        let mut close1 = Vec::new();
        let (t, _) = t.insert(b"ab", 1u32, &mut close1);
        assert_eq!(close1.len(), 1); // only the root existed

        let root_watch = t.root_watch();
        let mut close2 = Vec::new();
        let (_t2, _) = t.insert(b"ac", 2u32, &mut close2);
        // root and the "a" node both existed and are rebuilt.
        assert_eq!(close2.len(), 2);
        for w in &close2 {
            w.close();
        }
        tokio::time::timeout(std::time::Duration::from_millis(50), root_watch.changed())
            .await
            .unwrap();
    }
}
