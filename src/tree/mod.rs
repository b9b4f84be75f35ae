//! The cached hierarchy owned by the synchronizer.
//!
//! The tree is an arena of [`CachedNode`]s plus the ordered root sequence.
//! Consumers receive it as a [`SharedTree`]: every consumer aliases the same
//! instance, which the synchronizer mutates in place between notifications.
//! Consumers only ever `borrow()` it; `borrow_mut()` is reserved for the
//! synchronizer while a pass runs.

pub mod arena;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

pub use arena::{Arena, NodeId};

use crate::traits::TraversalEntry;

/// Shared handle to the cached tree.
pub type SharedTree<K> = Rc<RefCell<CachedTree<K>>>;

/// One cached hierarchy entry.
#[derive(Debug, Clone)]
pub struct CachedNode<K> {
    pub(crate) key: K,
    pub(crate) labels: BTreeSet<Arc<str>>,
    /// Never `Some(empty)` once a pass has completed.
    pub(crate) children: Option<Vec<NodeId>>,
}

impl<K> CachedNode<K> {
    pub(crate) fn new(key: K) -> Self {
        Self {
            key,
            labels: BTreeSet::new(),
            children: None,
        }
    }
}

/// Ordered tree of cached nodes.
#[derive(Debug, Clone)]
pub struct CachedTree<K> {
    nodes: Arena<CachedNode<K>>,
    roots: Vec<NodeId>,
}

impl<K> CachedTree<K> {
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
            roots: Vec::new(),
        }
    }

    /// Wraps a fresh tree for sharing with consumers.
    pub fn shared() -> SharedTree<K> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Total number of live nodes at every depth.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn root_ids(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeRef<'_, K>> + '_ {
        self.roots.iter().map(move |&id| NodeRef { tree: self, id })
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_, K>> {
        self.nodes.contains(id).then_some(NodeRef { tree: self, id })
    }

    /// Depth-first preorder walk yielding `(depth, node)`.
    pub fn walk(&self) -> Walk<'_, K> {
        Walk {
            tree: self,
            stack: self.roots.iter().rev().map(|&id| (0, id)).collect(),
        }
    }

    /// Flattens the tree back into the preorder entry sequence it mirrors.
    pub fn entries(&self) -> Vec<TraversalEntry<K>>
    where
        K: Clone,
    {
        self.walk()
            .map(|(depth, node)| TraversalEntry::new(depth, node.key().clone()))
            .collect()
    }

    /// Finds the first node (preorder) whose key path from the roots matches `path`.
    pub fn find_path(&self, path: &[K]) -> Option<NodeRef<'_, K>>
    where
        K: PartialEq,
    {
        let (first, rest) = path.split_first()?;
        let mut current = self.roots().find(|n| n.key() == first)?;
        for key in rest {
            current = current.children().find(|n| n.key() == key)?;
        }
        Some(current)
    }

    // ===== Synchronizer-only mutation =====

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut CachedNode<K>> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn child_id(&self, parent: Option<NodeId>, index: usize) -> Option<NodeId> {
        match parent {
            None => self.roots.get(index).copied(),
            Some(id) => self.nodes.get(id)?.children.as_ref()?.get(index).copied(),
        }
    }

    pub(crate) fn key_of(&self, id: NodeId) -> Option<&K> {
        self.nodes.get(id).map(|n| &n.key)
    }

    /// Appends a new node for `key` at the end of `parent`'s children.
    pub(crate) fn append_child(&mut self, parent: Option<NodeId>, key: K) -> NodeId {
        let id = self.nodes.insert(CachedNode::new(key));
        match parent {
            None => self.roots.push(id),
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.children.get_or_insert_with(Vec::new).push(id);
                }
            }
        }
        id
    }

    /// Replaces the child at `index` with a new node for `key`, discarding the
    /// old node and its whole subtree.
    pub(crate) fn replace_child(&mut self, parent: Option<NodeId>, index: usize, key: K) -> NodeId {
        let id = self.nodes.insert(CachedNode::new(key));
        let slot = match parent {
            None => self.roots.get_mut(index),
            Some(parent) => self
                .nodes
                .get_mut(parent)
                .and_then(|n| n.children.as_mut())
                .and_then(|c| c.get_mut(index)),
        };
        let old = slot.map(|slot| std::mem::replace(slot, id));
        if let Some(old) = old {
            self.release_subtree(old);
        }
        id
    }

    /// Truncates `parent`'s children to the first `keep` entries.
    ///
    /// An emptied child sequence collapses to `None`. Returns whether
    /// anything was removed.
    pub(crate) fn truncate_children(&mut self, parent: Option<NodeId>, keep: usize) -> bool {
        let removed: Vec<NodeId> = match parent {
            None => {
                if keep >= self.roots.len() {
                    return false;
                }
                self.roots.drain(keep..).collect()
            }
            Some(id) => {
                let Some(node) = self.nodes.get_mut(id) else {
                    return false;
                };
                let Some(children) = node.children.as_mut() else {
                    return false;
                };
                if keep >= children.len() {
                    return false;
                }
                let removed: Vec<NodeId> = children.drain(keep..).collect();
                if children.is_empty() {
                    node.children = None;
                }
                removed
            }
        };

        for id in removed {
            self.release_subtree(id);
        }
        true
    }

    /// Returns a node and every descendant to the arena.
    fn release_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.remove(id) {
                pending.extend(node.children.into_iter().flatten());
            }
        }
    }
}

impl<K> Default for CachedTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed read-only view of one cached node.
pub struct NodeRef<'a, K> {
    tree: &'a CachedTree<K>,
    id: NodeId,
}

impl<'a, K> Clone for NodeRef<'a, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, K> Copy for NodeRef<'a, K> {}

impl<'a, K> NodeRef<'a, K> {
    fn node(&self) -> &'a CachedNode<K> {
        // NodeRef is only built for live ids and the tree is borrowed immutably.
        self.tree
            .nodes
            .get(self.id)
            .expect("NodeRef outlived its node")
    }

    /// Instance identity; stable while the node is reused across passes.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn key(&self) -> &'a K {
        &self.node().key
    }

    pub fn labels(&self) -> &'a BTreeSet<Arc<str>> {
        &self.node().labels
    }

    /// `false` both for leaves and for nodes whose children were trimmed away.
    pub fn has_children(&self) -> bool {
        self.node().children.is_some()
    }

    /// Raw children sequence; `None` when the node has no children.
    pub fn child_ids(&self) -> Option<&'a [NodeId]> {
        self.node().children.as_deref()
    }

    pub fn num_children(&self) -> usize {
        self.child_ids().map_or(0, <[NodeId]>::len)
    }

    pub fn child_at(&self, index: usize) -> Option<NodeRef<'a, K>> {
        let id = *self.child_ids()?.get(index)?;
        Some(NodeRef {
            tree: self.tree,
            id,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a, K>> + 'a {
        let tree = self.tree;
        self.child_ids()
            .unwrap_or(&[])
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }
}

impl<'a, K: std::fmt::Debug> std::fmt::Debug for NodeRef<'a, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("key", self.key())
            .field("children", &self.num_children())
            .finish()
    }
}

/// Preorder iterator returned by [`CachedTree::walk`].
pub struct Walk<'a, K> {
    tree: &'a CachedTree<K>,
    stack: Vec<(usize, NodeId)>,
}

impl<'a, K> Iterator for Walk<'a, K> {
    type Item = (usize, NodeRef<'a, K>);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, id) = self.stack.pop()?;
        let node = NodeRef {
            tree: self.tree,
            id,
        };
        if let Some(children) = node.child_ids() {
            self.stack
                .extend(children.iter().rev().map(|&child| (depth + 1, child)));
        }
        Some((depth, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CachedTree<&'static str> {
        let mut tree = CachedTree::new();
        let a = tree.append_child(None, "A");
        tree.append_child(Some(a), "A1");
        let a2 = tree.append_child(Some(a), "A2");
        tree.append_child(Some(a2), "A2x");
        tree.append_child(None, "B");
        tree
    }

    #[test]
    fn test_walk_is_preorder() {
        let tree = sample();
        let order: Vec<_> = tree.walk().map(|(d, n)| (d, *n.key())).collect();
        assert_eq!(
            order,
            vec![(0, "A"), (1, "A1"), (1, "A2"), (2, "A2x"), (0, "B")]
        );
    }

    #[test]
    fn test_truncate_collapses_to_none_and_releases() {
        let mut tree = sample();
        let a = tree.root_ids()[0];
        assert_eq!(tree.len(), 5);

        assert!(tree.truncate_children(Some(a), 0));
        assert!(!tree.get(a).unwrap().has_children());
        // A1, A2 and A2x are gone
        assert_eq!(tree.len(), 2);

        assert!(!tree.truncate_children(Some(a), 0));
    }

    #[test]
    fn test_truncate_root_keeps_empty_sequence() {
        let mut tree = sample();
        assert!(tree.truncate_children(None, 0));
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn test_replace_child_discards_subtree() {
        let mut tree = sample();
        let old = tree.root_ids()[0];
        let new = tree.replace_child(None, 0, "C");

        assert_ne!(old, new);
        assert!(tree.get(old).is_none());
        assert_eq!(tree.len(), 2);
        assert_eq!(*tree.roots().next().unwrap().key(), "C");
    }

    #[test]
    fn test_find_path() {
        let tree = sample();
        let node = tree.find_path(&["A", "A2", "A2x"]).unwrap();
        assert_eq!(*node.key(), "A2x");
        assert!(tree.find_path(&["B", "A1"]).is_none());
        assert!(tree.find_path(&[]).is_none());
    }
}
