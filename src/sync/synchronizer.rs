//! In-place reconciliation of the cached tree against a preorder traversal.
//!
//! A pass walks the traversal once, keeping only a stack of ancestor frames.
//! Each frame pairs a parent (or the root sequence) with the write cursor
//! where the next entry at that level lands. Entries are compared by
//! position only: a matching key reuses the cached node, a different key
//! replaces the node and drops its subtree, and any children left past a
//! cursor when its level closes are trimmed. There is no move detection, so
//! deleting a sibling in the middle of a run replaces every sibling after it
//! for that pass.

use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::labels::{LabelAccumulator, LabelPolicy};
use crate::traits::{IgnoreSet, LabelResolver, NodeKey, TraversalEntry, TraversalSource};
use crate::tree::{CachedNode, CachedTree, NodeId, SharedTree};

/// Pass-local ancestor frame.
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// `None` is the root sequence
    node: Option<NodeId>,
    /// Index in `node`'s children where the next entry at this level goes
    cursor: usize,
}

impl Frame {
    const ROOT: Frame = Frame {
        node: None,
        cursor: 0,
    };
}

/// Counters describing the most recent pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Entries placed in the tree (ignored subtrees excluded)
    pub visited: usize,
    pub created: usize,
    pub replaced: usize,
    pub reused: usize,
    /// Levels whose children sequence was truncated
    pub trimmed: usize,
    pub ignored_subtrees: usize,
    /// The source ran out while skipping an ignored subtree; the final
    /// unwind was skipped.
    pub aborted_in_skip: bool,
    pub changed: bool,
}

/// Owner of the cached tree and the global label set.
///
/// Not thread-safe. Callers must not overlap [`synchronize`](Self::synchronize)
/// with another call or with a consumer holding a borrow of the tree.
pub struct TreeSynchronizer<K, S, R, I> {
    source: S,
    resolver: R,
    ignore: I,
    tree: SharedTree<K>,
    labels: LabelAccumulator,
    frames: Vec<Frame>,
    last_pass: PassStats,
}

impl<K, S, R, I> TreeSynchronizer<K, S, R, I>
where
    K: NodeKey,
    S: TraversalSource<K>,
    R: LabelResolver<K>,
    I: IgnoreSet<K>,
{
    pub fn new(source: S, resolver: R, ignore: I) -> Self {
        Self::with_policy(source, resolver, ignore, LabelPolicy::default())
    }

    pub fn with_policy(source: S, resolver: R, ignore: I, policy: LabelPolicy) -> Self {
        Self {
            source,
            resolver,
            ignore,
            tree: CachedTree::shared(),
            labels: LabelAccumulator::new(policy),
            frames: Vec::with_capacity(16),
            last_pass: PassStats::default(),
        }
    }

    /// Runs one reconciliation pass and reports whether the tree changed
    /// structurally.
    ///
    /// Label refreshes on reused nodes are not structural changes.
    pub fn synchronize(&mut self) -> bool {
        let shared = Rc::clone(&self.tree);
        let Ok(mut tree) = shared.try_borrow_mut() else {
            warn!("cached tree is borrowed by a consumer; skipping pass");
            return false;
        };

        self.labels.begin_pass();
        self.source.restart();

        self.frames.clear();
        self.frames.push(Frame::ROOT);

        let mut stats = PassStats::default();
        let mut last_depth = 0usize;
        let mut pending = self.source.next_entry();

        'pass: while let Some(mut entry) = pending.take() {
            while self.ignore.contains(&entry.key) {
                stats.ignored_subtrees += 1;
                trace!(key = ?entry.key, depth = entry.depth, "skipping ignored subtree");
                match self.skip_subtree(entry.depth) {
                    Some(next) => entry = next,
                    None => {
                        stats.aborted_in_skip = true;
                        break 'pass;
                    }
                }
            }

            if entry.depth <= last_depth {
                // Close the previous sibling, then every level above the new depth
                for _ in 0..=(last_depth - entry.depth) {
                    if self.close_level(&mut tree) {
                        stats.trimmed += 1;
                    }
                }
            }

            let current = self.place(&mut tree, &entry, &mut stats);
            self.frames.push(Frame {
                node: Some(current),
                cursor: 0,
            });
            last_depth = entry.depth;
            stats.visited += 1;

            pending = self.source.next_entry();
        }

        if !stats.aborted_in_skip {
            while let Some(frame) = self.frames.pop() {
                if tree.truncate_children(frame.node, frame.cursor) {
                    stats.trimmed += 1;
                }
            }
        }
        self.frames.clear();
        drop(tree);

        self.labels.end_pass();

        stats.changed = stats.created + stats.replaced + stats.trimmed > 0;
        debug!(
            visited = stats.visited,
            created = stats.created,
            replaced = stats.replaced,
            reused = stats.reused,
            trimmed = stats.trimmed,
            ignored = stats.ignored_subtrees,
            aborted_in_skip = stats.aborted_in_skip,
            changed = stats.changed,
            "synchronize pass complete"
        );
        self.last_pass = stats;
        stats.changed
    }

    /// Consumes entries nested below `depth` and returns the first entry that
    /// is not, or `None` if the source ran out first.
    fn skip_subtree(&mut self, depth: usize) -> Option<TraversalEntry<K>> {
        loop {
            let next = self.source.next_entry()?;
            if next.depth <= depth {
                return Some(next);
            }
        }
    }

    /// Pops the top frame and trims its children to the cursor.
    ///
    /// The root frame is never popped mid-pass, so the stack cannot run empty
    /// while entries remain.
    fn close_level(&mut self, tree: &mut CachedTree<K>) -> bool {
        if self.frames.len() <= 1 {
            return false;
        }
        match self.frames.pop() {
            Some(frame) => tree.truncate_children(frame.node, frame.cursor),
            None => false,
        }
    }

    /// Writes `entry` at the top frame's cursor and refreshes its labels.
    fn place(
        &mut self,
        tree: &mut CachedTree<K>,
        entry: &TraversalEntry<K>,
        stats: &mut PassStats,
    ) -> NodeId {
        let Some(top) = self.frames.last_mut() else {
            unreachable!("root frame popped while entries remain");
        };
        let parent = top.node;
        let index = top.cursor;
        top.cursor = index + 1;

        let current = match tree.child_id(parent, index) {
            None => {
                stats.created += 1;
                trace!(key = ?entry.key, depth = entry.depth, index, "appending node");
                tree.append_child(parent, entry.key.clone())
            }
            Some(existing) if tree.key_of(existing) == Some(&entry.key) => {
                stats.reused += 1;
                existing
            }
            Some(_) => {
                stats.replaced += 1;
                trace!(key = ?entry.key, depth = entry.depth, index, "replacing node");
                tree.replace_child(parent, index, entry.key.clone())
            }
        };

        if let Some(CachedNode { key, labels, .. }) = tree.node_mut(current) {
            self.labels.accumulate(&self.resolver, &*key, labels);
        }
        current
    }

    /// Shared handle to the cached tree, as handed to consumers.
    pub fn tree(&self) -> &SharedTree<K> {
        &self.tree
    }

    /// Global label set rebuilt by the last pass.
    pub fn labels(&self) -> &BTreeSet<Arc<str>> {
        self.labels.labels()
    }

    pub fn label_listing(&self) -> Vec<Arc<str>> {
        self.labels.listing()
    }

    pub fn last_pass(&self) -> PassStats {
        self.last_pass
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    pub fn ignore(&self) -> &I {
        &self.ignore
    }

    /// The ignore set may only change between passes.
    pub fn ignore_mut(&mut self) -> &mut I {
        &mut self.ignore
    }

    pub fn set_label_policy(&mut self, policy: LabelPolicy) {
        self.labels.set_policy(policy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::KeyIgnoreList;
    use crate::source::VecSource;
    use crate::traits::Facet;

    struct NoLabels;

    impl LabelResolver<&'static str> for NoLabels {
        fn resolve(&self, _key: &&'static str) -> Option<Vec<Facet>> {
            None
        }
    }

    type TestSync = TreeSynchronizer<&'static str, VecSource<&'static str>, NoLabels, KeyIgnoreList<&'static str>>;

    fn sync_for(entries: &[(usize, &'static str)]) -> TestSync {
        TreeSynchronizer::new(VecSource::from_pairs(entries), NoLabels, KeyIgnoreList::new())
    }

    fn shape(sync: &TestSync) -> Vec<(usize, &'static str)> {
        sync.tree()
            .borrow()
            .walk()
            .map(|(depth, node)| (depth, *node.key()))
            .collect()
    }

    fn root_ids(sync: &TestSync) -> Vec<NodeId> {
        sync.tree().borrow().root_ids().to_vec()
    }

    #[test]
    fn test_builds_from_empty() {
        let mut sync = sync_for(&[(0, "A"), (1, "A1"), (0, "B")]);
        assert!(sync.synchronize());
        assert_eq!(shape(&sync), vec![(0, "A"), (1, "A1"), (0, "B")]);

        let stats = sync.last_pass();
        assert_eq!(stats.created, 3);
        assert_eq!(stats.visited, 3);
    }

    #[test]
    fn test_second_pass_is_idle() {
        let mut sync = sync_for(&[(0, "A"), (1, "A1"), (1, "A2"), (2, "x"), (0, "B")]);
        assert!(sync.synchronize());
        let before = sync.tree().borrow().walk().map(|(_, n)| n.id()).collect::<Vec<_>>();

        assert!(!sync.synchronize());
        let after = sync.tree().borrow().walk().map(|(_, n)| n.id()).collect::<Vec<_>>();
        assert_eq!(before, after);
        assert_eq!(sync.last_pass().reused, 5);
    }

    #[test]
    fn test_empty_source_clears_tree() {
        let mut sync = sync_for(&[(0, "A"), (1, "A1")]);
        sync.synchronize();

        sync.source_mut().set_pairs(&[]);
        assert!(sync.synchronize());
        assert!(sync.tree().borrow().is_empty());
        assert_eq!(sync.tree().borrow().len(), 0);

        assert!(!sync.synchronize());
    }

    #[test]
    fn test_deep_close_trims_every_level() {
        let mut sync = sync_for(&[(0, "A"), (1, "B"), (2, "C"), (3, "D"), (3, "E"), (0, "Z")]);
        sync.synchronize();

        // Drop E, C's second child, then return straight to depth 0
        sync.source_mut()
            .set_pairs(&[(0, "A"), (1, "B"), (2, "C"), (3, "D"), (0, "Z")]);
        assert!(sync.synchronize());
        assert_eq!(shape(&sync), vec![(0, "A"), (1, "B"), (2, "C"), (3, "D"), (0, "Z")]);
        assert_eq!(sync.last_pass().trimmed, 1);
        assert_eq!(sync.last_pass().reused, 5);
    }

    #[test]
    fn test_replacement_drops_whole_subtree() {
        let mut sync = sync_for(&[(0, "A"), (1, "A1"), (2, "A1a"), (0, "B")]);
        sync.synchronize();
        let b = root_ids(&sync)[1];

        sync.source_mut().set_pairs(&[(0, "X"), (0, "B")]);
        assert!(sync.synchronize());
        assert_eq!(shape(&sync), vec![(0, "X"), (0, "B")]);
        assert_eq!(root_ids(&sync)[1], b);
        assert_eq!(sync.tree().borrow().len(), 2);
    }

    #[test]
    fn test_children_never_empty_but_present() {
        let mut sync = sync_for(&[(0, "A"), (1, "A1"), (1, "A2")]);
        sync.synchronize();

        sync.source_mut().set_pairs(&[(0, "A")]);
        sync.synchronize();

        let tree = sync.tree().borrow();
        let a = tree.roots().next().unwrap();
        assert!(a.child_ids().is_none());
    }

    #[test]
    fn test_ignored_consecutive_siblings() {
        let mut sync = sync_for(&[(0, "A"), (0, "skip1"), (1, "s"), (0, "skip2"), (0, "B")]);
        sync.ignore_mut().insert("skip1");
        sync.ignore_mut().insert("skip2");

        assert!(sync.synchronize());
        assert_eq!(shape(&sync), vec![(0, "A"), (0, "B")]);
        assert_eq!(sync.last_pass().ignored_subtrees, 2);
    }

    #[test]
    fn test_ignored_tail_skips_final_unwind() {
        let mut sync = sync_for(&[(0, "A"), (0, "B"), (0, "C")]);
        sync.synchronize();

        // C disappears and the source then ends inside an ignored subtree:
        // the pass stops without the final unwind, so C survives this pass.
        sync.source_mut()
            .set_pairs(&[(0, "A"), (0, "B"), (1, "hidden"), (2, "h")]);
        sync.ignore_mut().insert("hidden");
        assert!(!sync.synchronize());
        assert!(sync.last_pass().aborted_in_skip);
        assert_eq!(shape(&sync), vec![(0, "A"), (0, "B"), (0, "C")]);

        // Once the ignored tail is gone the next pass trims normally.
        sync.source_mut().set_pairs(&[(0, "A"), (0, "B")]);
        assert!(sync.synchronize());
        assert_eq!(shape(&sync), vec![(0, "A"), (0, "B")]);
    }

    #[test]
    fn test_ignored_leading_entry_is_not_placed() {
        let mut sync = sync_for(&[(0, "hidden"), (1, "child"), (0, "A")]);
        sync.ignore_mut().insert("hidden");
        sync.synchronize();
        assert_eq!(shape(&sync), vec![(0, "A")]);
    }

    #[test]
    fn test_pass_skipped_while_consumer_holds_borrow() {
        let mut sync = sync_for(&[(0, "A")]);
        let tree = Rc::clone(sync.tree());
        let guard = tree.borrow();
        assert!(!sync.synchronize());
        drop(guard);
        assert!(sync.synchronize());
    }
}
