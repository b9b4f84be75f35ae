use std::fmt::Debug;

use crate::tree::SharedTree;

/// Type alias for record IDs (the key type used by hierarchy dumps)
pub type RecordId = u64;

/// Bound shared by every key the synchronizer can track.
///
/// Keys are opaque to the core: they only need to be compared against the
/// key already cached at the same position.
pub trait NodeKey: Clone + Eq + Debug {}

impl<T: Clone + Eq + Debug> NodeKey for T {}

/// One entry of a depth-first preorder walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalEntry<K> {
    /// Depth in the hierarchy (0 for top-level entries)
    pub depth: usize,
    /// Identity of the entry, unique among its siblings
    pub key: K,
}

impl<K> TraversalEntry<K> {
    pub fn new(depth: usize, key: K) -> Self {
        Self { depth, key }
    }
}

/// Producer of the live hierarchy as a flat preorder sequence.
///
/// Implementations must emit parents before their children and depth 0 for
/// top-level entries. Depth is expected to grow by at most one per step;
/// the synchronizer does not validate this and the resulting shape is
/// unspecified when a source breaks that contract.
pub trait TraversalSource<K> {
    /// Rewinds the source so the next call to `next_entry` yields the first entry.
    fn restart(&mut self);

    /// Returns the next entry, or `None` at the end of the sequence.
    fn next_entry(&mut self) -> Option<TraversalEntry<K>>;
}

/// A single category fact reported for a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Facet {
    /// A specific, named category
    Category(String),
    /// A generic behaviour-bearing element with no more specific category.
    /// All behaviours share the umbrella label.
    Behavior(String),
    /// A purely positional element with no identity of its own
    Structural,
}

/// Maps a key to the facets its entity carries.
pub trait LabelResolver<K> {
    /// Returns `None` when the key cannot be resolved.
    fn resolve(&self, key: &K) -> Option<Vec<Facet>>;
}

impl<K, F> LabelResolver<K> for F
where
    F: Fn(&K) -> Option<Vec<Facet>>,
{
    fn resolve(&self, key: &K) -> Option<Vec<Facet>> {
        self(key)
    }
}

/// Keys whose whole subtree is excluded from the cached tree.
pub trait IgnoreSet<K> {
    fn contains(&self, key: &K) -> bool;
}

/// Consumer that receives the shared cached tree.
pub trait TreeConsumer<K> {
    fn set_tree(&mut self, tree: &SharedTree<K>);
}

/// Consumer that receives the global label listing.
pub trait LabelConsumer {
    fn set_labels(&mut self, labels: &[std::sync::Arc<str>]);
}

impl<K, F> TreeConsumer<K> for F
where
    F: FnMut(&SharedTree<K>),
{
    fn set_tree(&mut self, tree: &SharedTree<K>) {
        self(tree)
    }
}

impl<F> LabelConsumer for F
where
    F: FnMut(&[std::sync::Arc<str>]),
{
    fn set_labels(&mut self, labels: &[std::sync::Arc<str>]) {
        self(labels)
    }
}

/// Identifier handed out by a [`ChangeNotifier`] subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// External "hierarchy changed" signal the coordinator attaches to while active.
pub trait ChangeNotifier {
    fn subscribe(&mut self, listener: Box<dyn FnMut()>) -> ListenerId;

    /// Returns `false` if the listener was not subscribed.
    fn unsubscribe(&mut self, id: ListenerId) -> bool;
}
