use crate::traits::{TraversalEntry, TraversalSource};

/// Traversal source over an owned list of entries.
///
/// The list can be swapped between passes to simulate the live hierarchy
/// changing.
#[derive(Debug, Clone)]
pub struct VecSource<K> {
    entries: Vec<TraversalEntry<K>>,
    position: usize,
}

impl<K: Clone> VecSource<K> {
    pub fn new(entries: Vec<TraversalEntry<K>>) -> Self {
        Self {
            entries,
            position: 0,
        }
    }

    /// Builds a source from `(depth, key)` pairs.
    pub fn from_pairs(pairs: &[(usize, K)]) -> Self {
        Self::new(to_entries(pairs))
    }

    pub fn set_entries(&mut self, entries: Vec<TraversalEntry<K>>) {
        self.entries = entries;
        self.position = 0;
    }

    pub fn set_pairs(&mut self, pairs: &[(usize, K)]) {
        self.set_entries(to_entries(pairs));
    }

    pub fn entries(&self) -> &[TraversalEntry<K>] {
        &self.entries
    }
}

impl<K: Clone> Default for VecSource<K> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn to_entries<K: Clone>(pairs: &[(usize, K)]) -> Vec<TraversalEntry<K>> {
    pairs
        .iter()
        .map(|(depth, key)| TraversalEntry::new(*depth, key.clone()))
        .collect()
}

impl<K: Clone> TraversalSource<K> for VecSource<K> {
    fn restart(&mut self) {
        self.position = 0;
    }

    fn next_entry(&mut self) -> Option<TraversalEntry<K>> {
        let entry = self.entries.get(self.position)?.clone();
        self.position += 1;
        Some(entry)
    }
}
