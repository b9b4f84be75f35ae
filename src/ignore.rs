//! Concrete ignore sets.

use std::collections::HashSet;
use std::hash::Hash;

use crate::traits::IgnoreSet;

/// Owned set of keys excluded from the cached tree together with their subtrees.
///
/// The owner may edit the list freely between passes; the synchronizer only
/// reads it while a pass runs.
#[derive(Debug, Clone)]
pub struct KeyIgnoreList<K> {
    keys: HashSet<K>,
}

impl<K: Hash + Eq> KeyIgnoreList<K> {
    pub fn new() -> Self {
        Self {
            keys: HashSet::new(),
        }
    }

    /// Returns `false` if the key was already ignored.
    pub fn insert(&mut self, key: K) -> bool {
        self.keys.insert(key)
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.keys.remove(key)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.keys.iter()
    }
}

impl<K: Hash + Eq> Default for KeyIgnoreList<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq> FromIterator<K> for KeyIgnoreList<K> {
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl<K: Hash + Eq> Extend<K> for KeyIgnoreList<K> {
    fn extend<T: IntoIterator<Item = K>>(&mut self, iter: T) {
        self.keys.extend(iter);
    }
}

impl<K: Hash + Eq> IgnoreSet<K> for KeyIgnoreList<K> {
    fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }
}

/// Predicate-based ignore set, e.g. `|key: &u64| *key >= 1000`.
impl<K, F> IgnoreSet<K> for F
where
    F: Fn(&K) -> bool,
{
    fn contains(&self, key: &K) -> bool {
        self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut list = KeyIgnoreList::new();
        assert!(list.insert(7u64));
        assert!(!list.insert(7));
        assert!(list.contains(&7));

        assert!(list.remove(&7));
        assert!(!list.contains(&7));
        assert!(list.is_empty());
    }

    #[test]
    fn test_collect_and_predicate() {
        let list: KeyIgnoreList<&str> = ["a", "b"].into_iter().collect();
        assert_eq!(list.len(), 2);
        assert!(IgnoreSet::contains(&list, &"b"));

        let above = |key: &u64| *key >= 100;
        assert!(IgnoreSet::contains(&above, &100));
        assert!(!IgnoreSet::contains(&above, &5));
    }
}
