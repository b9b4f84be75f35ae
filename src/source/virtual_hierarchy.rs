use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::dump::{DumpHeader, DumpNode, HierarchyDump};
use crate::sync::DEFAULT_BEHAVIOR_NAMES;
use crate::traits::{RecordId, TraversalEntry};

const DEFAULT_MAX_DEPTH: usize = 4;
const DEFAULT_MAX_CHILDREN: usize = 5;

/// Category names handed out to generated nodes.
pub const CATEGORY_NAMES: &[&str] = &["Camera", "Light", "MeshRenderer", "Collider", "AudioSource"];

/// Behaviour names handed out to generated nodes; the default label policy
/// collapses them under the umbrella label.
pub const BEHAVIOR_NAMES: &[&str] = DEFAULT_BEHAVIOR_NAMES;

/// Structural name every generated node carries.
pub const STRUCTURAL_NAME: &str = "Transform";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualNode {
    pub id: RecordId,
    pub name: String,
    /// `None` marks an entity whose labels cannot be resolved
    pub labels: Option<Vec<String>>,
    pub children: Vec<VirtualNode>,
}

/// An edit applied by [`VirtualHierarchy::mutate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// New leaf inserted among `parent`'s children (`None` = top level)
    Insert { parent: Option<RecordId>, index: usize, id: RecordId },
    /// Node and its subtree removed
    Remove { id: RecordId },
    /// Node took a new identity at the same position, keeping its children
    Replace { old: RecordId, new: RecordId },
    /// Two siblings traded places
    Swap { a: RecordId, b: RecordId },
    /// Labels regenerated without structural change
    Relabel { id: RecordId },
}

/// Seeded random hierarchy that can be edited step by step.
///
/// Used to produce series of dumps that differ by small edits, the way a
/// live hierarchy evolves between synchronization passes.
#[derive(Debug, Clone)]
pub struct VirtualHierarchy {
    roots: Vec<VirtualNode>,
    next_id: RecordId,
    rng: StdRng,
    max_children: usize,
}

impl VirtualHierarchy {
    pub fn new(seed: u64) -> Self {
        Self::with_config(DEFAULT_MAX_DEPTH, DEFAULT_MAX_CHILDREN, seed)
    }

    pub fn with_config(max_depth: usize, max_children: usize, seed: u64) -> Self {
        let mut hierarchy = Self {
            roots: Vec::new(),
            next_id: 1,
            rng: StdRng::seed_from_u64(seed),
            max_children: max_children.max(1),
        };

        let num_roots = hierarchy.rng.gen_range(1..=hierarchy.max_children);
        for _ in 0..num_roots {
            let root = hierarchy.generate(0, max_depth);
            hierarchy.roots.push(root);
        }
        hierarchy
    }

    /// Empty hierarchy, grown only through [`mutate`](Self::mutate).
    pub fn empty(seed: u64) -> Self {
        Self {
            roots: Vec::new(),
            next_id: 1,
            rng: StdRng::seed_from_u64(seed),
            max_children: DEFAULT_MAX_CHILDREN,
        }
    }

    fn generate(&mut self, depth: usize, max_depth: usize) -> VirtualNode {
        let mut node = self.leaf();
        if depth < max_depth {
            let num_children = self.rng.gen_range(0..=self.max_children);
            for _ in 0..num_children {
                let child = self.generate(depth + 1, max_depth);
                node.children.push(child);
            }
        }
        node
    }

    fn fresh_id(&mut self) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn leaf(&mut self) -> VirtualNode {
        let id = self.fresh_id();
        VirtualNode {
            id,
            name: format!("Object{}", id),
            labels: self.random_labels(),
            children: Vec::new(),
        }
    }

    fn random_labels(&mut self) -> Option<Vec<String>> {
        // Roughly one in twenty entities cannot be resolved
        if self.rng.gen_ratio(1, 20) {
            return None;
        }
        let mut labels = vec![STRUCTURAL_NAME.to_string()];
        for _ in 0..self.rng.gen_range(0..=2) {
            if let Some(name) = CATEGORY_NAMES.choose(&mut self.rng) {
                labels.push(name.to_string());
            }
        }
        if self.rng.gen_bool(0.3) {
            if let Some(name) = BEHAVIOR_NAMES.choose(&mut self.rng) {
                labels.push(name.to_string());
            }
        }
        Some(labels)
    }

    pub fn roots(&self) -> &[VirtualNode] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.walk().count()
    }

    /// Depth-first preorder walk yielding `(depth, node)`.
    pub fn walk(&self) -> impl Iterator<Item = (usize, &VirtualNode)> + '_ {
        let mut stack: Vec<(usize, &VirtualNode)> = self.roots.iter().rev().map(|n| (0, n)).collect();
        std::iter::from_fn(move || {
            let (depth, node) = stack.pop()?;
            stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
            Some((depth, node))
        })
    }

    pub fn preorder(&self) -> Vec<TraversalEntry<RecordId>> {
        self.walk()
            .map(|(depth, node)| TraversalEntry::new(depth, node.id))
            .collect()
    }

    pub fn find(&self, id: RecordId) -> Option<&VirtualNode> {
        self.walk().map(|(_, n)| n).find(|n| n.id == id)
    }

    pub fn to_dump(&self) -> HierarchyDump {
        let nodes = self
            .walk()
            .map(|(depth, node)| DumpNode {
                depth,
                id: node.id,
                name: node.name.clone(),
                labels: node.labels.clone(),
            })
            .collect();
        let header = DumpHeader {
            metadata: serde_json::json!({ "generator": "virtual" }),
            ..DumpHeader::default()
        };
        // Ids come from a monotonic counter, so they are unique
        HierarchyDump::from_nodes(header, nodes).unwrap_or_default()
    }

    /// Index paths of every node, in preorder.
    fn paths(&self) -> Vec<Vec<usize>> {
        let mut paths = Vec::new();
        let mut stack: Vec<(Vec<usize>, &VirtualNode)> = self
            .roots
            .iter()
            .enumerate()
            .rev()
            .map(|(i, n)| (vec![i], n))
            .collect();
        while let Some((path, node)) = stack.pop() {
            for (i, child) in node.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i);
                stack.push((child_path, child));
            }
            paths.push(path);
        }
        paths
    }

    fn siblings_mut(&mut self, parent_path: &[usize]) -> &mut Vec<VirtualNode> {
        let mut list = &mut self.roots;
        for &index in parent_path {
            list = &mut list[index].children;
        }
        list
    }

    fn node_mut(&mut self, path: &[usize]) -> &mut VirtualNode {
        let (last, parent) = path.split_last().expect("node path is never empty");
        &mut self.siblings_mut(parent)[*last]
    }

    /// Applies one random edit and reports it.
    pub fn mutate(&mut self) -> Mutation {
        let paths = self.paths();
        if paths.is_empty() {
            return self.insert_random(&paths);
        }

        match self.rng.gen_range(0..5) {
            0 => self.insert_random(&paths),
            1 => {
                let path = paths[self.rng.gen_range(0..paths.len())].clone();
                let (last, parent) = path.split_last().expect("node path is never empty");
                let removed = self.siblings_mut(parent).remove(*last);
                Mutation::Remove { id: removed.id }
            }
            2 => {
                let path = paths[self.rng.gen_range(0..paths.len())].clone();
                let new = self.fresh_id();
                let labels = self.random_labels();
                let node = self.node_mut(&path);
                let old = std::mem::replace(&mut node.id, new);
                node.name = format!("Object{}", new);
                node.labels = labels;
                Mutation::Replace { old, new }
            }
            3 => {
                let path = paths[self.rng.gen_range(0..paths.len())].clone();
                let (_, parent) = path.split_last().expect("node path is never empty");
                let parent = parent.to_vec();
                let len = self.siblings_mut(&parent).len();
                if len < 2 {
                    return self.insert_random(&paths);
                }
                let a = self.rng.gen_range(0..len);
                let b = (a + self.rng.gen_range(1..len)) % len;
                let siblings = self.siblings_mut(&parent);
                siblings.swap(a, b);
                Mutation::Swap {
                    a: siblings[b].id,
                    b: siblings[a].id,
                }
            }
            _ => {
                let path = paths[self.rng.gen_range(0..paths.len())].clone();
                let labels = self.random_labels();
                let node = self.node_mut(&path);
                node.labels = labels;
                Mutation::Relabel { id: node.id }
            }
        }
    }

    fn insert_random(&mut self, paths: &[Vec<usize>]) -> Mutation {
        // Pick a parent among existing nodes, or the top level
        let choice = self.rng.gen_range(0..=paths.len());
        let parent_path = paths.get(choice).cloned();
        let leaf = self.leaf();
        let id = leaf.id;

        let parent_id = match &parent_path {
            Some(path) => Some(self.node_mut(path).id),
            None => None,
        };
        let siblings_len = match &parent_path {
            Some(path) => self.node_mut(path).children.len(),
            None => self.roots.len(),
        };
        let index = self.rng.gen_range(0..=siblings_len);
        match &parent_path {
            Some(path) => self.node_mut(path).children.insert(index, leaf),
            None => self.roots.insert(index, leaf),
        }

        Mutation::Insert {
            parent: parent_id,
            index,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_reproducible() {
        let a = VirtualHierarchy::with_config(3, 3, 7);
        let b = VirtualHierarchy::with_config(3, 3, 7);
        assert_eq!(a.preorder(), b.preorder());
        assert!(a.node_count() >= 1);
    }

    #[test]
    fn test_preorder_depths_step_by_at_most_one() {
        let h = VirtualHierarchy::new(11);
        let entries = h.preorder();
        assert_eq!(entries[0].depth, 0);
        for pair in entries.windows(2) {
            assert!(pair[1].depth <= pair[0].depth + 1);
        }
    }

    #[test]
    fn test_mutations_keep_ids_unique() {
        let mut h = VirtualHierarchy::with_config(2, 3, 3);
        for _ in 0..200 {
            h.mutate();
            let mut ids: Vec<_> = h.preorder().into_iter().map(|e| e.key).collect();
            let total = ids.len();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), total);
        }
    }

    #[test]
    fn test_remove_and_insert_reported() {
        let mut h = VirtualHierarchy::empty(5);
        match h.mutate() {
            Mutation::Insert { parent: None, index: 0, id } => assert_eq!(h.roots()[0].id, id),
            other => panic!("expected top-level insert, got {:?}", other),
        }
        assert_eq!(h.to_dump().len(), 1);
    }
}
