//! Subscriber lists for tree and label consumers.

use std::sync::Arc;

use tracing::trace;

use crate::traits::{LabelConsumer, TreeConsumer};
use crate::tree::SharedTree;

/// Token returned on registration; pass it back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

struct Entry<C: ?Sized> {
    id: ConsumerId,
    consumer: Box<C>,
}

/// Holds tree-data consumers and label-filter consumers in registration order.
pub struct ConsumerRegistry<K> {
    tree_consumers: Vec<Entry<dyn TreeConsumer<K>>>,
    label_consumers: Vec<Entry<dyn LabelConsumer>>,
    next_id: u64,
}

impl<K> ConsumerRegistry<K> {
    pub fn new() -> Self {
        Self {
            tree_consumers: Vec::new(),
            label_consumers: Vec::new(),
            next_id: 0,
        }
    }

    fn allocate_id(&mut self) -> ConsumerId {
        let id = ConsumerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Delivers `tree` to the consumer right away, then subscribes it.
    pub fn add_tree_consumer(
        &mut self,
        mut consumer: Box<dyn TreeConsumer<K>>,
        tree: &SharedTree<K>,
    ) -> ConsumerId {
        consumer.set_tree(tree);
        let id = self.allocate_id();
        trace!(?id, "tree consumer registered");
        self.tree_consumers.push(Entry { id, consumer });
        id
    }

    /// Delivers `labels` to the consumer right away, then subscribes it.
    pub fn add_label_consumer(
        &mut self,
        mut consumer: Box<dyn LabelConsumer>,
        labels: &[Arc<str>],
    ) -> ConsumerId {
        consumer.set_labels(labels);
        let id = self.allocate_id();
        trace!(?id, "label consumer registered");
        self.label_consumers.push(Entry { id, consumer });
        id
    }

    /// Removes a consumer of either kind. Returns `false` for unknown ids.
    pub fn remove(&mut self, id: ConsumerId) -> bool {
        if let Some(pos) = self.tree_consumers.iter().position(|e| e.id == id) {
            self.tree_consumers.remove(pos);
            return true;
        }
        if let Some(pos) = self.label_consumers.iter().position(|e| e.id == id) {
            self.label_consumers.remove(pos);
            return true;
        }
        false
    }

    /// Pushes the shared tree and the label listing to every consumer, in
    /// registration order. Every tree consumer receives the same handle.
    pub fn notify(&mut self, tree: &SharedTree<K>, labels: &[Arc<str>]) {
        for entry in &mut self.tree_consumers {
            entry.consumer.set_tree(tree);
        }
        for entry in &mut self.label_consumers {
            entry.consumer.set_labels(labels);
        }
        trace!(
            tree_consumers = self.tree_consumers.len(),
            label_consumers = self.label_consumers.len(),
            "consumers notified"
        );
    }

    pub fn tree_consumer_count(&self) -> usize {
        self.tree_consumers.len()
    }

    pub fn label_consumer_count(&self) -> usize {
        self.label_consumers.len()
    }
}

impl<K> Default for ConsumerRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}
