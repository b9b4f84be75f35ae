//! Hierarchy module: the synchronizer plus its consumers and lifecycle.
//!
//! Every trigger (activation, an external "hierarchy changed" signal, a
//! selection change) funnels into [`HierarchyModule::refresh`], which runs
//! one pass and notifies consumers only if the tree changed structurally.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::sync::{ConsumerId, ConsumerRegistry, PassStats, TreeSynchronizer};
use crate::traits::{
    ChangeNotifier, IgnoreSet, LabelConsumer, LabelResolver, ListenerId, NodeKey, TraversalSource,
    TreeConsumer,
};
use crate::tree::SharedTree;

pub struct HierarchyModule<K, S, R, I> {
    synchronizer: TreeSynchronizer<K, S, R, I>,
    registry: ConsumerRegistry<K>,
    subscription: Option<ListenerId>,
}

impl<K, S, R, I> HierarchyModule<K, S, R, I>
where
    K: NodeKey,
    S: TraversalSource<K>,
    R: LabelResolver<K>,
    I: IgnoreSet<K>,
{
    pub fn new(synchronizer: TreeSynchronizer<K, S, R, I>) -> Self {
        Self {
            synchronizer,
            registry: ConsumerRegistry::new(),
            subscription: None,
        }
    }

    /// Runs one pass; on structural change pushes the tree and label listing
    /// to every consumer. Returns whether the tree changed.
    pub fn refresh(&mut self) -> bool {
        let changed = self.synchronizer.synchronize();
        if changed {
            let labels = self.synchronizer.label_listing();
            self.registry.notify(self.synchronizer.tree(), &labels);
        }
        changed
    }

    /// Trigger for an external selection change.
    pub fn on_selection_changed(&mut self) -> bool {
        debug!("selection changed");
        self.refresh()
    }

    /// Trigger for an external "hierarchy changed" signal.
    pub fn on_hierarchy_changed(&mut self) -> bool {
        self.refresh()
    }

    /// Registers a tree consumer; it receives the current tree immediately.
    pub fn add_tree_consumer(&mut self, consumer: impl TreeConsumer<K> + 'static) -> ConsumerId {
        self.registry
            .add_tree_consumer(Box::new(consumer), self.synchronizer.tree())
    }

    /// Registers a label consumer; it receives the current listing immediately.
    pub fn add_label_consumer(&mut self, consumer: impl LabelConsumer + 'static) -> ConsumerId {
        let labels = self.synchronizer.label_listing();
        self.registry.add_label_consumer(Box::new(consumer), &labels)
    }

    pub fn remove_consumer(&mut self, id: ConsumerId) -> bool {
        self.registry.remove(id)
    }

    pub fn tree(&self) -> &SharedTree<K> {
        self.synchronizer.tree()
    }

    pub fn labels(&self) -> &BTreeSet<Arc<str>> {
        self.synchronizer.labels()
    }

    pub fn last_pass(&self) -> PassStats {
        self.synchronizer.last_pass()
    }

    pub fn synchronizer(&self) -> &TreeSynchronizer<K, S, R, I> {
        &self.synchronizer
    }

    pub fn synchronizer_mut(&mut self) -> &mut TreeSynchronizer<K, S, R, I> {
        &mut self.synchronizer
    }

    pub fn registry(&self) -> &ConsumerRegistry<K> {
        &self.registry
    }

    pub fn is_started(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn into_shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Detaches from `notifier`. The module keeps its tree and consumers.
    pub fn stop(&mut self, notifier: &mut dyn ChangeNotifier) -> Result<(), SyncError> {
        let id = self.subscription.take().ok_or(SyncError::NotStarted)?;
        if !notifier.unsubscribe(id) {
            warn!(?id, "notifier had no matching subscription");
        }
        info!("hierarchy module stopped");
        Ok(())
    }
}

impl<K, S, R, I> HierarchyModule<K, S, R, I>
where
    K: NodeKey + 'static,
    S: TraversalSource<K> + 'static,
    R: LabelResolver<K> + 'static,
    I: IgnoreSet<K> + 'static,
{
    /// Attaches the module to `notifier` and runs the activation pass.
    ///
    /// The listener only holds a weak handle; a change signal arriving while
    /// the module is already borrowed (a pass or consumer call in flight) is
    /// dropped with a warning.
    pub fn start(this: &Rc<RefCell<Self>>, notifier: &mut dyn ChangeNotifier) -> Result<bool, SyncError> {
        match this.try_borrow() {
            Ok(module) if module.is_started() => return Err(SyncError::AlreadyStarted),
            Ok(_) => {}
            Err(_) => {
                warn!("start requested while the module is in use");
                return Err(SyncError::AlreadyStarted);
            }
        }

        let weak = Rc::downgrade(this);
        let id = notifier.subscribe(Box::new(move || {
            let Some(module) = weak.upgrade() else {
                return;
            };
            match module.try_borrow_mut() {
                Ok(mut module) => {
                    module.on_hierarchy_changed();
                }
                Err(_) => warn!("change signal arrived during a pass; ignoring"),
            };
        }));

        let mut module = this.borrow_mut();
        module.subscription = Some(id);
        info!(?id, "hierarchy module started");
        Ok(module.refresh())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::KeyIgnoreList;
    use crate::notify::ChangeBus;
    use crate::source::VecSource;
    use crate::traits::Facet;

    type Module = HierarchyModule<
        &'static str,
        VecSource<&'static str>,
        fn(&&'static str) -> Option<Vec<Facet>>,
        KeyIgnoreList<&'static str>,
    >;

    fn facets(key: &&'static str) -> Option<Vec<Facet>> {
        Some(vec![Facet::Category(key.to_lowercase())])
    }

    fn module(pairs: &[(usize, &'static str)]) -> Module {
        HierarchyModule::new(TreeSynchronizer::new(
            VecSource::from_pairs(pairs),
            facets as fn(&&'static str) -> Option<Vec<Facet>>,
            KeyIgnoreList::new(),
        ))
    }

    #[test]
    fn test_refresh_notifies_only_on_change() {
        let mut module = module(&[(0, "A")]);
        let deliveries = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&deliveries);
        module.add_tree_consumer(move |_: &SharedTree<&'static str>| *counter.borrow_mut() += 1);
        assert_eq!(*deliveries.borrow(), 1);

        assert!(module.refresh());
        assert_eq!(*deliveries.borrow(), 2);

        assert!(!module.refresh());
        assert_eq!(*deliveries.borrow(), 2);
    }

    #[test]
    fn test_label_consumer_gets_rebuilt_listing() {
        let mut module = module(&[(0, "A"), (1, "B")]);
        let seen: Rc<RefCell<Vec<String>>> = Rc::default();
        let sink = Rc::clone(&seen);
        module.add_label_consumer(move |labels: &[Arc<str>]| {
            *sink.borrow_mut() = labels.iter().map(|l| l.to_string()).collect();
        });
        assert!(seen.borrow().is_empty());

        module.refresh();
        assert_eq!(*seen.borrow(), vec!["a", "b"]);

        module.synchronizer_mut().source_mut().set_pairs(&[(0, "A")]);
        module.on_selection_changed();
        assert_eq!(*seen.borrow(), vec!["a"]);
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let module = module(&[(0, "A")]).into_shared();
        let mut bus = ChangeBus::new();

        assert_eq!(HierarchyModule::start(&module, &mut bus).unwrap(), true);
        assert!(matches!(
            HierarchyModule::start(&module, &mut bus),
            Err(SyncError::AlreadyStarted)
        ));
        assert_eq!(module.borrow().tree().borrow().len(), 1);

        module
            .borrow_mut()
            .synchronizer_mut()
            .source_mut()
            .set_pairs(&[(0, "A"), (0, "B")]);
        bus.emit();
        assert_eq!(module.borrow().tree().borrow().len(), 2);

        module.borrow_mut().stop(&mut bus).unwrap();
        assert_eq!(bus.listener_count(), 0);
        assert!(matches!(module.borrow_mut().stop(&mut bus), Err(SyncError::NotStarted)));

        module.borrow_mut().synchronizer_mut().source_mut().set_pairs(&[]);
        bus.emit();
        assert_eq!(module.borrow().tree().borrow().len(), 2);
    }

    #[test]
    fn test_signal_during_borrow_is_dropped() {
        let module = module(&[(0, "A")]).into_shared();
        let mut bus = ChangeBus::new();
        HierarchyModule::start(&module, &mut bus).unwrap();

        module
            .borrow_mut()
            .synchronizer_mut()
            .source_mut()
            .set_pairs(&[(0, "A"), (0, "B")]);
        {
            let _busy = module.borrow_mut();
            bus.emit();
        }
        assert_eq!(module.borrow().tree().borrow().len(), 1);
    }

    #[test]
    fn test_start_while_module_busy_is_refused() {
        let module = module(&[(0, "A")]).into_shared();
        let mut bus = ChangeBus::new();
        {
            let _busy = module.borrow_mut();
            assert!(matches!(
                HierarchyModule::start(&module, &mut bus),
                Err(SyncError::AlreadyStarted)
            ));
        }
        assert_eq!(bus.listener_count(), 0);
        assert!(!module.borrow().is_started());

        assert!(HierarchyModule::start(&module, &mut bus).unwrap());
    }
}
