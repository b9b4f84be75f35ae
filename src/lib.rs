//! Incremental synchronization of a cached, ordered tree against a live
//! hierarchy that is only observable as a depth-first preorder walk.
//!
//! ```
//! use hiersync::{KeyIgnoreList, TreeSynchronizer, VecSource, Facet};
//!
//! let source = VecSource::from_pairs(&[(0, "A"), (1, "A1"), (0, "B")]);
//! let resolver = |_: &&str| -> Option<Vec<Facet>> { None };
//! let mut sync = TreeSynchronizer::new(source, resolver, KeyIgnoreList::new());
//!
//! assert!(sync.synchronize());
//! assert!(!sync.synchronize());
//! assert_eq!(sync.tree().borrow().len(), 3);
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod ignore;
pub mod notify;
pub mod source;
pub mod string_intern;
pub mod sync;
pub mod traits;
pub mod tree;
pub mod writer;

// Export traits
pub use traits::{
    ChangeNotifier, Facet, IgnoreSet, LabelConsumer, LabelResolver, ListenerId, NodeKey, RecordId,
    TraversalEntry, TraversalSource, TreeConsumer,
};

// Export core
pub use sync::{
    ConsumerId, ConsumerRegistry, LabelAccumulator, LabelPolicy, PassStats, TreeSynchronizer,
    DEFAULT_BEHAVIOR_NAMES, DEFAULT_UMBRELLA_LABEL,
};
pub use tree::{CachedTree, NodeId, NodeRef, SharedTree};

// Export lifecycle
pub use coordinator::HierarchyModule;
pub use notify::ChangeBus;

// Export sources, dumps and writer
pub use source::{
    parse_dump, DumpFeed, DumpLabels, DumpNode, DumpSource, HierarchyDump, Mutation, VecSource,
    VirtualHierarchy,
};
pub use writer::DumpWriter;

pub use config::SyncConfig;
pub use error::SyncError;
pub use ignore::KeyIgnoreList;
pub use string_intern::LabelInterner;
