//! Reconciliation core.
//!
//! - Tree synchronizer (one in-place pass per call, reports structural change)
//! - Label accumulation (per-node and global label sets, rebuilt every pass)
//! - Consumer registry (tree and label subscribers)

pub mod labels;
pub mod registry;
pub mod synchronizer;

pub use labels::{LabelAccumulator, LabelPolicy, DEFAULT_BEHAVIOR_NAMES, DEFAULT_UMBRELLA_LABEL};
pub use registry::{ConsumerId, ConsumerRegistry};
pub use synchronizer::{PassStats, TreeSynchronizer};
