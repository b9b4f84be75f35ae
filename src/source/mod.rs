//! Concrete traversal sources.
//!
//! - [`VecSource`]: an in-memory entry list
//! - [`DumpFeed`]: JSON-Lines hierarchy dumps, with a matching label resolver
//! - [`VirtualHierarchy`]: seeded random hierarchies with mutation support

pub mod dump;
pub mod vec_source;
pub mod virtual_hierarchy;

pub use dump::{parse_dump, DumpFeed, DumpHeader, DumpLabels, DumpNode, DumpSource, HierarchyDump};
pub use vec_source::VecSource;
pub use virtual_hierarchy::{Mutation, VirtualHierarchy, VirtualNode};
