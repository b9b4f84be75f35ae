//! JSON-Lines hierarchy dumps.
//!
//! A dump is one preorder snapshot of a hierarchy:
//!
//! ```text
//! {"type":"header","version":"1.0","metadata":{"scene":"Main"}}
//! {"type":"node","depth":0,"id":10,"name":"Main Camera","labels":["Transform","Camera"]}
//! {"type":"node","depth":1,"id":11,"name":"Rig"}
//! {"type":"footer","total_nodes":2}
//! ```
//!
//! A node without a `labels` field is unresolvable and ends up with an empty
//! label set. Files ending in `.br` are Brotli-compressed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use brotli::Decompressor;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SyncError;
use crate::sync::LabelPolicy;
use crate::traits::{Facet, LabelResolver, RecordId, TraversalEntry, TraversalSource};

/// Dump format version written by [`crate::DumpWriter`].
pub const DUMP_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpHeader {
    pub version: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Default for DumpHeader {
    fn default() -> Self {
        Self {
            version: DUMP_VERSION.to_string(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// One dumped hierarchy entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpNode {
    pub depth: usize,
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    /// `None` when the dumping side could not resolve the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum DumpLine {
    #[serde(rename = "header")]
    Header {
        version: String,
        #[serde(default)]
        metadata: serde_json::Value,
    },
    #[serde(rename = "node")]
    Node(DumpNode),
    #[serde(rename = "footer")]
    Footer { total_nodes: Option<usize> },
}

/// A parsed dump.
#[derive(Debug, Clone, Default)]
pub struct HierarchyDump {
    pub header: DumpHeader,
    pub nodes: Vec<DumpNode>,
    index_by_id: HashMap<RecordId, usize>,
}

impl HierarchyDump {
    /// Builds a dump from preorder nodes. Ids must be unique.
    pub fn from_nodes(header: DumpHeader, nodes: Vec<DumpNode>) -> Result<Self, SyncError> {
        let mut index_by_id = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            if index_by_id.insert(node.id, index).is_some() {
                return Err(SyncError::DuplicateId {
                    id: node.id,
                    line: index + 1,
                });
            }
        }
        Ok(Self {
            header,
            nodes,
            index_by_id,
        })
    }

    pub fn node(&self, id: RecordId) -> Option<&DumpNode> {
        self.index_by_id.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn name_of(&self, id: RecordId) -> Option<&str> {
        self.node(id).map(|n| n.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Parses a dump file.
///
/// # Examples
///
/// ```no_run
/// # use hiersync::parse_dump;
/// # fn main() -> anyhow::Result<()> {
/// let plain = parse_dump("scene.hier")?;
/// let compressed = parse_dump("scene.hier.br")?;
/// # Ok(())
/// # }
/// ```
pub fn parse_dump(file_path: impl AsRef<Path>) -> Result<HierarchyDump> {
    let path = file_path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;

    let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "br") {
        Box::new(BufReader::new(Decompressor::new(file, 4096)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut header: Option<DumpHeader> = None;
    let mut nodes = Vec::new();
    let mut declared_total = None;

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.with_context(|| format!("Failed to read line {}", line_num + 1))?;

        if line.trim().is_empty() {
            continue;
        }

        let dump_line: DumpLine = serde_json::from_str(&line).map_err(|source| SyncError::MalformedLine {
            line: line_num + 1,
            source,
        })?;

        match dump_line {
            DumpLine::Header { version, metadata } => {
                if line_num != 0 {
                    return Err(anyhow!("Header must be first line (found at line {})", line_num + 1));
                }
                header = Some(DumpHeader { version, metadata });
            }
            DumpLine::Node(node) => nodes.push(node),
            DumpLine::Footer { total_nodes } => declared_total = total_nodes,
        }
    }

    let header = header.ok_or_else(|| anyhow!("Missing header line"))?;

    if let Some(total) = declared_total {
        if total != nodes.len() {
            return Err(anyhow!(
                "Footer declares {} nodes but {} were read",
                total,
                nodes.len()
            ));
        }
    }

    debug!(path = %path.display(), nodes = nodes.len(), "parsed hierarchy dump");
    Ok(HierarchyDump::from_nodes(header, nodes)?)
}

/// Shared slot holding the dump currently treated as "the live hierarchy".
///
/// The source and the label resolver built from one feed always agree on
/// which dump they read, so swapping the dump between passes updates both.
#[derive(Debug, Clone, Default)]
pub struct DumpFeed {
    current: Rc<RefCell<Rc<HierarchyDump>>>,
}

impl DumpFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dump(dump: HierarchyDump) -> Self {
        Self {
            current: Rc::new(RefCell::new(Rc::new(dump))),
        }
    }

    /// Replaces the current dump. Takes effect at the next pass.
    pub fn set(&self, dump: HierarchyDump) {
        *self.current.borrow_mut() = Rc::new(dump);
    }

    /// Parses `path` and makes it the current dump.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        self.set(parse_dump(path)?);
        Ok(())
    }

    pub fn current(&self) -> Rc<HierarchyDump> {
        Rc::clone(&self.current.borrow())
    }

    pub fn source(&self) -> DumpSource {
        DumpSource {
            feed: self.clone(),
            snapshot: self.current(),
            position: 0,
        }
    }

    pub fn labels(&self, policy: LabelPolicy) -> DumpLabels {
        DumpLabels {
            feed: self.clone(),
            policy,
        }
    }
}

/// Traversal source reading the feed's current dump.
#[derive(Debug)]
pub struct DumpSource {
    feed: DumpFeed,
    snapshot: Rc<HierarchyDump>,
    position: usize,
}

impl TraversalSource<RecordId> for DumpSource {
    fn restart(&mut self) {
        self.snapshot = self.feed.current();
        self.position = 0;
    }

    fn next_entry(&mut self) -> Option<TraversalEntry<RecordId>> {
        let node = self.snapshot.nodes.get(self.position)?;
        self.position += 1;
        Some(TraversalEntry::new(node.depth, node.id))
    }
}

/// Resolves labels from the names stored in the feed's current dump.
#[derive(Debug)]
pub struct DumpLabels {
    feed: DumpFeed,
    policy: LabelPolicy,
}

impl LabelResolver<RecordId> for DumpLabels {
    fn resolve(&self, key: &RecordId) -> Option<Vec<Facet>> {
        let dump = self.feed.current();
        let names = dump.node(*key)?.labels.as_ref()?;
        Some(names.iter().map(|name| self.policy.classify(name)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(depth: usize, id: RecordId, labels: Option<&[&str]>) -> DumpNode {
        DumpNode {
            depth,
            id,
            name: format!("node{}", id),
            labels: labels.map(|l| l.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = HierarchyDump::from_nodes(
            DumpHeader::default(),
            vec![node(0, 1, None), node(1, 1, None)],
        );
        assert!(matches!(result, Err(SyncError::DuplicateId { id: 1, line: 2 })));
    }

    #[test]
    fn test_feed_swaps_source_and_labels_together() {
        let feed = DumpFeed::from_dump(
            HierarchyDump::from_nodes(DumpHeader::default(), vec![node(0, 1, Some(&["Camera"]))]).unwrap(),
        );
        let mut source = feed.source();
        let labels = feed.labels(LabelPolicy::default());

        source.restart();
        assert_eq!(source.next_entry(), Some(TraversalEntry::new(0, 1)));
        assert_eq!(labels.resolve(&1), Some(vec![Facet::Category("Camera".into())]));

        feed.set(
            HierarchyDump::from_nodes(
                DumpHeader::default(),
                vec![node(0, 2, Some(&["Transform", "Light"])), node(1, 3, None)],
            )
            .unwrap(),
        );
        source.restart();
        assert_eq!(source.next_entry(), Some(TraversalEntry::new(0, 2)));
        assert_eq!(source.next_entry(), Some(TraversalEntry::new(1, 3)));
        assert_eq!(source.next_entry(), None);

        assert_eq!(labels.resolve(&1), None);
        assert_eq!(
            labels.resolve(&2),
            Some(vec![Facet::Structural, Facet::Category("Light".into())])
        );
        assert_eq!(labels.resolve(&3), None);
    }
}
