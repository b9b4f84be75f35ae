//! Label accumulation.
//!
//! Every visited node has its own label set rebuilt from the resolver on
//! every pass, and the process-wide label set is the union of those sets.
//! Facets are mapped to labels by a [`LabelPolicy`]: behaviour facets
//! collapse into one umbrella label, structural facets contribute nothing.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::string_intern::LabelInterner;
use crate::traits::{Facet, LabelResolver};

/// Umbrella label used when no policy overrides it.
pub const DEFAULT_UMBRELLA_LABEL: &str = "Behaviour";

/// Names classified as behaviours when no policy overrides them.
pub const DEFAULT_BEHAVIOR_NAMES: &[&str] = &["PlayerController", "Spinner", "Health"];

static DEFAULT_POLICY: Lazy<LabelPolicy> = Lazy::new(|| LabelPolicy {
    umbrella_label: DEFAULT_UMBRELLA_LABEL.to_string(),
    behavior_names: DEFAULT_BEHAVIOR_NAMES.iter().map(|&name| name.to_string()).collect(),
    structural_names: ["Transform"].into_iter().map(String::from).collect(),
});

/// How facets turn into labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelPolicy {
    /// Label standing in for every [`Facet::Behavior`]
    pub umbrella_label: String,
    /// Plain names that [`LabelPolicy::classify`] treats as behaviours
    pub behavior_names: HashSet<String>,
    /// Plain names that [`LabelPolicy::classify`] treats as structural
    pub structural_names: HashSet<String>,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        DEFAULT_POLICY.clone()
    }
}

impl LabelPolicy {
    /// Classifies a plain category name reported by a string-based source.
    pub fn classify(&self, name: &str) -> Facet {
        if self.structural_names.contains(name) {
            Facet::Structural
        } else if self.behavior_names.contains(name) {
            Facet::Behavior(name.to_string())
        } else {
            Facet::Category(name.to_string())
        }
    }

    /// The label a facet contributes, if any.
    pub fn label_for<'a>(&'a self, facet: &'a Facet) -> Option<&'a str> {
        match facet {
            Facet::Category(name) => Some(name.as_str()),
            Facet::Behavior(_) => Some(self.umbrella_label.as_str()),
            Facet::Structural => None,
        }
    }
}

/// Rebuilds per-node label sets and the global label set during a pass.
#[derive(Debug)]
pub struct LabelAccumulator {
    policy: LabelPolicy,
    interner: LabelInterner,
    global: BTreeSet<Arc<str>>,
}

impl LabelAccumulator {
    pub fn new(policy: LabelPolicy) -> Self {
        Self {
            policy,
            interner: LabelInterner::new(),
            global: BTreeSet::new(),
        }
    }

    pub fn policy(&self) -> &LabelPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: LabelPolicy) {
        self.policy = policy;
    }

    /// Discards the global set ahead of a new pass.
    pub fn begin_pass(&mut self) {
        self.global.clear();
    }

    /// Drops interned labels that no node or global set references anymore.
    pub fn end_pass(&mut self) {
        let released = self.interner.purge_unused();
        if released > 0 {
            trace!(released, "released unused labels");
        }
    }

    /// Replaces `node_labels` with the labels resolved for `key` and merges
    /// them into the global set.
    ///
    /// An unresolvable key leaves `node_labels` empty.
    pub fn accumulate<K, R>(&mut self, resolver: &R, key: &K, node_labels: &mut BTreeSet<Arc<str>>)
    where
        K: std::fmt::Debug,
        R: LabelResolver<K> + ?Sized,
    {
        node_labels.clear();

        let Some(facets) = resolver.resolve(key) else {
            trace!(?key, "key has no resolvable labels");
            return;
        };

        for facet in &facets {
            let Some(name) = self.policy.label_for(facet) else {
                continue;
            };
            let label = self.interner.intern(name);
            node_labels.insert(Arc::clone(&label));
            self.global.insert(label);
        }
    }

    /// Global label set from the most recent pass.
    pub fn labels(&self) -> &BTreeSet<Arc<str>> {
        &self.global
    }

    /// Sorted listing of the global label set, as handed to label consumers.
    pub fn listing(&self) -> Vec<Arc<str>> {
        self.global.iter().cloned().collect()
    }
}

impl Default for LabelAccumulator {
    fn default() -> Self {
        Self::new(LabelPolicy::default())
    }
}
