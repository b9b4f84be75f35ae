use std::collections::HashSet;
use std::sync::Arc;

/// Interning pool for label strings.
///
/// Every visited node gets its label set rebuilt on every pass, and the same
/// handful of category names repeat across thousands of nodes. Interning lets
/// each node hold cheap `Arc<str>` clones of a single allocation per label,
/// and keeps those allocations alive across passes.
///
/// # Examples
///
/// ```
/// use hiersync::LabelInterner;
/// use std::sync::Arc;
///
/// let mut interner = LabelInterner::new();
/// let a = interner.intern("Camera");
/// let b = interner.intern("Camera");
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Default)]
pub struct LabelInterner {
    pool: HashSet<Arc<str>>,
}

impl LabelInterner {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        LabelInterner {
            pool: HashSet::with_capacity(capacity),
        }
    }

    /// Returns the pooled `Arc<str>` for `label`, allocating it on first use.
    pub fn intern(&mut self, label: &str) -> Arc<str> {
        if let Some(existing) = self.pool.get(label) {
            return Arc::clone(existing);
        }
        let arc: Arc<str> = Arc::from(label);
        self.pool.insert(Arc::clone(&arc));
        arc
    }

    /// Drops pooled labels no longer referenced outside the pool.
    ///
    /// Returns the number of labels released.
    pub fn purge_unused(&mut self) -> usize {
        let before = self.pool.len();
        self.pool.retain(|label| Arc::strong_count(label) > 1);
        before - self.pool.len()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}
