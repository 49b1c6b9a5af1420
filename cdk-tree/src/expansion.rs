//! Shared set of expanded node keys.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use cdk_a11y::Emitter;
use futures::channel::mpsc::UnboundedReceiver;
use log::trace;

/// Keys added to and removed from an [`ExpansionModel`] by one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionChange<K> {
    /// Keys that became expanded.
    pub added: Vec<K>,
    /// Keys that were collapsed.
    pub removed: Vec<K>,
}

#[derive(Debug)]
struct ExpansionInner<K> {
    /// Expanded keys in the order they were expanded.
    order: Vec<K>,
    members: HashSet<K>,
}

/// Multi-selection set of expanded keys.
///
/// Cloning yields another handle onto the same set, so a tree and a tree
/// control can share one model. Every operation that actually changes the
/// set emits one [`ExpansionChange`] on [`changed`](Self::changed).
pub struct ExpansionModel<K> {
    inner: Arc<RwLock<ExpansionInner<K>>>,
    changed: Arc<Emitter<ExpansionChange<K>>>,
}

impl<K> Clone for ExpansionModel<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            changed: Arc::clone(&self.changed),
        }
    }
}

impl<K: Clone + Eq + Hash> Default for ExpansionModel<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Eq + Hash> ExpansionModel<K> {
    /// Create an empty model.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ExpansionInner {
                order: Vec::new(),
                members: HashSet::new(),
            })),
            changed: Arc::new(Emitter::new()),
        }
    }

    /// Stream of changes to the set.
    pub fn changed(&self) -> UnboundedReceiver<ExpansionChange<K>> {
        self.changed.subscribe()
    }

    /// Whether `key` is expanded.
    pub fn is_selected(&self, key: &K) -> bool {
        self.inner
            .read()
            .map(|g| g.members.contains(key))
            .unwrap_or(false)
    }

    /// Expanded keys in expansion order.
    pub fn selected(&self) -> Vec<K> {
        self.inner
            .read()
            .map(|g| g.order.clone())
            .unwrap_or_default()
    }

    /// Number of expanded keys.
    pub fn len(&self) -> usize {
        self.inner.read().map(|g| g.members.len()).unwrap_or(0)
    }

    /// Whether nothing is expanded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand one key.
    pub fn select(&self, key: K) {
        self.select_all([key]);
    }

    /// Expand several keys with a single change event.
    pub fn select_all(&self, keys: impl IntoIterator<Item = K>) {
        let mut added = Vec::new();
        if let Ok(mut guard) = self.inner.write() {
            for key in keys {
                if guard.members.insert(key.clone()) {
                    guard.order.push(key.clone());
                    added.push(key);
                }
            }
        }
        self.notify(added, Vec::new());
    }

    /// Collapse one key.
    pub fn deselect(&self, key: &K) {
        self.deselect_all([key.clone()]);
    }

    /// Collapse several keys with a single change event.
    pub fn deselect_all(&self, keys: impl IntoIterator<Item = K>) {
        let mut removed = Vec::new();
        if let Ok(mut guard) = self.inner.write() {
            for key in keys {
                if guard.members.remove(&key) {
                    removed.push(key);
                }
            }
            if !removed.is_empty() {
                let ExpansionInner { order, members } = &mut *guard;
                order.retain(|k| members.contains(k));
            }
        }
        self.notify(Vec::new(), removed);
    }

    /// Flip one key.
    pub fn toggle(&self, key: K) {
        if self.is_selected(&key) {
            self.deselect(&key);
        } else {
            self.select(key);
        }
    }

    /// Collapse everything.
    pub fn clear(&self) {
        let mut removed = Vec::new();
        if let Ok(mut guard) = self.inner.write() {
            guard.members.clear();
            removed = std::mem::take(&mut guard.order);
        }
        self.notify(Vec::new(), removed);
    }

    fn notify(&self, added: Vec<K>, removed: Vec<K>) {
        if added.is_empty() && removed.is_empty() {
            return;
        }
        trace!(
            "ExpansionModel: +{} -{} keys",
            added.len(),
            removed.len()
        );
        self.changed.emit(ExpansionChange { added, removed });
    }
}

impl<K: fmt::Debug> fmt::Debug for ExpansionModel<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.read() {
            Ok(guard) => f.debug_set().entries(guard.order.iter()).finish(),
            Err(_) => f.write_str("ExpansionModel(<poisoned>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{FutureExt, StreamExt};

    use super::*;

    #[test]
    fn test_select_and_deselect() {
        let model = ExpansionModel::new();
        model.select(1);
        model.select_all([2, 3]);
        assert!(model.is_selected(&2));
        assert_eq!(model.selected(), vec![1, 2, 3]);

        model.deselect(&2);
        assert_eq!(model.selected(), vec![1, 3]);
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let model = ExpansionModel::new();
        let other = model.clone();
        other.toggle("a");
        assert!(model.is_selected(&"a"));
        model.toggle("a");
        assert!(other.is_empty());
    }

    #[test]
    fn test_changes_are_only_emitted_for_real_changes() {
        let model = ExpansionModel::new();
        let mut changes = model.changed();

        model.select_all([1, 2]);
        assert_eq!(
            changes.next().now_or_never(),
            Some(Some(ExpansionChange {
                added: vec![1, 2],
                removed: vec![]
            }))
        );

        model.select(1);
        model.deselect(&5);
        assert!(changes.next().now_or_never().is_none());

        model.clear();
        assert_eq!(
            changes.next().now_or_never(),
            Some(Some(ExpansionChange {
                added: vec![],
                removed: vec![1, 2]
            }))
        );
    }
}
