//! Tree control over pre-flattened, level-tagged data.

use std::hash::Hash;
use std::sync::{Arc, RwLock};

use super::{ExpandablePredicate, ExpansionKey, LevelAccessor, TreeControl};
use crate::expansion::ExpansionModel;

/// Control for flat data where each node carries its depth.
///
/// `data_nodes` must be in depth-first order: a node's descendants are the
/// contiguous run of deeper nodes that follows it.
pub struct FlatTreeControl<T, K = T> {
    level: LevelAccessor<T>,
    expandable: ExpandablePredicate<T>,
    key: ExpansionKey<T, K>,
    data_nodes: RwLock<Vec<T>>,
    expansion: ExpansionModel<K>,
}

impl<T> FlatTreeControl<T, T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Create a control keyed by the nodes themselves.
    pub fn new(
        level: impl Fn(&T) -> usize + Send + Sync + 'static,
        expandable: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::with_track_by(level, expandable, T::clone)
    }
}

impl<T, K> FlatTreeControl<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Create a control keyed by `track_by`.
    pub fn with_track_by(
        level: impl Fn(&T) -> usize + Send + Sync + 'static,
        expandable: impl Fn(&T) -> bool + Send + Sync + 'static,
        track_by: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        Self {
            level: Arc::new(level),
            expandable: Arc::new(expandable),
            key: Arc::new(track_by),
            data_nodes: RwLock::new(Vec::new()),
            expansion: ExpansionModel::new(),
        }
    }

    /// Depth of `node`.
    pub fn level(&self, node: &T) -> usize {
        (self.level)(node)
    }
}

impl<T, K> TreeControl<T, K> for FlatTreeControl<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn expansion_model(&self) -> &ExpansionModel<K> {
        &self.expansion
    }

    fn key_of(&self, node: &T) -> K {
        (self.key)(node)
    }

    fn data_nodes(&self) -> Vec<T> {
        self.data_nodes.read().map(|g| g.clone()).unwrap_or_default()
    }

    fn set_data_nodes(&self, nodes: Vec<T>) {
        if let Ok(mut guard) = self.data_nodes.write() {
            *guard = nodes;
        }
    }

    /// The contiguous run of deeper nodes after `node`. Unknown nodes have no
    /// descendants.
    fn descendants(&self, node: &T) -> Vec<T> {
        let Ok(nodes) = self.data_nodes.read() else {
            return Vec::new();
        };
        let key = self.key_of(node);
        let Some(start) = nodes.iter().position(|n| self.key_of(n) == key) else {
            return Vec::new();
        };
        let level = self.level(node);
        nodes[start + 1..]
            .iter()
            .take_while(|n| self.level(n) > level)
            .cloned()
            .collect()
    }

    fn expand_all(&self) {
        let keys: Vec<K> = self.data_nodes().iter().map(|n| self.key_of(n)).collect();
        self.expansion.select_all(keys);
    }

    fn level_accessor(&self) -> Option<LevelAccessor<T>> {
        Some(Arc::clone(&self.level))
    }

    fn expandable(&self, node: &T) -> Option<bool> {
        Some((self.expandable)(node))
    }
}
