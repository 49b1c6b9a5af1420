//! Tree control over nested data.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use cdk_a11y::Children;
use log::trace;

use super::{ChildrenAccessor, ExpandablePredicate, ExpansionKey, TreeControl};
use crate::expansion::ExpansionModel;

/// Control for nested data where each node knows its children.
///
/// `data_nodes` holds the root nodes.
pub struct NestedTreeControl<T, K = T> {
    children: ChildrenAccessor<T>,
    expandable: Option<ExpandablePredicate<T>>,
    key: ExpansionKey<T, K>,
    data_nodes: RwLock<Vec<T>>,
    expansion: ExpansionModel<K>,
}

impl<T> NestedTreeControl<T, T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Create a control keyed by the nodes themselves.
    pub fn new(children: impl Fn(&T) -> Children<T> + Send + Sync + 'static) -> Self {
        Self::with_track_by(children, T::clone)
    }
}

impl<T, K> NestedTreeControl<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Create a control keyed by `track_by`.
    pub fn with_track_by(
        children: impl Fn(&T) -> Children<T> + Send + Sync + 'static,
        track_by: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        Self {
            children: Arc::new(children),
            expandable: None,
            key: Arc::new(track_by),
            data_nodes: RwLock::new(Vec::new()),
            expansion: ExpansionModel::new(),
        }
    }

    /// Tell the control which nodes can be expanded.
    pub fn is_expandable(mut self, expandable: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.expandable = Some(Arc::new(expandable));
        self
    }

    /// Direct children of `node`.
    pub fn children(&self, node: &T) -> Children<T> {
        (self.children)(node)
    }

    /// Every descendant of `node`, waiting for children that are still
    /// loading.
    pub async fn descendants_async(&self, node: &T) -> Vec<T> {
        let mut results = Vec::new();
        let mut seen = HashSet::from([self.key_of(node)]);
        let mut stack = vec![self.children(node).first().await.into_iter()];
        while let Some(level) = stack.last_mut() {
            let Some(child) = level.next() else {
                stack.pop();
                continue;
            };
            if !seen.insert(self.key_of(&child)) {
                continue;
            }
            let grandchildren = self.children(&child).first().await;
            results.push(child);
            stack.push(grandchildren.into_iter());
        }
        results
    }
}

impl<T, K> TreeControl<T, K> for NestedTreeControl<T, K>
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

    /// Children that have not emitted yet are skipped; use
    /// [`descendants_async`](NestedTreeControl::descendants_async) to wait
    /// for them.
    fn descendants(&self, node: &T) -> Vec<T> {
        let mut results = Vec::new();
        let mut seen = HashSet::from([self.key_of(node)]);
        let mut stack = vec![resolved_children(self.children(node)).into_iter()];
        while let Some(level) = stack.last_mut() {
            let Some(child) = level.next() else {
                stack.pop();
                continue;
            };
            if !seen.insert(self.key_of(&child)) {
                continue;
            }
            let grandchildren = resolved_children(self.children(&child));
            results.push(child);
            stack.push(grandchildren.into_iter());
        }
        results
    }

    fn expand_all(&self) {
        self.expansion.clear();
        let mut keys = Vec::new();
        for root in self.data_nodes() {
            keys.extend(self.descendants(&root).iter().map(|d| self.key_of(d)));
            keys.push(self.key_of(&root));
        }
        self.expansion.select_all(keys);
    }

    fn children_accessor(&self) -> Option<ChildrenAccessor<T>> {
        Some(Arc::clone(&self.children))
    }

    fn expandable(&self, node: &T) -> Option<bool> {
        self.expandable.as_ref().map(|expandable| expandable(node))
    }
}

fn resolved_children<T: Send + 'static>(children: Children<T>) -> Vec<T> {
    children.try_first().unwrap_or_else(|_| {
        trace!("NestedTreeControl: children still loading, skipped");
        Vec::new()
    })
}
