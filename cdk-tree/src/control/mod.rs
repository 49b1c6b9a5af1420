//! Expansion bookkeeping decoupled from rendering.
//!
//! A [`TreeControl`] owns an [`ExpansionModel`] plus the list of known data
//! nodes, and knows how to find a node's descendants. The shared operations
//! (toggle, expand, collapse and their descendant variants) are provided
//! methods; implementations only supply the shape-specific parts.

mod flat;
mod nested;

use std::hash::Hash;
use std::sync::Arc;

use cdk_a11y::Children;

use crate::expansion::ExpansionModel;

pub use flat::FlatTreeControl;
pub use nested::NestedTreeControl;

/// Depth of a node in pre-flattened data, 0 for roots.
pub type LevelAccessor<T> = Arc<dyn Fn(&T) -> usize + Send + Sync>;

/// Direct children of a node, possibly resolved later.
pub type ChildrenAccessor<T> = Arc<dyn Fn(&T) -> Children<T> + Send + Sync>;

/// Identity of a node in the expansion set and the node registry.
pub type ExpansionKey<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Whether a node can be expanded.
pub type ExpandablePredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Expansion state over a set of data nodes.
///
/// The provided methods need hashable keys; implementations are free to
/// require more.
pub trait TreeControl<T, K>: Send + Sync {
    /// The shared set of expanded keys.
    fn expansion_model(&self) -> &ExpansionModel<K>;

    /// Key of a node in the expansion set.
    fn key_of(&self, node: &T) -> K;

    /// Every known data node.
    fn data_nodes(&self) -> Vec<T>;

    /// Replace the known data nodes.
    fn set_data_nodes(&self, nodes: Vec<T>);

    /// Every descendant of `node`, in depth-first order, excluding `node`.
    fn descendants(&self, node: &T) -> Vec<T>;

    /// Expand every known node.
    fn expand_all(&self);

    /// Level function, for controls over flat data.
    fn level_accessor(&self) -> Option<LevelAccessor<T>> {
        None
    }

    /// Children function, for controls over nested data.
    fn children_accessor(&self) -> Option<ChildrenAccessor<T>> {
        None
    }

    /// Whether `node` can be expanded, if the control knows.
    fn expandable(&self, _node: &T) -> Option<bool> {
        None
    }

    /// Whether `node` is expanded.
    fn is_expanded(&self, node: &T) -> bool
    where
        K: Clone + Eq + Hash,
    {
        self.expansion_model().is_selected(&self.key_of(node))
    }

    /// Flip the expansion state of `node`.
    fn toggle(&self, node: &T)
    where
        K: Clone + Eq + Hash,
    {
        self.expansion_model().toggle(self.key_of(node));
    }

    /// Expand `node`.
    fn expand(&self, node: &T)
    where
        K: Clone + Eq + Hash,
    {
        self.expansion_model().select(self.key_of(node));
    }

    /// Collapse `node`.
    fn collapse(&self, node: &T)
    where
        K: Clone + Eq + Hash,
    {
        self.expansion_model().deselect(&self.key_of(node));
    }

    /// Collapse `node` and its descendants if it is expanded, expand them
    /// otherwise.
    fn toggle_descendants(&self, node: &T)
    where
        K: Clone + Eq + Hash,
    {
        if self.is_expanded(node) {
            self.collapse_descendants(node);
        } else {
            self.expand_descendants(node);
        }
    }

    /// Expand `node` and every descendant.
    fn expand_descendants(&self, node: &T)
    where
        K: Clone + Eq + Hash,
    {
        let mut keys = vec![self.key_of(node)];
        keys.extend(self.descendants(node).iter().map(|d| self.key_of(d)));
        self.expansion_model().select_all(keys);
    }

    /// Collapse `node` and every descendant.
    fn collapse_descendants(&self, node: &T)
    where
        K: Clone + Eq + Hash,
    {
        let mut keys = vec![self.key_of(node)];
        keys.extend(self.descendants(node).iter().map(|d| self.key_of(d)));
        self.expansion_model().deselect_all(keys);
    }

    /// Collapse everything.
    fn collapse_all(&self)
    where
        K: Clone + Eq + Hash,
    {
        self.expansion_model().clear();
    }
}
