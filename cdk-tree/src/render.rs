//! Render data: which nodes are visible, and their level, parent and sibling
//! set.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use log::trace;

use crate::control::{ChildrenAccessor, ExpansionKey, LevelAccessor};

/// Per-node metadata computed by the last render pass.
#[derive(Debug, Clone)]
pub(crate) struct RenderCache<T, K> {
    /// Last upstream data emission.
    pub data_nodes: Vec<T>,
    /// Every node walked by the last pass, in depth-first order.
    pub flattened: Vec<T>,
    pub levels: HashMap<K, usize>,
    /// Parent of each node; `None` for roots.
    pub parents: HashMap<K, Option<T>>,
    /// Sibling sets keyed by parent key; `None` holds the roots.
    pub aria_sets: HashMap<Option<K>, Vec<T>>,
}

impl<T, K> Default for RenderCache<T, K> {
    fn default() -> Self {
        Self {
            data_nodes: Vec::new(),
            flattened: Vec::new(),
            levels: HashMap::new(),
            parents: HashMap::new(),
            aria_sets: HashMap::new(),
        }
    }
}

impl<T, K: Eq + Hash> RenderCache<T, K> {
    /// Siblings of the node with `key`, the node included.
    pub fn aria_set(&self, key: &K, key_of: &ExpansionKey<T, K>) -> Option<&[T]> {
        let parent_key = self.parents.get(key)?.as_ref().map(|parent| key_of(parent));
        self.aria_sets.get(&parent_key).map(Vec::as_slice)
    }
}

/// Level, parent and sibling set of every node of pre-flattened data.
///
/// A node's parent is the nearest preceding node with a lower level.
pub(crate) fn calculate_parents<T: Clone, K: Clone + Eq + Hash>(
    nodes: &[T],
    level_of: &LevelAccessor<T>,
    key_of: &ExpansionKey<T, K>,
) -> RenderCache<T, K> {
    let mut cache = RenderCache {
        data_nodes: nodes.to_vec(),
        flattened: nodes.to_vec(),
        ..RenderCache::default()
    };
    let mut ancestors: Vec<(usize, &T)> = Vec::new();
    for node in nodes {
        let level = level_of(node);
        while ancestors.last().is_some_and(|(l, _)| *l >= level) {
            ancestors.pop();
        }
        let parent = ancestors.last().map(|(_, p)| *p);
        let key = key_of(node);
        cache.levels.insert(key.clone(), level);
        cache.parents.insert(key, parent.cloned());
        cache
            .aria_sets
            .entry(parent.map(|p| key_of(p)))
            .or_default()
            .push(node.clone());
        ancestors.push((level, node));
    }
    cache
}

/// The visible subsequence of pre-flattened data: nodes whose ancestors are
/// all expanded.
pub(crate) fn visible_flat_nodes<T: Clone>(
    nodes: &[T],
    level_of: &LevelAccessor<T>,
    is_expanded: impl Fn(&T) -> bool,
) -> Vec<T> {
    let mut visible = Vec::new();
    // Level of the shallowest collapsed ancestor of the nodes being scanned.
    let mut hidden_below: Option<usize> = None;
    for node in nodes {
        let level = level_of(node);
        if hidden_below.is_some_and(|hidden| level > hidden) {
            continue;
        }
        hidden_below = None;
        if !is_expanded(node) {
            hidden_below = Some(level);
        }
        visible.push(node.clone());
    }
    visible
}

/// Walk nested data depth first, recording level, parent and sibling set of
/// every reachable node. Returns the visible nodes: roots, plus the children
/// of nodes that are expanded and visible themselves.
///
/// Each node's children are resolved once, waiting for children that are
/// still loading. A node reached a second time is not walked again.
pub(crate) async fn flatten_nested<T: Clone + Send + 'static, K: Clone + Eq + Hash>(
    roots: &[T],
    children_of: &ChildrenAccessor<T>,
    key_of: &ExpansionKey<T, K>,
    is_expanded: impl Fn(&T) -> bool,
) -> (Vec<T>, RenderCache<T, K>) {
    let mut cache = RenderCache {
        data_nodes: roots.to_vec(),
        ..RenderCache::default()
    };
    cache.aria_sets.insert(None, roots.to_vec());
    for root in roots {
        let key = key_of(root);
        cache.parents.entry(key.clone()).or_insert(None);
        cache.levels.insert(key, 0);
    }

    let mut visible = Vec::new();
    let mut seen = HashSet::new();
    // (node, level, visible)
    let mut stack: Vec<(T, usize, bool)> = roots.iter().rev().map(|r| (r.clone(), 0, true)).collect();
    while let Some((node, level, shown)) = stack.pop() {
        let key = key_of(&node);
        if !seen.insert(key.clone()) {
            trace!("flatten_nested: node reached twice, skipped");
            continue;
        }
        let children = children_of(&node).first().await;
        let children_shown = shown && is_expanded(&node);
        for child in &children {
            let child_key = key_of(child);
            cache.parents.insert(child_key.clone(), Some(node.clone()));
            cache.levels.insert(child_key, level + 1);
        }
        stack.extend(
            children
                .iter()
                .rev()
                .map(|child| (child.clone(), level + 1, children_shown)),
        );
        cache.aria_sets.insert(Some(key), children);
        if shown {
            visible.push(node.clone());
        }
        cache.flattened.push(node);
    }
    (visible, cache)
}

/// Nodes after `node` in pre-flattened data that are at most `depth` levels
/// deeper, up to the next node that is not deeper than `node`.
pub(crate) fn find_children_by_level<T: Clone, K: Eq>(
    nodes: &[T],
    node: &T,
    depth: usize,
    level_of: &LevelAccessor<T>,
    key_of: &ExpansionKey<T, K>,
) -> Vec<T> {
    let key = key_of(node);
    let Some(start) = nodes.iter().position(|n| key_of(n) == key) else {
        return Vec::new();
    };
    let level = level_of(node);
    let deepest = level.saturating_add(depth);
    nodes[start + 1..]
        .iter()
        .take_while(|n| level_of(n) > level)
        .filter(|n| level_of(n) <= deepest)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cdk_a11y::Children;

    use super::*;

    type Row = (u32, usize);

    fn level() -> LevelAccessor<Row> {
        Arc::new(|row: &Row| row.1)
    }

    fn key() -> ExpansionKey<Row, u32> {
        Arc::new(|row: &Row| row.0)
    }

    #[test]
    fn test_parents_are_nearest_shallower_node() {
        let rows = vec![(1, 0), (2, 1), (3, 2), (4, 1), (5, 0)];
        let cache = calculate_parents(&rows, &level(), &key());

        assert_eq!(cache.parents[&1], None);
        assert_eq!(cache.parents[&3], Some((2, 1)));
        assert_eq!(cache.parents[&4], Some((1, 0)));
        assert_eq!(cache.parents[&5], None);
        assert_eq!(cache.aria_set(&4, &key()), Some(&[(2, 1), (4, 1)][..]));
        assert_eq!(cache.aria_set(&5, &key()), Some(&[(1, 0), (5, 0)][..]));
    }

    #[test]
    fn test_visible_rows_need_every_ancestor_expanded() {
        let rows = vec![(1, 0), (2, 1), (3, 2), (4, 1), (5, 0)];

        let visible = visible_flat_nodes(&rows, &level(), |row| row.0 == 1);
        assert_eq!(visible, vec![(1, 0), (2, 1), (4, 1), (5, 0)]);

        let visible = visible_flat_nodes(&rows, &level(), |row| row.0 == 2);
        assert_eq!(visible, vec![(1, 0), (5, 0)]);
    }

    #[test]
    fn test_children_by_level() {
        let rows = vec![(1, 0), (2, 1), (3, 2), (4, 1), (5, 0)];

        let children = find_children_by_level(&rows, &(1, 0), 1, &level(), &key());
        assert_eq!(children, vec![(2, 1), (4, 1)]);
        let all = find_children_by_level(&rows, &(1, 0), usize::MAX, &level(), &key());
        assert_eq!(all, vec![(2, 1), (3, 2), (4, 1)]);
    }

    #[tokio::test]
    async fn test_nested_walk_records_hidden_nodes() {
        let children: ChildrenAccessor<u32> = Arc::new(|n: &u32| match n {
            1 => Children::ready(vec![2, 3]),
            3 => Children::from_future(async { vec![4] }),
            _ => Children::empty(),
        });
        let key: ExpansionKey<u32, u32> = Arc::new(|n: &u32| *n);

        let (visible, cache) = flatten_nested(&[1, 5], &children, &key, |n| *n == 1).await;

        assert_eq!(visible, vec![1, 2, 3, 5]);
        assert_eq!(cache.flattened, vec![1, 2, 3, 4, 5]);
        assert_eq!(cache.levels[&4], 2);
        assert_eq!(cache.parents[&4], Some(3));
        assert_eq!(cache.aria_sets[&None], vec![1, 5]);
    }
}
