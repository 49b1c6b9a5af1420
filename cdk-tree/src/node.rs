//! The rendered unit of a tree.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use cdk_a11y::{Children, Emitter, TreeKeyManagerItem, TypeaheadItem};
use futures::channel::mpsc::UnboundedReceiver;
use log::trace;

use crate::tree::TreeShared;
use crate::{TreeData, TreeKey};

struct NodeInner<T, K> {
    key: K,
    data: RwLock<T>,
    tree: Weak<TreeShared<T, K>>,
    focused: AtomicBool,
    disabled: AtomicBool,
    typeahead_label: RwLock<Option<String>>,
    activation: Emitter<T>,
    expanded_change: Emitter<bool>,
}

/// One rendered node.
///
/// A cheap handle: clones refer to the same node. Queries about the node's
/// place in the tree are answered by the tree that rendered it; once that
/// tree is gone they fall back to root/leaf defaults.
pub struct TreeNode<T, K> {
    inner: Arc<NodeInner<T, K>>,
}

impl<T, K> Clone for TreeNode<T, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, K> PartialEq for TreeNode<T, K> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T, K> TreeNode<T, K> {
    /// The node's key.
    pub fn key(&self) -> &K {
        &self.inner.key
    }
}

impl<T: TreeData, K: TreeKey> TreeNode<T, K> {
    pub(crate) fn new(key: K, data: T, tree: Weak<TreeShared<T, K>>) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                key,
                data: RwLock::new(data),
                tree,
                focused: AtomicBool::new(false),
                disabled: AtomicBool::new(false),
                typeahead_label: RwLock::new(None),
                activation: Emitter::new(),
                expanded_change: Emitter::new(),
            }),
        }
    }

    fn tree(&self) -> Option<Arc<TreeShared<T, K>>> {
        self.inner.tree.upgrade()
    }

    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------

    /// The node's data.
    pub fn data(&self) -> Option<T> {
        self.inner.data.read().map(|g| g.clone()).ok()
    }

    pub(crate) fn set_data(&self, data: T) {
        if let Ok(mut guard) = self.inner.data.write() {
            *guard = data;
        }
    }

    // -------------------------------------------------------------------------
    // Position
    // -------------------------------------------------------------------------

    /// Depth, 0 for roots.
    pub fn level(&self) -> usize {
        self.tree()
            .and_then(|tree| tree.level(&self.inner.key))
            .unwrap_or(0)
    }

    /// 1-based depth, as announced to assistive technology.
    pub fn aria_level(&self) -> usize {
        self.level() + 1
    }

    /// Number of siblings, this node included.
    pub fn set_size(&self) -> usize {
        self.tree()
            .map(|tree| tree.set_size(&self.inner.key))
            .unwrap_or(1)
    }

    /// 1-based position among its siblings.
    pub fn position_in_set(&self) -> usize {
        self.tree()
            .map(|tree| tree.position_in_set(&self.inner.key))
            .unwrap_or(1)
    }

    // -------------------------------------------------------------------------
    // Expansion
    // -------------------------------------------------------------------------

    /// Whether the node can be expanded.
    pub fn is_expandable(&self) -> bool {
        match (self.tree(), self.data()) {
            (Some(tree), Some(data)) => tree.is_expandable(&data),
            _ => false,
        }
    }

    /// `Some(expanded)` for expandable nodes, `None` for leaves.
    pub fn aria_expanded(&self) -> Option<bool> {
        self.is_expandable().then(|| self.is_expanded())
    }

    /// Flip the expansion state.
    pub fn toggle(&self) {
        if self.is_expanded() {
            self.collapse();
        } else {
            self.expand();
        }
    }

    /// Stream of expansion states, emitted when the tree sees this node
    /// expand or collapse.
    pub fn expanded_change(&self) -> UnboundedReceiver<bool> {
        self.inner.expanded_change.subscribe()
    }

    pub(crate) fn emit_expansion_state(&self, expanded: bool) {
        self.inner.expanded_change.emit(expanded);
    }

    // -------------------------------------------------------------------------
    // Focus and activation
    // -------------------------------------------------------------------------

    /// Whether the node holds keyboard focus in its tree.
    pub fn is_active(&self) -> bool {
        self.inner.focused.load(Ordering::SeqCst)
    }

    /// 0 for the focused node, -1 for every other node.
    pub fn tab_index(&self) -> i32 {
        if self.is_active() { 0 } else { -1 }
    }

    /// Disabled nodes are skipped by keyboard navigation and ignore
    /// activation.
    pub fn set_disabled(&self, disabled: bool) {
        self.inner.disabled.store(disabled, Ordering::SeqCst);
    }

    /// Override the label used for typeahead.
    pub fn set_typeahead_label(&self, label: Option<String>) {
        if let Ok(mut guard) = self.inner.typeahead_label.write() {
            *guard = label;
        }
    }

    /// Stream of the node's data, emitted on activation.
    pub fn activation(&self) -> UnboundedReceiver<T> {
        self.inner.activation.subscribe()
    }

    pub(crate) fn destroy(&self) {
        self.inner.focused.store(false, Ordering::SeqCst);
        self.inner.activation.complete();
        self.inner.expanded_change.complete();
    }
}

impl<T: TreeData, K: TreeKey> TypeaheadItem for TreeNode<T, K> {
    fn label(&self) -> String {
        if let Ok(guard) = self.inner.typeahead_label.read()
            && let Some(label) = guard.as_ref()
        {
            return label.clone();
        }
        match (self.tree(), self.data()) {
            (Some(tree), Some(data)) => tree.label(&data),
            _ => String::new(),
        }
    }
}

impl<T: TreeData, K: TreeKey> TreeKeyManagerItem for TreeNode<T, K> {
    fn focus(&self) {
        self.inner.focused.store(true, Ordering::SeqCst);
    }

    fn unfocus(&self) {
        self.inner.focused.store(false, Ordering::SeqCst);
    }

    fn activate(&self) {
        if self.is_disabled() {
            return;
        }
        if let Some(data) = self.data() {
            trace!("TreeNode {:?}: activated", self.inner.key);
            self.inner.activation.emit(data);
        }
    }

    fn expand(&self) {
        if !self.is_expandable() {
            return;
        }
        if let (Some(tree), Some(data)) = (self.tree(), self.data()) {
            tree.expand(&data);
        }
    }

    fn collapse(&self) {
        if !self.is_expandable() {
            return;
        }
        if let (Some(tree), Some(data)) = (self.tree(), self.data()) {
            tree.collapse(&data);
        }
    }

    fn is_expanded(&self) -> bool {
        match (self.tree(), self.data()) {
            (Some(tree), Some(data)) => tree.is_expanded(&data),
            _ => false,
        }
    }

    fn is_disabled(&self) -> bool {
        self.inner.disabled.load(Ordering::SeqCst)
    }

    fn parent(&self) -> Option<Self> {
        self.tree()?.parent_node(&self.inner.key)
    }

    fn children(&self) -> Children<Self> {
        match (self.tree(), self.data()) {
            (Some(tree), Some(data)) => Children::ready(tree.child_nodes(&data)),
            _ => Children::empty(),
        }
    }
}

impl<T, K: fmt::Debug> fmt::Debug for TreeNode<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("key", &self.inner.key)
            .field("focused", &self.inner.focused.load(Ordering::SeqCst))
            .field("disabled", &self.inner.disabled.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
