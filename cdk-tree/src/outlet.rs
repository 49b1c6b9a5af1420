//! The view container a tree renders into.

use std::fmt;

use crate::node::TreeNode;
use crate::node_def::TemplateRef;

/// Per-view data handed to a template.
#[derive(Clone)]
pub struct NodeOutletContext<T, K> {
    /// The node's data.
    pub implicit: T,
    /// Depth, 0 for roots.
    pub level: usize,
    /// Position among the rendered nodes.
    pub index: usize,
    /// Number of rendered nodes.
    pub count: usize,
    /// The node rendered by this view.
    pub node: TreeNode<T, K>,
}

impl<T, K: fmt::Debug> fmt::Debug for NodeOutletContext<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeOutletContext")
            .field("key", self.node.key())
            .field("level", &self.level)
            .field("index", &self.index)
            .field("count", &self.count)
            .finish()
    }
}

/// An ordered, indexable sequence of rendered views.
pub trait ViewContainer<T, K> {
    /// Number of views.
    fn len(&self) -> usize;

    /// Whether there are no views.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render `template` with `context` at `index`.
    fn create_embedded_view(
        &mut self,
        template: &TemplateRef,
        context: NodeOutletContext<T, K>,
        index: usize,
    );

    /// Context of the view at `index`.
    fn get(&self, index: usize) -> Option<&NodeOutletContext<T, K>>;

    /// Mutable context of the view at `index`.
    fn get_mut(&mut self, index: usize) -> Option<&mut NodeOutletContext<T, K>>;

    /// Move the view at `from` so it ends up at `to`.
    fn move_view(&mut self, from: usize, to: usize);

    /// Destroy the view at `index`.
    fn remove(&mut self, index: usize);

    /// Destroy every view.
    fn clear(&mut self);
}

/// A rendered view: its template and context.
#[derive(Clone)]
pub struct NodeView<T, K> {
    pub template: TemplateRef,
    pub context: NodeOutletContext<T, K>,
}

impl<T, K: fmt::Debug> fmt::Debug for NodeView<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeView")
            .field("template", &self.template)
            .field("context", &self.context)
            .finish()
    }
}

/// In-memory view container.
pub struct VecViewContainer<T, K> {
    views: Vec<NodeView<T, K>>,
}

impl<T, K> Default for VecViewContainer<T, K> {
    fn default() -> Self {
        Self { views: Vec::new() }
    }
}

impl<T, K> VecViewContainer<T, K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Views in render order.
    pub fn views(&self) -> &[NodeView<T, K>] {
        &self.views
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeView<T, K>> {
        self.views.iter()
    }
}

impl<T, K> ViewContainer<T, K> for VecViewContainer<T, K> {
    fn len(&self) -> usize {
        self.views.len()
    }

    fn create_embedded_view(
        &mut self,
        template: &TemplateRef,
        context: NodeOutletContext<T, K>,
        index: usize,
    ) {
        let index = index.min(self.views.len());
        self.views.insert(
            index,
            NodeView {
                template: template.clone(),
                context,
            },
        );
    }

    fn get(&self, index: usize) -> Option<&NodeOutletContext<T, K>> {
        self.views.get(index).map(|view| &view.context)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut NodeOutletContext<T, K>> {
        self.views.get_mut(index).map(|view| &mut view.context)
    }

    fn move_view(&mut self, from: usize, to: usize) {
        if from >= self.views.len() {
            return;
        }
        let view = self.views.remove(from);
        let to = to.min(self.views.len());
        self.views.insert(to, view);
    }

    fn remove(&mut self, index: usize) {
        if index < self.views.len() {
            self.views.remove(index);
        }
    }

    fn clear(&mut self) {
        self.views.clear();
    }
}

impl<T, K: fmt::Debug> fmt::Debug for VecViewContainer<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.views.iter()).finish()
    }
}
