//! The tree rendering engine.
//!
//! Render lifecycle: a [`Tree`] starts [`Disconnected`](RenderState::Disconnected),
//! becomes [`Connecting`](RenderState::Connecting) when a data source is set
//! and [`Rendering`](RenderState::Rendering) once the first data arrived.
//! Every upstream event (a data emission or an expansion change) runs one
//! render pass:
//!
//! 1. compute the visible nodes and their level/parent/sibling metadata,
//! 2. diff them against the rendered nodes,
//! 3. patch the view container and the node registry,
//! 4. hand the rendered nodes to the key manager.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use cdk_a11y::{
    Children, EventResult, KeyCombo, KeyNavConfig, TreeKeyManager, TreeKeyManagerItem,
    TreeKeyManagerOptions,
};
use futures::channel::mpsc::UnboundedReceiver;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use log::{debug, trace};
use tokio::time::Instant;

use crate::control::{
    ChildrenAccessor, ExpandablePredicate, ExpansionKey, LevelAccessor, TreeControl,
};
use crate::data_source::{CollectionViewer, DataSource, TreeDataSource};
use crate::differ::{DiffOperation, IterableChanges, IterableDiffer};
use crate::error::TreeError;
use crate::expansion::{ExpansionChange, ExpansionModel};
use crate::node::TreeNode;
use crate::node_def::{NodeDef, NodeDefs};
use crate::outlet::{NodeOutletContext, VecViewContainer, ViewContainer};
use crate::render::{self, RenderCache};
use crate::{TreeData, TreeKey};

/// Typeahead label of a node.
pub type LabelAccessor<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Unique identifier for a Tree instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(usize);

impl TreeId {
    fn new() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cdk-tree-{}", self.0)
    }
}

/// Where a tree is in its render lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderState {
    /// No data source connected.
    #[default]
    Disconnected,
    /// Connected, waiting for the first data.
    Connecting,
    /// Data rendered at least once.
    Rendering,
}

// =============================================================================
// Strategy
// =============================================================================

/// Shape of the data a tree renders.
pub(crate) enum Shape<T> {
    /// Pre-flattened data tagged with levels.
    Flat(LevelAccessor<T>),
    /// Root nodes whose children are looked up.
    Nested(ChildrenAccessor<T>),
}

/// How a tree was configured, resolved once at build time.
pub(crate) enum Strategy<T, K> {
    /// A level or children accessor; the tree owns its expansion model.
    Accessor(Shape<T>),
    /// A tree control that owns the expansion model.
    Control(Arc<dyn TreeControl<T, K>>, Shape<T>),
}

impl<T, K> Strategy<T, K> {
    fn shape(&self) -> &Shape<T> {
        match self {
            Self::Accessor(shape) | Self::Control(_, shape) => shape,
        }
    }

    fn control(&self) -> Option<&Arc<dyn TreeControl<T, K>>> {
        match self {
            Self::Accessor(_) => None,
            Self::Control(control, _) => Some(control),
        }
    }
}

// =============================================================================
// Shared state
// =============================================================================

/// State rendered nodes call back into.
pub(crate) struct TreeShared<T, K> {
    id: TreeId,
    strategy: Strategy<T, K>,
    key_of: ExpansionKey<T, K>,
    expansion: ExpansionModel<K>,
    expandable: Option<ExpandablePredicate<T>>,
    label: Option<LabelAccessor<T>>,
    cache: RwLock<RenderCache<T, K>>,
    registry: RwLock<HashMap<K, TreeNode<T, K>>>,
}

impl<T: TreeData, K: TreeKey> TreeShared<T, K> {
    pub(crate) fn key_of(&self, node: &T) -> K {
        (self.key_of)(node)
    }

    // -------------------------------------------------------------------------
    // Expansion
    // -------------------------------------------------------------------------

    pub(crate) fn is_expanded(&self, node: &T) -> bool {
        match self.strategy.control() {
            Some(control) => control.is_expanded(node),
            None => self.expansion.is_selected(&self.key_of(node)),
        }
    }

    pub(crate) fn expand(&self, node: &T) {
        match self.strategy.control() {
            Some(control) => control.expand(node),
            None => self.expansion.select(self.key_of(node)),
        }
    }

    pub(crate) fn collapse(&self, node: &T) {
        match self.strategy.control() {
            Some(control) => control.collapse(node),
            None => self.expansion.deselect(&self.key_of(node)),
        }
    }

    fn toggle(&self, node: &T) {
        match self.strategy.control() {
            Some(control) => control.toggle(node),
            None => self.expansion.toggle(self.key_of(node)),
        }
    }

    fn expand_descendants(&self, node: &T) {
        if let Some(control) = self.strategy.control() {
            control.expand_descendants(node);
            return;
        }
        let mut keys = vec![self.key_of(node)];
        keys.extend(self.descendants(node).iter().map(|d| self.key_of(d)));
        self.expansion.select_all(keys);
    }

    fn collapse_descendants(&self, node: &T) {
        if let Some(control) = self.strategy.control() {
            control.collapse_descendants(node);
            return;
        }
        let mut keys = vec![self.key_of(node)];
        keys.extend(self.descendants(node).iter().map(|d| self.key_of(d)));
        self.expansion.deselect_all(keys);
    }

    fn toggle_descendants(&self, node: &T) {
        if self.is_expanded(node) {
            self.collapse_descendants(node);
        } else {
            self.expand_descendants(node);
        }
    }

    fn expand_all(&self) {
        match self.strategy.control() {
            Some(control) => control.expand_all(),
            None => self.expansion.select_all(self.known_keys()),
        }
    }

    fn collapse_all(&self) {
        match self.strategy.control() {
            Some(control) => control.collapse_all(),
            None => self.expansion.deselect_all(self.known_keys()),
        }
    }

    /// Keys of every node the last render pass walked.
    fn known_keys(&self) -> Vec<K> {
        self.cache
            .read()
            .map(|cache| cache.flattened.iter().map(|n| self.key_of(n)).collect())
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Every descendant of `node`, depth first, as far as the last render
    /// pass knows them.
    fn descendants(&self, node: &T) -> Vec<T> {
        if let Some(control) = self.strategy.control() {
            return control.descendants(node);
        }
        let Ok(cache) = self.cache.read() else {
            return Vec::new();
        };
        match self.strategy.shape() {
            Shape::Flat(level) => {
                render::find_children_by_level(&cache.flattened, node, usize::MAX, level, &self.key_of)
            }
            Shape::Nested(_) => {
                let mut results = Vec::new();
                let mut seen = HashSet::from([self.key_of(node)]);
                let mut stack = vec![self.cached_children(&cache, node).into_iter()];
                while let Some(level) = stack.last_mut() {
                    let Some(child) = level.next() else {
                        stack.pop();
                        continue;
                    };
                    if !seen.insert(self.key_of(&child)) {
                        continue;
                    }
                    let grandchildren = self.cached_children(&cache, &child);
                    results.push(child);
                    stack.push(grandchildren.into_iter());
                }
                results
            }
        }
    }

    fn cached_children(&self, cache: &RenderCache<T, K>, node: &T) -> Vec<T> {
        cache
            .aria_sets
            .get(&Some(self.key_of(node)))
            .cloned()
            .unwrap_or_default()
    }

    /// Direct children of `node`. For flat data only expanded nodes have
    /// children.
    fn direct_children(&self, node: &T) -> Vec<T> {
        match self.strategy.shape() {
            Shape::Flat(level) => {
                if !self.is_expanded(node) {
                    return Vec::new();
                }
                self.cache
                    .read()
                    .map(|cache| {
                        render::find_children_by_level(&cache.flattened, node, 1, level, &self.key_of)
                    })
                    .unwrap_or_default()
            }
            Shape::Nested(_) => self
                .cache
                .read()
                .map(|cache| self.cached_children(&cache, node))
                .unwrap_or_default(),
        }
    }

    pub(crate) fn is_expandable(&self, node: &T) -> bool {
        if let Some(expandable) = self.strategy.control().and_then(|c| c.expandable(node)) {
            return expandable;
        }
        if let Some(expandable) = &self.expandable {
            return expandable(node);
        }
        let Ok(cache) = self.cache.read() else {
            return false;
        };
        match self.strategy.shape() {
            Shape::Flat(level) => {
                let key = self.key_of(node);
                cache
                    .flattened
                    .iter()
                    .position(|n| self.key_of(n) == key)
                    .and_then(|i| cache.flattened.get(i + 1))
                    .is_some_and(|next| level(next) > level(node))
            }
            Shape::Nested(_) => !self.cached_children(&cache, node).is_empty(),
        }
    }

    pub(crate) fn level(&self, key: &K) -> Option<usize> {
        self.cache.read().ok()?.levels.get(key).copied()
    }

    pub(crate) fn set_size(&self, key: &K) -> usize {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.aria_set(key, &self.key_of).map(<[T]>::len))
            .unwrap_or(1)
    }

    pub(crate) fn position_in_set(&self, key: &K) -> usize {
        self.cache
            .read()
            .ok()
            .and_then(|cache| {
                cache
                    .aria_set(key, &self.key_of)
                    .and_then(|set| set.iter().position(|n| &self.key_of(n) == key))
            })
            .map_or(1, |i| i + 1)
    }

    fn parent_data(&self, key: &K) -> Option<T> {
        self.cache.read().ok()?.parents.get(key).cloned().flatten()
    }

    // -------------------------------------------------------------------------
    // Registry
    // -------------------------------------------------------------------------

    pub(crate) fn registered(&self, key: &K) -> Option<TreeNode<T, K>> {
        self.registry.read().ok()?.get(key).cloned()
    }

    pub(crate) fn parent_node(&self, key: &K) -> Option<TreeNode<T, K>> {
        let parent = self.parent_data(key)?;
        self.registered(&self.key_of(&parent))
    }

    pub(crate) fn child_nodes(&self, node: &T) -> Vec<TreeNode<T, K>> {
        self.direct_children(node)
            .iter()
            .filter_map(|child| self.registered(&self.key_of(child)))
            .collect()
    }

    pub(crate) fn label(&self, node: &T) -> String {
        self.label.as_ref().map(|label| label(node)).unwrap_or_default()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Configures and builds a [`Tree`].
///
/// Exactly one of [`level_accessor`](Self::level_accessor),
/// [`children_accessor`](Self::children_accessor) and
/// [`tree_control`](Self::tree_control) must be set.
pub struct TreeBuilder<T, K = T> {
    level_accessor: Option<LevelAccessor<T>>,
    children_accessor: Option<ChildrenAccessor<T>>,
    tree_control: Option<Arc<dyn TreeControl<T, K>>>,
    expansion_key: ExpansionKey<T, K>,
    node_defs: Vec<NodeDef<T>>,
    expandable: Option<ExpandablePredicate<T>>,
    label: Option<LabelAccessor<T>>,
    key_nav: KeyNavConfig,
    data_source: Option<DataSource<T>>,
}

impl<T: TreeData + Eq + Hash + fmt::Debug> TreeBuilder<T, T> {
    /// A builder whose nodes are their own keys.
    pub fn new() -> Self {
        Self::with_expansion_key(T::clone)
    }
}

impl<T: TreeData + Eq + Hash + fmt::Debug> Default for TreeBuilder<T, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TreeData, K: TreeKey> TreeBuilder<T, K> {
    /// A builder whose nodes are identified by `key`.
    pub fn with_expansion_key(key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        Self {
            level_accessor: None,
            children_accessor: None,
            tree_control: None,
            expansion_key: Arc::new(key),
            node_defs: Vec::new(),
            expandable: None,
            label: None,
            key_nav: KeyNavConfig::default(),
            data_source: None,
        }
    }

    /// Render pre-flattened data whose depth is given by `level`.
    pub fn level_accessor(mut self, level: impl Fn(&T) -> usize + Send + Sync + 'static) -> Self {
        self.level_accessor = Some(Arc::new(level));
        self
    }

    /// Render nested data whose children are given by `children`.
    pub fn children_accessor(
        mut self,
        children: impl Fn(&T) -> Children<T> + Send + Sync + 'static,
    ) -> Self {
        self.children_accessor = Some(Arc::new(children));
        self
    }

    /// Delegate expansion state and data shape to a tree control. Nodes are
    /// keyed by the control.
    pub fn tree_control<C: TreeControl<T, K> + 'static>(mut self, control: Arc<C>) -> Self {
        self.tree_control = Some(control);
        self
    }

    /// Add a node definition.
    pub fn node_def(mut self, def: NodeDef<T>) -> Self {
        self.node_defs.push(def);
        self
    }

    /// Decide which nodes can be expanded instead of inferring it from the
    /// data.
    pub fn is_expandable(mut self, expandable: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.expandable = Some(Arc::new(expandable));
        self
    }

    /// Label used to match typed characters against nodes.
    pub fn typeahead_label(mut self, label: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.label = Some(Arc::new(label));
        self
    }

    /// Keyboard navigation settings.
    pub fn key_nav(mut self, config: KeyNavConfig) -> Self {
        self.key_nav = config;
        self
    }

    /// Connect to this data source once built.
    pub fn data_source(mut self, source: impl Into<DataSource<T>>) -> Self {
        self.data_source = Some(source.into());
        self
    }

    /// Build a tree rendering into an in-memory view container.
    pub fn build(self) -> Result<Tree<T, K>, TreeError> {
        self.build_with(VecViewContainer::new())
    }

    /// Build a tree rendering into `views`.
    pub fn build_with<V: ViewContainer<T, K>>(self, views: V) -> Result<Tree<T, K, V>, TreeError> {
        let configured = [
            self.level_accessor.is_some(),
            self.children_accessor.is_some(),
            self.tree_control.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();
        match configured {
            0 => return Err(TreeError::MissingTreeControl),
            1 => {}
            _ => return Err(TreeError::MultipleTreeControls),
        }

        let mut key_of = self.expansion_key;
        let strategy = match (self.tree_control, self.level_accessor, self.children_accessor) {
            (Some(control), _, _) => {
                let shape = match (control.level_accessor(), control.children_accessor()) {
                    (Some(level), _) => Shape::Flat(level),
                    (None, Some(children)) => Shape::Nested(children),
                    (None, None) => return Err(TreeError::TreeControlFunctionsMissing),
                };
                let keyed_by = Arc::clone(&control);
                key_of = Arc::new(move |node: &T| keyed_by.key_of(node));
                Strategy::Control(control, shape)
            }
            (None, Some(level), _) => Strategy::Accessor(Shape::Flat(level)),
            (None, None, Some(children)) => Strategy::Accessor(Shape::Nested(children)),
            (None, None, None) => return Err(TreeError::MissingTreeControl),
        };
        let node_defs = NodeDefs::new(self.node_defs)?;

        let expansion = match strategy.control() {
            Some(control) => control.expansion_model().clone(),
            None => ExpansionModel::new(),
        };
        let expansion_changes = expansion.changed();

        let options = TreeKeyManagerOptions::from_config(&self.key_nav)
            .track_by(|a: &TreeNode<T, K>, b: &TreeNode<T, K>| a.key() == b.key())
            .skip_predicate(|node: &TreeNode<T, K>| node.is_disabled());

        let id = TreeId::new();
        let shared = Arc::new(TreeShared {
            id,
            strategy,
            key_of: Arc::clone(&key_of),
            expansion,
            expandable: self.expandable,
            label: self.label,
            cache: RwLock::new(RenderCache::default()),
            registry: RwLock::new(HashMap::new()),
        });
        debug!("Tree {}: built with {} node definitions", id, node_defs.len());

        let mut tree = Tree {
            id,
            shared,
            node_defs,
            views,
            differ: IterableDiffer::new(key_of),
            key_manager: TreeKeyManager::new(Vec::new(), options),
            viewer: CollectionViewer::default(),
            source: None,
            data_stream: None,
            expansion_changes,
            has_data: false,
            state: RenderState::Disconnected,
        };
        if let Some(source) = self.data_source {
            tree.set_data_source(Some(source));
        }
        Ok(tree)
    }
}

// =============================================================================
// Tree
// =============================================================================

enum Upstream<T, K> {
    Data(Option<Vec<T>>),
    Expansion(Option<ExpansionChange<K>>),
}

/// Renders hierarchical data into a [`ViewContainer`].
///
/// # Example
///
/// ```ignore
/// let mut tree = TreeBuilder::with_expansion_key(|n: &Dir| n.path.clone())
///     .children_accessor(|n: &Dir| Children::ready(n.entries.clone()))
///     .node_def(NodeDef::new("entry"))
///     .data_source(vec![root])
///     .build()?;
///
/// tree.render_next().await?;
/// tree.expand(&root);
/// tree.render_pending().await?;
/// ```
pub struct Tree<T, K = T, V = VecViewContainer<T, K>>
where
    T: TreeData,
    K: TreeKey,
{
    id: TreeId,
    shared: Arc<TreeShared<T, K>>,
    node_defs: NodeDefs<T>,
    views: V,
    differ: IterableDiffer<T, K>,
    key_manager: TreeKeyManager<TreeNode<T, K>>,
    viewer: CollectionViewer,
    source: Option<Box<dyn TreeDataSource<T>>>,
    data_stream: Option<BoxStream<'static, Vec<T>>>,
    expansion_changes: UnboundedReceiver<ExpansionChange<K>>,
    has_data: bool,
    state: RenderState,
}

impl<T: TreeData, K: TreeKey, V: ViewContainer<T, K>> Tree<T, K, V> {
    /// Get the unique ID.
    pub fn id(&self) -> TreeId {
        self.id
    }

    /// Where the tree is in its render lifecycle.
    pub fn render_state(&self) -> RenderState {
        self.state
    }

    /// The rendered views.
    pub fn views(&self) -> &V {
        &self.views
    }

    /// The expansion model the tree reads. With a tree control, this is the
    /// control's model.
    pub fn expansion_model(&self) -> &ExpansionModel<K> {
        &self.shared.expansion
    }

    /// The tree control, if the tree was configured with one.
    pub fn tree_control(&self) -> Option<&Arc<dyn TreeControl<T, K>>> {
        self.shared.strategy.control()
    }

    /// Key identifying `node`.
    pub fn key_of(&self, node: &T) -> K {
        self.shared.key_of(node)
    }

    // -------------------------------------------------------------------------
    // Data source
    // -------------------------------------------------------------------------

    /// Swap the data source.
    ///
    /// The previous source is disconnected. Rendered views are kept until the
    /// new source emits, unless there is no new source, in which case they
    /// are cleared.
    pub fn set_data_source(&mut self, source: Option<DataSource<T>>) {
        self.disconnect();
        match source {
            Some(source) => self.connect(source),
            None => self.clear_views(),
        }
    }

    fn connect(&mut self, source: DataSource<T>) {
        debug!("Tree {}: connecting {:?}", self.id, source);
        let stream = match source {
            DataSource::Array(data) => stream::once(futures::future::ready(data)).boxed(),
            DataSource::Stream(stream) => stream,
            DataSource::Connectable(mut source) => {
                let stream = source.connect(&self.viewer);
                self.source = Some(source);
                stream
            }
        };
        self.data_stream = Some(stream);
        self.state = RenderState::Connecting;
    }

    fn disconnect(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.disconnect(&self.viewer);
        }
        if self.data_stream.take().is_some() {
            debug!("Tree {}: disconnected", self.id);
        }
        self.state = RenderState::Disconnected;
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Wait for the next data emission or expansion change and render it.
    ///
    /// Returns `Ok(false)` when nothing can arrive any more: no data source
    /// is connected and nothing has been rendered.
    pub async fn render_next(&mut self) -> Result<bool, TreeError> {
        loop {
            if self.data_stream.is_none() && !self.has_data {
                return Ok(false);
            }
            let event = {
                let data_stream = &mut self.data_stream;
                let changes = &mut self.expansion_changes;
                let next_data = async move {
                    match data_stream.as_mut() {
                        Some(stream) => stream.next().await,
                        None => futures::future::pending::<Option<Vec<T>>>().await,
                    }
                };
                tokio::select! {
                    biased;
                    data = next_data => Upstream::Data(data),
                    change = changes.next() => Upstream::Expansion(change),
                }
            };
            match event {
                Upstream::Data(Some(data)) => {
                    self.render_data(data).await?;
                    return Ok(true);
                }
                Upstream::Data(None) => {
                    debug!("Tree {}: data stream ended", self.id);
                    self.data_stream = None;
                }
                Upstream::Expansion(Some(change)) => {
                    self.emit_expansion_states(&change);
                    if self.has_data {
                        self.rerender().await?;
                        return Ok(true);
                    }
                }
                Upstream::Expansion(None) => return Ok(false),
            }
        }
    }

    /// Render once if data or expansion changes are already waiting.
    ///
    /// Returns whether a render pass ran.
    pub async fn render_pending(&mut self) -> Result<bool, TreeError> {
        let mut latest = None;
        let mut ended = false;
        if let Some(stream) = self.data_stream.as_mut() {
            loop {
                match stream.next().now_or_never() {
                    Some(Some(data)) => latest = Some(data),
                    Some(None) => {
                        ended = true;
                        break;
                    }
                    None => break,
                }
            }
        }
        if ended {
            debug!("Tree {}: data stream ended", self.id);
            self.data_stream = None;
        }

        let mut expansion_changed = false;
        while let Some(Some(change)) = self.expansion_changes.next().now_or_never() {
            self.emit_expansion_states(&change);
            expansion_changed = true;
        }

        if let Some(data) = latest {
            self.render_data(data).await?;
            return Ok(true);
        }
        if expansion_changed && self.has_data {
            self.rerender().await?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn render_data(&mut self, data: Vec<T>) -> Result<(), TreeError> {
        self.render(data).await?;
        self.has_data = true;
        self.state = RenderState::Rendering;
        Ok(())
    }

    async fn rerender(&mut self) -> Result<(), TreeError> {
        let data = self
            .shared
            .cache
            .read()
            .map(|cache| cache.data_nodes.clone())
            .unwrap_or_default();
        self.render(data).await
    }

    async fn render(&mut self, data: Vec<T>) -> Result<(), TreeError> {
        let shared = Arc::clone(&self.shared);
        let is_expanded = |node: &T| shared.is_expanded(node);
        let (render_nodes, cache) = match shared.strategy.shape() {
            Shape::Flat(level) => {
                let cache = render::calculate_parents(&data, level, &shared.key_of);
                (render::visible_flat_nodes(&data, level, is_expanded), cache)
            }
            Shape::Nested(children) => {
                render::flatten_nested(&data, children, &shared.key_of, is_expanded).await
            }
        };

        // A node without a definition must fail the pass before any view is
        // touched.
        for (index, node) in render_nodes.iter().enumerate() {
            if shared.registered(&shared.key_of(node)).is_none() {
                self.node_defs.resolve(index, node)?;
            }
        }

        if let Ok(mut guard) = shared.cache.write() {
            *guard = cache;
        }

        match self.differ.diff(&render_nodes) {
            Some(changes) => {
                debug!(
                    "Tree {}: rendering {} nodes, {} operations",
                    self.id,
                    render_nodes.len(),
                    changes.operations.len()
                );
                self.apply_changes(&render_nodes, &changes)?;
            }
            None => trace!("Tree {}: nothing changed", self.id),
        }
        self.refresh_contexts(&render_nodes);
        self.sync_key_manager(&render_nodes);
        Ok(())
    }

    fn apply_changes(&mut self, render_nodes: &[T], changes: &IterableChanges) -> Result<(), TreeError> {
        for operation in &changes.operations {
            trace!("Tree {}: {:?}", self.id, operation);
            match *operation {
                DiffOperation::Remove { index } => self.remove_view(index),
                DiffOperation::Insert { item, index } => {
                    self.insert_node(&render_nodes[item], item, render_nodes.len(), index)?;
                }
                DiffOperation::Move { from, to, .. } => self.views.move_view(from, to),
            }
        }
        for &index in &changes.identity_changes {
            let data = render_nodes[index].clone();
            if let Some(context) = self.views.get_mut(index) {
                context.node.set_data(data.clone());
                context.implicit = data;
            }
        }
        Ok(())
    }

    fn insert_node(&mut self, data: &T, item: usize, count: usize, index: usize) -> Result<(), TreeError> {
        let template = self.node_defs.resolve(item, data)?.template().clone();
        let key = self.shared.key_of(data);
        let node = TreeNode::new(key.clone(), data.clone(), Arc::downgrade(&self.shared));
        let context = NodeOutletContext {
            implicit: data.clone(),
            level: self.shared.level(&key).unwrap_or(0),
            index: item,
            count,
            node: node.clone(),
        };
        self.views.create_embedded_view(&template, context, index);
        if let Ok(mut registry) = self.shared.registry.write() {
            registry.insert(key, node);
        }
        Ok(())
    }

    fn remove_view(&mut self, index: usize) {
        if let Some(context) = self.views.get(index) {
            let node = context.node.clone();
            if let Ok(mut registry) = self.shared.registry.write()
                && registry.get(node.key()).is_some_and(|n| *n == node)
            {
                registry.remove(node.key());
            }
            node.destroy();
        }
        self.views.remove(index);
    }

    fn refresh_contexts(&mut self, render_nodes: &[T]) {
        let count = render_nodes.len();
        for (index, data) in render_nodes.iter().enumerate() {
            let level = self.shared.level(&self.shared.key_of(data)).unwrap_or(0);
            if let Some(context) = self.views.get_mut(index) {
                context.index = index;
                context.count = count;
                context.level = level;
            }
        }
    }

    fn sync_key_manager(&mut self, render_nodes: &[T]) {
        let items: Vec<TreeNode<T, K>> = render_nodes
            .iter()
            .filter_map(|data| self.shared.registered(&self.shared.key_of(data)))
            .collect();
        self.key_manager.set_items(items);
    }

    fn emit_expansion_states(&self, change: &ExpansionChange<K>) {
        for key in &change.added {
            if let Some(node) = self.shared.registered(key) {
                node.emit_expansion_state(true);
            }
        }
        for key in &change.removed {
            if let Some(node) = self.shared.registered(key) {
                node.emit_expansion_state(false);
            }
        }
    }

    fn clear_views(&mut self) {
        for index in 0..self.views.len() {
            if let Some(context) = self.views.get(index) {
                context.node.destroy();
            }
        }
        self.views.clear();
        if let Ok(mut registry) = self.shared.registry.write() {
            registry.clear();
        }
        if let Ok(mut cache) = self.shared.cache.write() {
            *cache = RenderCache::default();
        }
        self.differ.reset();
        self.has_data = false;
        self.key_manager.set_items(Vec::new());
    }

    /// Disconnect, destroy every view and tear down keyboard handling.
    pub fn destroy(&mut self) {
        debug!("Tree {}: destroyed", self.id);
        self.disconnect();
        self.clear_views();
        self.key_manager.destroy();
    }

    // -------------------------------------------------------------------------
    // Expansion
    // -------------------------------------------------------------------------

    /// Whether `node` is expanded.
    pub fn is_expanded(&self, node: &T) -> bool {
        self.shared.is_expanded(node)
    }

    /// Expand `node`.
    pub fn expand(&self, node: &T) {
        self.shared.expand(node);
    }

    /// Collapse `node`.
    pub fn collapse(&self, node: &T) {
        self.shared.collapse(node);
    }

    /// Flip the expansion state of `node`.
    pub fn toggle(&self, node: &T) {
        self.shared.toggle(node);
    }

    /// Expand `node` and every known descendant.
    pub fn expand_descendants(&self, node: &T) {
        self.shared.expand_descendants(node);
    }

    /// Collapse `node` and every known descendant.
    pub fn collapse_descendants(&self, node: &T) {
        self.shared.collapse_descendants(node);
    }

    /// Collapse `node` and its descendants if it is expanded, expand them
    /// otherwise.
    pub fn toggle_descendants(&self, node: &T) {
        self.shared.toggle_descendants(node);
    }

    /// Expand every known node.
    pub fn expand_all(&self) {
        self.shared.expand_all();
    }

    /// Collapse every known node.
    pub fn collapse_all(&self) {
        self.shared.collapse_all();
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Every descendant of `node` known to the tree, depth first.
    pub fn descendants(&self, node: &T) -> Vec<T> {
        self.shared.descendants(node)
    }

    /// Depth of `node`, if the last render pass saw it.
    pub fn level(&self, node: &T) -> Option<usize> {
        self.shared.level(&self.shared.key_of(node))
    }

    /// Number of siblings of `node`, itself included.
    pub fn set_size(&self, node: &T) -> usize {
        self.shared.set_size(&self.shared.key_of(node))
    }

    /// 1-based position of `node` among its siblings.
    pub fn position_in_set(&self, node: &T) -> usize {
        self.shared.position_in_set(&self.shared.key_of(node))
    }

    /// The rendered node with `key`.
    pub fn node(&self, key: &K) -> Option<TreeNode<T, K>> {
        self.shared.registered(key)
    }

    /// Rendered parent of a rendered node.
    pub fn node_parent(&self, node: &TreeNode<T, K>) -> Option<TreeNode<T, K>> {
        self.shared.parent_node(node.key())
    }

    /// Rendered children of a rendered node.
    pub fn node_children(&self, node: &TreeNode<T, K>) -> Vec<TreeNode<T, K>> {
        node.data()
            .map(|data| self.shared.child_nodes(&data))
            .unwrap_or_default()
    }

    /// Rendered nodes in render order.
    pub fn rendered_nodes(&self) -> Vec<TreeNode<T, K>> {
        (0..self.views.len())
            .filter_map(|index| self.views.get(index).map(|context| context.node.clone()))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Keyboard
    // -------------------------------------------------------------------------

    /// Forward a key press to the key manager.
    pub fn send_keydown(&mut self, key: &KeyCombo) -> EventResult {
        self.key_manager.on_keydown(key)
    }

    /// Forward a key press that happened at `now`.
    pub fn send_keydown_at(&mut self, key: &KeyCombo, now: Instant) -> EventResult {
        self.key_manager.on_keydown_at(key, now)
    }

    /// When pending typeahead input resolves.
    pub fn typeahead_deadline(&self) -> Option<Instant> {
        self.key_manager.typeahead_deadline()
    }

    /// Resolve pending typeahead input whose debounce has elapsed.
    pub fn poll_typeahead(&mut self, now: Instant) -> bool {
        self.key_manager.poll_typeahead(now)
    }

    /// Give keyboard focus to the rendered node with `key`.
    pub fn focus_node(&mut self, key: &K) -> bool {
        match self.shared.registered(key) {
            Some(node) => {
                self.key_manager.focus_item(&node);
                true
            }
            None => false,
        }
    }

    /// The focused node.
    pub fn active_node(&self) -> Option<&TreeNode<T, K>> {
        self.key_manager.active_item()
    }

    /// Keyboard state over the rendered nodes.
    pub fn key_manager(&self) -> &TreeKeyManager<TreeNode<T, K>> {
        &self.key_manager
    }

    /// Mutable keyboard state, for hosts that drive it directly.
    pub fn key_manager_mut(&mut self) -> &mut TreeKeyManager<TreeNode<T, K>> {
        &mut self.key_manager
    }
}

impl<T: TreeData, K: TreeKey, V> fmt::Debug for Tree<T, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("rendered", &self.differ.len())
            .field("expanded", &self.shared.expansion)
            .finish_non_exhaustive()
    }
}

impl<T, K> fmt::Debug for TreeShared<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeShared")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
