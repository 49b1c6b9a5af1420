//! Data source connection lifecycle and configuration errors.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cdk_tree::prelude::*;
use cdk_tree::{
    ArrayDataSource, CollectionViewer, ExpansionModel, RenderState, TemplateRef,
};
use futures::channel::mpsc;
use futures::stream::{self, BoxStream};
use futures::StreamExt;

fn flat_builder() -> TreeBuilder<u32> {
    TreeBuilder::new()
        .level_accessor(|_: &u32| 0)
        .node_def(NodeDef::new("row"))
}

fn rendered(tree: &Tree<u32>) -> Vec<u32> {
    tree.views().iter().map(|view| view.context.implicit).collect()
}

#[derive(Default)]
struct Counters {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

struct RecordingSource {
    data: Vec<u32>,
    counters: Arc<Counters>,
}

impl TreeDataSource<u32> for RecordingSource {
    fn connect(&mut self, viewer: &CollectionViewer) -> BoxStream<'static, Vec<u32>> {
        assert_eq!(viewer.view_change.start, 0);
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        stream::once(futures::future::ready(self.data.clone())).boxed()
    }

    fn disconnect(&mut self, _viewer: &CollectionViewer) {
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

// -----------------------------------------------------------------------------
// Lifecycle
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_no_data_source_renders_nothing() {
    let mut tree = flat_builder().build().unwrap();

    assert_eq!(tree.render_state(), RenderState::Disconnected);
    assert!(!tree.render_next().await.unwrap());
    assert!(tree.views().is_empty());
}

#[tokio::test]
async fn test_connectable_source_is_connected_and_disconnected() {
    let counters = Arc::new(Counters::default());
    let mut tree = flat_builder()
        .data_source(DataSource::connectable(RecordingSource {
            data: vec![1, 2],
            counters: Arc::clone(&counters),
        }))
        .build()
        .unwrap();
    assert_eq!(counters.connects.load(Ordering::SeqCst), 1);

    tree.render_next().await.unwrap();
    assert_eq!(rendered(&tree), vec![1, 2]);

    tree.set_data_source(Some(vec![7, 8].into()));
    assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
    // old views stay until the new source emits
    assert_eq!(rendered(&tree), vec![1, 2]);

    tree.render_next().await.unwrap();
    assert_eq!(rendered(&tree), vec![7, 8]);
}

#[tokio::test]
async fn test_clearing_the_source_clears_views() {
    let mut tree = flat_builder().data_source(vec![1, 2, 3]).build().unwrap();
    tree.render_next().await.unwrap();
    let first = tree.node(&1).unwrap();
    let mut activations = first.activation();

    tree.set_data_source(None);

    assert!(tree.views().is_empty());
    assert!(tree.node(&1).is_none());
    assert!(tree.active_node().is_none());
    assert_eq!(tree.render_state(), RenderState::Disconnected);
    assert_eq!(activations.next().await, None);
    assert!(!tree.render_next().await.unwrap());
}

#[tokio::test]
async fn test_stream_source_renders_each_emission() {
    let (tx, rx) = mpsc::unbounded();
    let mut tree = flat_builder()
        .data_source(DataSource::stream(rx))
        .build()
        .unwrap();

    tx.unbounded_send(vec![1, 2]).unwrap();
    tree.render_next().await.unwrap();
    assert_eq!(rendered(&tree), vec![1, 2]);
    let two = tree.node(&2).unwrap();

    tx.unbounded_send(vec![2, 3]).unwrap();
    tree.render_next().await.unwrap();
    assert_eq!(rendered(&tree), vec![2, 3]);
    assert_eq!(tree.node(&2), Some(two));

    drop(tx);
    assert!(!tree.render_pending().await.unwrap());
    assert_eq!(rendered(&tree), vec![2, 3]);
}

#[tokio::test]
async fn test_render_pending_takes_latest_emission() {
    let (tx, rx) = mpsc::unbounded();
    let mut tree = flat_builder()
        .data_source(DataSource::stream(rx))
        .build()
        .unwrap();

    tx.unbounded_send(vec![1]).unwrap();
    tx.unbounded_send(vec![1, 2]).unwrap();
    tx.unbounded_send(vec![3]).unwrap();
    assert!(tree.render_pending().await.unwrap());
    assert_eq!(rendered(&tree), vec![3]);
}

#[tokio::test]
async fn test_array_data_source() {
    let mut tree = flat_builder()
        .data_source(DataSource::connectable(ArrayDataSource::new(vec![4, 5])))
        .build()
        .unwrap();
    tree.render_next().await.unwrap();

    assert_eq!(rendered(&tree), vec![4, 5]);
}

#[tokio::test]
async fn test_destroy_tears_everything_down() {
    let counters = Arc::new(Counters::default());
    let mut tree = flat_builder()
        .data_source(DataSource::connectable(RecordingSource {
            data: vec![1],
            counters: Arc::clone(&counters),
        }))
        .build()
        .unwrap();
    tree.render_next().await.unwrap();
    let mut focus_changes = tree.key_manager().change();

    tree.destroy();

    assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
    assert!(tree.views().is_empty());
    assert_eq!(focus_changes.next().await, None);
}

// -----------------------------------------------------------------------------
// Node definitions
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_node_defs_pick_templates() {
    let mut tree = TreeBuilder::new()
        .level_accessor(|_: &u32| 0)
        .node_def(NodeDef::new("odd"))
        .node_def(NodeDef::new("even").when(|_, n: &u32| n.is_multiple_of(2)))
        .data_source(vec![1, 2, 3])
        .build()
        .unwrap();
    tree.render_next().await.unwrap();

    let templates: Vec<&TemplateRef> = tree.views().iter().map(|view| &view.template).collect();
    assert_eq!(
        templates,
        vec![
            &TemplateRef::new("odd"),
            &TemplateRef::new("even"),
            &TemplateRef::new("odd")
        ]
    );
}

#[tokio::test]
async fn test_unmatched_node_fails_without_touching_views() {
    let mut tree = TreeBuilder::new()
        .level_accessor(|_: &u32| 0)
        .node_def(NodeDef::new("even").when(|_, n: &u32| n.is_multiple_of(2)))
        .node_def(NodeDef::new("big").when(|_, n: &u32| *n > 10))
        .data_source(vec![2, 3])
        .build()
        .unwrap();

    assert_eq!(
        tree.render_next().await.unwrap_err(),
        TreeError::MissingMatchingNodeDef
    );
    assert!(tree.views().is_empty());
}

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

struct BareControl {
    expansion: ExpansionModel<u32>,
}

impl TreeControl<u32, u32> for BareControl {
    fn expansion_model(&self) -> &ExpansionModel<u32> {
        &self.expansion
    }

    fn key_of(&self, node: &u32) -> u32 {
        *node
    }

    fn data_nodes(&self) -> Vec<u32> {
        Vec::new()
    }

    fn set_data_nodes(&self, _nodes: Vec<u32>) {}

    fn descendants(&self, _node: &u32) -> Vec<u32> {
        Vec::new()
    }

    fn expand_all(&self) {}
}

#[test]
fn test_missing_shape_is_rejected() {
    let result = TreeBuilder::<u32>::new()
        .node_def(NodeDef::new("row"))
        .build();
    assert_eq!(result.err(), Some(TreeError::MissingTreeControl));
}

#[test]
fn test_two_shapes_are_rejected() {
    let result = TreeBuilder::<u32>::new()
        .level_accessor(|_| 0)
        .children_accessor(|_| Children::empty())
        .build();
    assert_eq!(result.err(), Some(TreeError::MultipleTreeControls));
}

#[test]
fn test_control_without_shape_is_rejected() {
    let result = TreeBuilder::<u32>::new()
        .tree_control(Arc::new(BareControl {
            expansion: ExpansionModel::new(),
        }))
        .build();
    assert_eq!(result.err(), Some(TreeError::TreeControlFunctionsMissing));
}

#[test]
fn test_two_default_node_defs_are_rejected() {
    let result = flat_builder().node_def(NodeDef::new("other")).build();
    assert_eq!(result.err(), Some(TreeError::MultipleDefaultNodeDefs));
}

#[test]
fn test_error_messages() {
    assert_eq!(
        TreeError::MissingTreeControl.to_string(),
        "Could not find a tree control, levelAccessor, or childrenAccessor for the tree."
    );
}
