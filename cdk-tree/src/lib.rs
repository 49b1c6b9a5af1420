//! Hierarchical data rendering.
//!
//! A [`Tree`] connects to a [`DataSource`], flattens its data into the list
//! of visible nodes (using a level accessor, a children accessor or a
//! [`TreeControl`]), diffs that list against what is currently rendered and
//! patches a [`ViewContainer`] with the difference. The rendered
//! [`TreeNode`]s are kept in sync with a [`TreeKeyManager`] so keyboard
//! navigation always matches what is on screen.
//!
//! [`TreeKeyManager`]: cdk_a11y::TreeKeyManager

use std::fmt::Debug;
use std::hash::Hash;

pub mod control;
pub mod data_source;
pub mod differ;
pub mod error;
pub mod expansion;
pub mod node;
pub mod node_def;
pub mod outlet;
mod render;
pub mod tree;

pub use control::{
    ChildrenAccessor, ExpandablePredicate, ExpansionKey, FlatTreeControl, LevelAccessor,
    NestedTreeControl, TreeControl,
};
pub use data_source::{ArrayDataSource, CollectionViewer, DataSource, ListRange, TreeDataSource};
pub use differ::{DiffOperation, IterableChanges, IterableDiffer};
pub use error::TreeError;
pub use expansion::{ExpansionChange, ExpansionModel};
pub use node::TreeNode;
pub use node_def::{NodeDef, NodeDefs, TemplateRef, WhenPredicate};
pub use outlet::{NodeOutletContext, NodeView, VecViewContainer, ViewContainer};
pub use tree::{LabelAccessor, RenderState, Tree, TreeBuilder, TreeId};

/// Data a tree can render.
pub trait TreeData: Clone + PartialEq + Send + Sync + 'static {}
impl<T: Clone + PartialEq + Send + Sync + 'static> TreeData for T {}

/// Identity of rendered data.
pub trait TreeKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}
impl<K: Clone + Eq + Hash + Debug + Send + Sync + 'static> TreeKey for K {}

pub mod prelude {
    pub use cdk_a11y::prelude::*;

    pub use crate::control::{FlatTreeControl, NestedTreeControl, TreeControl};
    pub use crate::data_source::{DataSource, TreeDataSource};
    pub use crate::error::TreeError;
    pub use crate::node::TreeNode;
    pub use crate::node_def::NodeDef;
    pub use crate::outlet::{VecViewContainer, ViewContainer};
    pub use crate::tree::{Tree, TreeBuilder};
}
