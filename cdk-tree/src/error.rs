//! Tree configuration and rendering errors.

use thiserror::Error;

/// Errors raised while configuring or rendering a tree.
///
/// Every variant is a programming error in the host: they are returned at
/// build or render time and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// None of tree control, level accessor or children accessor was set.
    #[error("Could not find a tree control, levelAccessor, or childrenAccessor for the tree.")]
    MissingTreeControl,

    /// More than one tree shape strategy was set.
    #[error("More than one of tree control, levelAccessor, or childrenAccessor were provided.")]
    MultipleTreeControls,

    /// The tree control offers neither a level nor a children function.
    #[error("Could not find functions for nested/flat tree in tree control.")]
    TreeControlFunctionsMissing,

    /// More than one node definition lacks a `when` predicate.
    #[error("There can only be one default row without a when predicate function.")]
    MultipleDefaultNodeDefs,

    /// No node definition accepts a node.
    #[error("Could not find a matching node definition for the provided node data.")]
    MissingMatchingNodeDef,
}
