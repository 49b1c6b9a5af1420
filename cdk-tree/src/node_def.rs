//! Node definitions: which template renders which node.

use std::fmt;
use std::sync::Arc;

use crate::error::TreeError;

/// Name of a template a host knows how to render.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateRef(String);

impl TemplateRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Guard deciding whether a definition renders the node at an index.
pub type WhenPredicate<T> = Arc<dyn Fn(usize, &T) -> bool + Send + Sync>;

/// A template plus an optional guard.
pub struct NodeDef<T> {
    template: TemplateRef,
    when: Option<WhenPredicate<T>>,
}

impl<T> Clone for NodeDef<T> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            when: self.when.clone(),
        }
    }
}

impl<T> NodeDef<T> {
    /// An unguarded (default) definition.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: TemplateRef::new(template),
            when: None,
        }
    }

    /// Only use this definition for nodes the predicate accepts.
    pub fn when(mut self, when: impl Fn(usize, &T) -> bool + Send + Sync + 'static) -> Self {
        self.when = Some(Arc::new(when));
        self
    }

    pub fn template(&self) -> &TemplateRef {
        &self.template
    }

    pub fn is_default(&self) -> bool {
        self.when.is_none()
    }

    fn accepts(&self, index: usize, data: &T) -> bool {
        self.when.as_ref().is_some_and(|when| when(index, data))
    }
}

impl<T> fmt::Debug for NodeDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDef")
            .field("template", &self.template)
            .field("guarded", &self.when.is_some())
            .finish()
    }
}

/// The validated set of definitions of one tree.
pub struct NodeDefs<T> {
    defs: Vec<NodeDef<T>>,
    default: Option<usize>,
}

impl<T> NodeDefs<T> {
    /// Validate that at most one definition is unguarded.
    pub fn new(defs: Vec<NodeDef<T>>) -> Result<Self, TreeError> {
        let mut defaults = defs
            .iter()
            .enumerate()
            .filter(|(_, def)| def.is_default())
            .map(|(i, _)| i);
        let default = defaults.next();
        if defaults.next().is_some() {
            return Err(TreeError::MultipleDefaultNodeDefs);
        }
        Ok(Self { defs, default })
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definition for the node at `index`.
    ///
    /// A lone definition is used for every node. Otherwise the first guard
    /// that accepts the node wins, then the default.
    pub fn resolve(&self, index: usize, data: &T) -> Result<&NodeDef<T>, TreeError> {
        if let [only] = self.defs.as_slice() {
            return Ok(only);
        }
        self.defs
            .iter()
            .find(|def| def.accepts(index, data))
            .or_else(|| self.default.map(|i| &self.defs[i]))
            .ok_or(TreeError::MissingMatchingNodeDef)
    }
}

impl<T> fmt::Debug for NodeDefs<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.defs.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_definition_is_used_unconditionally() {
        let defs = NodeDefs::new(vec![NodeDef::new("leaf").when(|_, n: &u32| *n > 100)]).unwrap();
        assert_eq!(defs.resolve(0, &1).unwrap().template().name(), "leaf");
    }

    #[test]
    fn test_guards_win_over_default() {
        let defs = NodeDefs::new(vec![
            NodeDef::new("plain"),
            NodeDef::new("even").when(|_, n: &u32| n.is_multiple_of(2)),
        ])
        .unwrap();
        assert_eq!(defs.resolve(0, &2).unwrap().template().name(), "even");
        assert_eq!(defs.resolve(0, &3).unwrap().template().name(), "plain");
    }

    #[test]
    fn test_guard_receives_index() {
        let defs = NodeDefs::new(vec![
            NodeDef::new("first").when(|i, _: &u32| i == 0),
            NodeDef::new("rest").when(|i, _: &u32| i > 0),
        ])
        .unwrap();
        assert_eq!(defs.resolve(0, &9).unwrap().template().name(), "first");
        assert_eq!(defs.resolve(4, &9).unwrap().template().name(), "rest");
    }

    #[test]
    fn test_multiple_defaults_are_rejected() {
        let result = NodeDefs::<u32>::new(vec![NodeDef::new("a"), NodeDef::new("b")]);
        assert_eq!(result.err(), Some(TreeError::MultipleDefaultNodeDefs));
    }

    #[test]
    fn test_missing_match() {
        let defs = NodeDefs::new(vec![
            NodeDef::new("a").when(|_, n: &u32| *n == 1),
            NodeDef::new("b").when(|_, n: &u32| *n == 2),
        ])
        .unwrap();
        assert_eq!(defs.resolve(0, &3).err(), Some(TreeError::MissingMatchingNodeDef));
        let empty = NodeDefs::<u32>::new(Vec::new()).unwrap();
        assert_eq!(empty.resolve(0, &3).err(), Some(TreeError::MissingMatchingNodeDef));
    }
}
