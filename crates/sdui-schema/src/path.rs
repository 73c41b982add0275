//! Tree addressing for page definitions
//!
//! Provides [`NodePath`], the position of a component inside a page tree, and
//! [`FieldPath`], the location of a field inside the raw definition used by
//! validation diagnostics.

use serde::{Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};

/// Position of a node in the page tree
///
/// The first index selects a top-level component, each further index a
/// child. Ordering is lexicographic over indices, which equals pre-order
/// traversal order (a parent sorts before its descendants, siblings sort by
/// index rather than by their textual form).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodePath(SmallVec<[usize; 8]>);

impl NodePath {
    /// Path of a top-level component
    #[inline]
    #[must_use]
    pub fn root(index: usize) -> Self {
        let mut segments = SmallVec::new();
        segments.push(index);
        Self(segments)
    }

    /// Path of the `index`-th child of this node
    #[inline]
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(index);
        Self(segments)
    }

    /// Raw index segments
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Nesting depth (top-level components have depth 1)
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Parent path, `None` for top-level components
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() <= 1 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].iter().copied().collect()))
    }

    /// Check if `self` is an ancestor of (or equal to) `other`
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (depth, index) in self.0.iter().enumerate() {
            if depth == 0 {
                write!(f, "components[{index}]")?;
            } else {
                write!(f, ".children[{index}]")?;
            }
        }
        Ok(())
    }
}

impl Serialize for NodePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// One step of a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldSegment {
    /// Object key
    Key(String),
    /// Array index
    Index(usize),
}

/// Location of a field inside a raw page definition
///
/// Rendered as `components[0].children[2].props.title`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<FieldSegment>);

impl FieldPath {
    /// Empty path (the definition root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Extend with an object key
    #[inline]
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(FieldSegment::Key(key.into()));
        Self(segments)
    }

    /// Extend with an array index
    #[inline]
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(FieldSegment::Index(index));
        Self(segments)
    }

    /// Path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[FieldSegment] {
        &self.0
    }

    /// Check if this is the root path
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                FieldSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                FieldSegment::Key(key) => write!(f, ".{key}")?,
                FieldSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl From<&NodePath> for FieldPath {
    fn from(path: &NodePath) -> Self {
        let mut field = FieldPath::root();
        for (depth, index) in path.indices().iter().enumerate() {
            let key = if depth == 0 { "components" } else { "children" };
            field = field.key(key).index(*index);
        }
        field
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_path_display() {
        let path = NodePath::root(1).child(2).child(0);
        assert_eq!(path.to_string(), "components[1].children[2].children[0]");
    }

    #[test]
    fn node_path_orders_numerically() {
        let two = NodePath::root(2);
        let ten = NodePath::root(10);
        assert!(two < ten);
        assert!(two.to_string() > ten.to_string());
    }

    #[test]
    fn node_path_parent_sorts_before_child() {
        let parent = NodePath::root(0);
        let child = parent.child(5);
        let sibling = NodePath::root(1);
        assert!(parent < child);
        assert!(child < sibling);
        assert!(parent.is_prefix_of(&child));
        assert!(!sibling.is_prefix_of(&child));
    }

    #[test]
    fn node_path_parent() {
        let path = NodePath::root(3).child(1);
        assert_eq!(path.parent(), Some(NodePath::root(3)));
        assert!(NodePath::root(3).parent().is_none());
        assert_eq!(path.depth(), 2);
    }

    #[test]
    fn field_path_display() {
        let path = FieldPath::root()
            .key("components")
            .index(0)
            .key("children")
            .index(2)
            .key("props")
            .key("foo");
        assert_eq!(path.to_string(), "components[0].children[2].props.foo");
        assert_eq!(FieldPath::root().to_string(), "$");
    }

    #[test]
    fn field_path_from_node_path() {
        let node = NodePath::root(0).child(4);
        let field = FieldPath::from(&node).key("type");
        assert_eq!(field.to_string(), "components[0].children[4].type");
    }
}
