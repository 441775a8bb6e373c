//! Data tree primitives shared with the data store collaborator.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Logical partition of the data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datastore {
    Configuration,
    Operational,
}

impl fmt::Display for Datastore {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Datastore::Configuration => write!(f, "CONFIGURATION"),
            Datastore::Operational => write!(f, "OPERATIONAL"),
        }
    }
}

/// Absolute path into the data tree, e.g. `/interfaces/interface[eth0]`.
///
/// The empty path is the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreePath(Vec<String>);

impl TreePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(
        &self,
        name: impl Into<String>,
    ) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// Path of the enclosing node, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// True if `other` is this path or lies below it.
    pub fn contains(
        &self,
        other: &TreePath,
    ) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// True if either path lies below (or equals) the other.
    pub fn overlaps(
        &self,
        other: &TreePath,
    ) -> bool {
        self.contains(other) || other.contains(self)
    }
}

impl FromStr for TreePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(
            s.split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }
}

impl From<&str> for TreePath {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for TreePath {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// Schemaless node of the data tree.
///
/// A node with a `value` is a leaf; otherwise it is a container whose
/// children may repeat a name to form a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DataNode>,
}

impl DataNode {
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            children: Vec::new(),
        }
    }

    pub fn leaf(
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    pub fn with_child(
        mut self,
        child: DataNode,
    ) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }

    pub fn child(
        &self,
        name: &str,
    ) -> Option<&DataNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub(crate) fn child_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut DataNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Replaces the first child named like `child`, or appends it.
    pub(crate) fn upsert_child(
        &mut self,
        child: DataNode,
    ) {
        match self.child_mut(&child.name) {
            Some(existing) => *existing = child,
            None => self.children.push(child),
        }
    }

    pub(crate) fn remove_child(
        &mut self,
        name: &str,
    ) -> Option<DataNode> {
        let pos = self.children.iter().position(|c| c.name == name)?;
        Some(self.children.remove(pos))
    }

    /// Walks `path` below this node.
    pub fn descendant(
        &self,
        path: &TreePath,
    ) -> Option<&DataNode> {
        path.segments().iter().try_fold(self, |node, segment| node.child(segment))
    }
}

/// A subtree of one partition, such as the mirrored subscription records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtreeLocation {
    pub partition: Datastore,
    pub path: TreePath,
}

impl SubtreeLocation {
    /// True if a write at `path` lies entirely inside this subtree.
    pub fn covers(
        &self,
        partition: Datastore,
        path: &TreePath,
    ) -> bool {
        self.partition == partition && self.path.contains(path)
    }

    /// Cuts this subtree out of `data`, the node found at `at`.
    ///
    /// Only applies when `at` is a strict ancestor of the subtree; a read
    /// aimed at or below it is left untouched.
    pub fn prune(
        &self,
        partition: Datastore,
        at: &TreePath,
        data: &mut DataNode,
    ) {
        if self.partition != partition || *at == self.path || !at.contains(&self.path) {
            return;
        }
        let relative = &self.path.segments()[at.segments().len()..];
        let Some((last, parents)) = relative.split_last() else {
            return;
        };
        if let Some(parent) = parents
            .iter()
            .try_fold(data, |node, segment| node.child_mut(segment))
        {
            parent.remove_child(last);
        }
    }
}

/// Mutation event delivered by a data store change listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub partition: Datastore,
    /// Path that was written or deleted.
    pub path: TreePath,
    /// Subtree at `path` after the change, `None` if it was deleted.
    pub data: Option<DataNode>,
}
