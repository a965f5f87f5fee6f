use std::fmt::{Debug, Display};

use approx::relative_eq;

use crate::tree::NodeIdx::{self, Internal as Int, Leaf};

/// Outgoing edge of an internal node, the branch length belongs to the edge
/// and not to the child it points at.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub target: NodeIdx,
    pub blen: f64,
}

impl Edge {
    pub fn new(target: NodeIdx, blen: f64) -> Self {
        Self { target, blen }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && relative_eq!(self.blen, other.blen)
    }
}

#[derive(Clone, PartialEq)]
pub enum NodeKind<T> {
    Leaf { id: T },
    Internal { children: [Edge; 2] },
}

#[derive(Clone)]
pub struct Node<T> {
    pub idx: NodeIdx,
    pub parent: Option<NodeIdx>,
    pub kind: NodeKind<T>,
}

impl<T: Debug> Display for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            NodeKind::Leaf { id } => write!(f, "{} with id {:?}", self.idx, id),
            NodeKind::Internal { .. } => write!(f, "{}", self.idx),
        }
    }
}

impl<T: Debug> Debug for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            NodeKind::Leaf { id } => writeln!(
                f,
                "({:?}) {:?}, parent: {:?}",
                id, self.idx, self.parent,
            ),
            NodeKind::Internal { children } => writeln!(
                f,
                "{:?}, parent: {:?}, children: {:?}:{}, {:?}:{}",
                self.idx,
                self.parent,
                children[0].target,
                children[0].blen,
                children[1].target,
                children[1].blen,
            ),
        }
    }
}

impl<T: PartialEq> PartialEq for Node<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.idx == other.idx) && (self.parent == other.parent) && (self.kind == other.kind)
    }
}

impl<T> Node<T> {
    pub(crate) fn new_leaf(idx: usize, id: T) -> Self {
        Self {
            idx: Leaf(idx),
            parent: None,
            kind: NodeKind::Leaf { id },
        }
    }

    pub(crate) fn new_internal(idx: usize, children: [Edge; 2]) -> Self {
        Self {
            idx: Int(idx),
            parent: None,
            kind: NodeKind::Internal { children },
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Leaf identifier, `None` for internal nodes.
    pub fn id(&self) -> Option<&T> {
        match &self.kind {
            NodeKind::Leaf { id } => Some(id),
            NodeKind::Internal { .. } => None,
        }
    }

    /// Outgoing edges, empty for leaves.
    pub fn children(&self) -> &[Edge] {
        match &self.kind {
            NodeKind::Leaf { .. } => &[],
            NodeKind::Internal { children } => children,
        }
    }

    pub(crate) fn add_parent(&mut self, parent_idx: &NodeIdx) {
        debug_assert!(matches!(parent_idx, Int(_)));
        self.parent = Some(*parent_idx);
    }
}
