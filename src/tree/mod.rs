use std::fmt::{self, Display};

use anyhow::bail;
use hashbrown::HashMap;

use crate::distances::UnknownTaxonError;
use crate::{Result, TaxonId};

mod tree_builder;
mod tree_node;

pub use tree_builder::TreeBuilder;
pub use tree_node::{Edge, Node, NodeKind};

use NodeIdx::{Internal as Int, Leaf};

/// Handle of a node in the tree arena. Leaves are numbered in input order,
/// internal nodes in the order they are created.
#[derive(Debug, PartialEq, Clone, Copy, PartialOrd, Eq, Ord, Hash)]
pub enum NodeIdx {
    Internal(usize),
    Leaf(usize),
}

impl From<NodeIdx> for usize {
    fn from(node_idx: NodeIdx) -> usize {
        match node_idx {
            Int(idx) => idx,
            Leaf(idx) => idx,
        }
    }
}

impl Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Int(idx) => write!(f, "Internal node {}", idx),
            Leaf(idx) => write!(f, "Leaf node {}", idx),
        }
    }
}

/// Binary tree stored as an arena of leaves and internal nodes.
///
/// Internal nodes own two outgoing edges that carry the branch lengths, a
/// node's length is therefore read from its parent's edge (see [`Tree::blen`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Tree<T = String> {
    root: Option<NodeIdx>,
    leaves: Vec<Node<T>>,
    internals: Vec<Node<T>>,
}

impl<T: TaxonId> Tree<T> {
    /// Creates a tree holding only unconnected leaves, one per taxon, in input order.
    pub fn new(taxa: &[T]) -> Self {
        Self {
            root: None,
            leaves: taxa
                .iter()
                .enumerate()
                .map(|(idx, id)| Node::new_leaf(idx, id.clone()))
                .collect(),
            internals: Vec::with_capacity(taxa.len().saturating_sub(1)),
        }
    }

    /// Joins two parentless nodes under a new internal node and returns its handle.
    /// `blen_a` and `blen_b` are the lengths of the edges from the new node to
    /// `a` and `b` respectively. Neither child record is otherwise altered.
    ///
    /// # Example
    /// ```
    /// use phylo_nj::tree::{NodeIdx, Tree};
    /// let mut tree = Tree::new(&["A".to_string(), "B".to_string()]);
    /// let root = tree.merge(&NodeIdx::Leaf(0), &NodeIdx::Leaf(1), 0.5, 1.5).unwrap();
    /// assert_eq!(root, NodeIdx::Internal(0));
    /// assert_eq!(tree.blen(&NodeIdx::Leaf(1)), 1.5);
    /// ```
    pub fn merge(&mut self, a: &NodeIdx, b: &NodeIdx, blen_a: f64, blen_b: f64) -> Result<NodeIdx> {
        if a == b {
            bail!("Cannot merge {} with itself.", a);
        }
        for idx in [a, b] {
            if !self.contains(idx) {
                bail!("{} is not part of the tree.", idx);
            }
            if let Some(parent) = self.node(idx).parent {
                bail!("{} is already a child of {}.", idx, parent);
            }
        }
        let new_idx = Int(self.internals.len());
        self.internals.push(Node::new_internal(
            self.internals.len(),
            [Edge::new(*a, blen_a), Edge::new(*b, blen_b)],
        ));
        self.node_mut(a).add_parent(&new_idx);
        self.node_mut(b).add_parent(&new_idx);
        Ok(new_idx)
    }

    pub(crate) fn set_root(&mut self, root: NodeIdx) {
        debug_assert!(self.node(&root).parent.is_none());
        self.root = Some(root);
    }

    /// Root of a completed tree, `None` while the tree is still being built.
    pub fn root(&self) -> Option<NodeIdx> {
        self.root
    }

    pub fn contains(&self, idx: &NodeIdx) -> bool {
        match *idx {
            Int(idx) => idx < self.internals.len(),
            Leaf(idx) => idx < self.leaves.len(),
        }
    }

    pub fn node(&self, idx: &NodeIdx) -> &Node<T> {
        match *idx {
            Int(idx) => &self.internals[idx],
            Leaf(idx) => &self.leaves[idx],
        }
    }

    fn node_mut(&mut self, idx: &NodeIdx) -> &mut Node<T> {
        match *idx {
            Int(idx) => &mut self.internals[idx],
            Leaf(idx) => &mut self.leaves[idx],
        }
    }

    pub fn children(&self, idx: &NodeIdx) -> &[Edge] {
        self.node(idx).children()
    }

    pub fn parent(&self, idx: &NodeIdx) -> Option<NodeIdx> {
        self.node(idx).parent
    }

    /// Length of the edge connecting the node to its parent, 0 for the root.
    pub fn blen(&self, idx: &NodeIdx) -> f64 {
        match self.node(idx).parent {
            Some(parent) => self
                .children(&parent)
                .iter()
                .find(|edge| edge.target == *idx)
                .map_or(0.0, |edge| edge.blen),
            None => 0.0,
        }
    }

    pub fn leaf_id(&self, idx: &NodeIdx) -> Option<&T> {
        self.node(idx).id()
    }

    pub fn idx_by_id(&self, id: &T) -> Result<NodeIdx> {
        match self.leaves.iter().find(|node| node.id() == Some(id)) {
            Some(node) => Ok(node.idx),
            None => bail!(UnknownTaxonError {
                id: format!("{:?}", id)
            }),
        }
    }

    /// Number of leaves.
    pub fn n(&self) -> usize {
        self.leaves.len()
    }

    /// Number of nodes, leaves and internal nodes together.
    pub fn len(&self) -> usize {
        self.leaves.len() + self.internals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaves(&self) -> &[Node<T>] {
        &self.leaves
    }

    pub fn internals(&self) -> &[Node<T>] {
        &self.internals
    }

    pub fn leaf_ids(&self) -> Vec<T> {
        self.leaves
            .iter()
            .filter_map(|node| node.id().cloned())
            .collect()
    }

    pub fn preorder_subroot(&self, subroot_idx: &NodeIdx) -> Vec<NodeIdx> {
        let mut order = Vec::<NodeIdx>::with_capacity(self.len());
        let mut stack = vec![*subroot_idx];
        while let Some(cur_root) = stack.pop() {
            order.push(cur_root);
            for edge in self.children(&cur_root).iter().rev() {
                stack.push(edge.target);
            }
        }
        order
    }

    pub fn postorder_subroot(&self, subroot_idx: &NodeIdx) -> Vec<NodeIdx> {
        let mut order = Vec::<NodeIdx>::with_capacity(self.len());
        let mut stack = vec![*subroot_idx];
        while let Some(cur_root) = stack.pop() {
            order.push(cur_root);
            for edge in self.children(&cur_root) {
                stack.push(edge.target);
            }
        }
        order.reverse();
        order
    }

    /// Preorder from the root, empty while the tree has no root.
    pub fn preorder(&self) -> Vec<NodeIdx> {
        self.root
            .map_or_else(Vec::new, |root| self.preorder_subroot(&root))
    }

    /// Postorder from the root, empty while the tree has no root.
    pub fn postorder(&self) -> Vec<NodeIdx> {
        self.root
            .map_or_else(Vec::new, |root| self.postorder_subroot(&root))
    }

    pub fn reachable_leaves(&self, subroot_idx: &NodeIdx) -> Vec<NodeIdx> {
        self.preorder_subroot(subroot_idx)
            .into_iter()
            .filter(|idx| matches!(idx, Leaf(_)))
            .collect()
    }

    /// Edge lengths in preorder of their target nodes.
    pub fn all_branch_lengths(&self) -> Vec<f64> {
        self.preorder()
            .iter()
            .flat_map(|idx| self.children(idx).iter().map(|edge| edge.blen))
            .collect()
    }

    pub fn tree_length(&self) -> f64 {
        self.all_branch_lengths().iter().sum()
    }

    /// Sum of edge lengths along the path between two nodes.
    /// Bails if the nodes are not connected.
    pub fn patristic_distance(&self, a: &NodeIdx, b: &NodeIdx) -> Result<f64> {
        let mut to_ancestor = HashMap::new();
        let mut dist = 0.0;
        let mut cur = Some(*a);
        while let Some(idx) = cur {
            to_ancestor.insert(idx, dist);
            dist += self.blen(&idx);
            cur = self.parent(&idx);
        }
        let mut dist = 0.0;
        let mut cur = Some(*b);
        while let Some(idx) = cur {
            if let Some(from_a) = to_ancestor.get(&idx) {
                return Ok(from_a + dist);
            }
            dist += self.blen(&idx);
            cur = self.parent(&idx);
        }
        bail!("{} and {} are not connected.", a, b)
    }
}
