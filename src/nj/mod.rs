use std::fmt;

use anyhow::bail;
use log::{debug, info, warn};

use crate::distances::DistanceStore;
use crate::tree::{NodeIdx, Tree, TreeBuilder};
use crate::{Result, TaxonId};

mod active_nodes;

pub use active_nodes::ActiveNodes;

#[derive(Debug)]
pub struct InsufficientTaxaError {
    pub n: usize,
}

impl fmt::Display for InsufficientTaxaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "At least 2 taxa are needed to build a tree, got {}",
            self.n
        )
    }
}

impl std::error::Error for InsufficientTaxaError {}

#[derive(Debug)]
pub struct DegenerateSeparationError {
    pub active: usize,
}

impl fmt::Display for DegenerateSeparationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Separation needs at least 3 active nodes, got {}",
            self.active
        )
    }
}

impl std::error::Error for DegenerateSeparationError {}

/// Neighbour-joining tree builder.
///
/// Separations are cached once per iteration by default, which brings an
/// iteration down from cubic to quadratic time without changing the result.
#[derive(Debug, Clone, PartialEq)]
pub struct NJBuilder {
    cache_separations: bool,
    validate_input: bool,
}

impl Default for NJBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TaxonId> TreeBuilder<T> for NJBuilder {
    fn build_tree(&self, distances: DistanceStore<T>) -> Result<Tree<T>> {
        self.build_nj_tree(distances)
    }
}

impl NJBuilder {
    pub fn new() -> Self {
        Self {
            cache_separations: true,
            validate_input: false,
        }
    }

    /// When disabled every Q value recomputes both separations from scratch.
    pub fn cache_separations(mut self, cache: bool) -> Self {
        self.cache_separations = cache;
        self
    }

    /// When enabled the initial distances are checked for completeness,
    /// finiteness and non-negativity before any join is made.
    pub fn validate_input(mut self, validate: bool) -> Self {
        self.validate_input = validate;
        self
    }

    /// Joins the taxa of the store until two nodes remain and connects those
    /// under the root. The store is consumed, it grows by one node per join.
    ///
    /// # Example
    /// ```
    /// use nalgebra::dmatrix;
    /// use phylo_nj::distances::DistanceStore;
    /// use phylo_nj::nj::NJBuilder;
    /// let store = DistanceStore::from_matrix(
    ///     vec!["A", "B", "C", "D"],
    ///     &dmatrix![0.0, 4.0, 5.0, 10.0;
    ///               4.0, 0.0, 7.0, 12.0;
    ///               5.0, 7.0, 0.0, 9.0;
    ///               10.0, 12.0, 9.0, 0.0],
    /// )
    /// .unwrap();
    /// let tree = NJBuilder::new().build_nj_tree(store).unwrap();
    /// let d = tree.idx_by_id(&"D").unwrap();
    /// assert_eq!(tree.blen(&d), 7.0);
    /// # assert_eq!(tree.len(), 7);
    /// ```
    pub fn build_nj_tree<T: TaxonId>(&self, mut distances: DistanceStore<T>) -> Result<Tree<T>> {
        let n = distances.n_taxa();
        if n < 2 {
            bail!(InsufficientTaxaError { n });
        }
        info!("Building NJ tree for {} taxa.", n);
        let mut active = ActiveNodes::new(distances.leaves(), self.cache_separations);
        if self.validate_input {
            distances.check_complete(active.nodes())?;
        }
        let mut tree = Tree::new(distances.taxa());

        while active.len() > 2 {
            let (i, j, q) = active.argmin_criterion(&distances)?;
            let (a, b) = (active.nodes()[i], active.nodes()[j]);
            let (blen_a, blen_b) = active.branch_lengths(&a, &b, &distances)?;
            if blen_a < 0.0 || blen_b < 0.0 {
                warn!(
                    "Negative branch length joining {} ({}) and {} ({}).",
                    a, blen_a, b, blen_b
                );
            }
            let new = tree.merge(&a, &b, blen_a, blen_b)?;
            distances.register_internal(&new)?;
            active.update_distances(&a, &b, &new, &mut distances)?;
            active.replace_pair(&a, &b, new)?;
            debug!(
                "Joined {} and {} into {} with Q {}, {} nodes left.",
                a,
                b,
                new,
                q,
                active.len()
            );
        }

        let root = Self::terminate(&mut tree, &active, &distances)?;
        tree.set_root(root);
        info!(
            "Finished NJ tree with {} nodes, total length {}.",
            tree.len(),
            tree.tree_length()
        );
        Ok(tree)
    }

    /// Connects the last two active nodes, splitting their distance evenly.
    pub(crate) fn terminate<T: TaxonId>(
        tree: &mut Tree<T>,
        active: &ActiveNodes,
        distances: &DistanceStore<T>,
    ) -> Result<NodeIdx> {
        let [x, y] = active.nodes() else {
            bail!(
                "Expected 2 nodes to remain for the root, got {}.",
                active.len()
            );
        };
        let dist = distances.get(x, y)?;
        tree.merge(x, y, 0.5 * dist, 0.5 * dist)
    }
}

/// Builds a neighbour-joining tree with the default settings.
pub fn build_nj_tree<T: TaxonId>(distances: DistanceStore<T>) -> Result<Tree<T>> {
    NJBuilder::new().build_nj_tree(distances)
}
