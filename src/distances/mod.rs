use std::fmt::{self, Display};

use anyhow::bail;
use fixedbitset::FixedBitSet;
use hashbrown::HashMap;
use itertools::Itertools;
use log::info;
use nalgebra::DMatrix;

use crate::tree::NodeIdx::{self, Internal as Int, Leaf};
use crate::{Result, TaxonId};

#[derive(Debug)]
pub struct MissingDistanceError {
    pub a: NodeIdx,
    pub b: NodeIdx,
}

impl Display for MissingDistanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No distance between {} and {}", self.a, self.b)
    }
}

impl std::error::Error for MissingDistanceError {}

#[derive(Debug)]
pub struct UnknownNodeError(pub NodeIdx);

impl Display for UnknownNodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not registered in the distance store", self.0)
    }
}

impl std::error::Error for UnknownNodeError {}

#[derive(Debug)]
pub struct DuplicateTaxonError {
    pub id: String,
}

impl Display for DuplicateTaxonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Taxon {} appears more than once", self.id)
    }
}

impl std::error::Error for DuplicateTaxonError {}

#[derive(Debug)]
pub struct UnknownTaxonError {
    pub id: String,
}

impl Display for UnknownTaxonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown taxon {}", self.id)
    }
}

impl std::error::Error for UnknownTaxonError {}

#[derive(Debug)]
pub struct DimensionError {
    pub message: String,
}

impl Display for DimensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DimensionError {}

#[derive(Debug)]
pub struct AsymmetricInputError {
    pub i: usize,
    pub j: usize,
}

impl Display for AsymmetricInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Distance matrix is not symmetric at ({}, {})",
            self.i, self.j
        )
    }
}

impl std::error::Error for AsymmetricInputError {}

#[derive(Debug)]
pub struct InvalidDistanceError {
    pub a: NodeIdx,
    pub b: NodeIdx,
    pub value: f64,
}

impl Display for InvalidDistanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid distance {} between {} and {}",
            self.value, self.a, self.b
        )
    }
}

impl std::error::Error for InvalidDistanceError {}

/// Symmetric distances between the nodes of a tree under construction.
///
/// Leaves are registered when the store is created, internal nodes one at a
/// time with [`DistanceStore::register_internal`]. Every node gets a dense
/// position (leaves first, then internal nodes in creation order) and a single
/// value per unordered pair is kept in a flat lower triangle, so `get(a, b)`
/// and `get(b, a)` always agree. Entries of retired nodes are never purged.
#[derive(Debug, Clone)]
pub struct DistanceStore<T = String> {
    taxa: Vec<T>,
    taxon_idx: HashMap<T, usize>,
    n_internals: usize,
    values: Vec<f64>,
    present: FixedBitSet,
}

fn triangle_idx(hi: usize, lo: usize) -> usize {
    debug_assert!(hi > lo);
    hi * (hi - 1) / 2 + lo
}

fn triangle_len(n_nodes: usize) -> usize {
    n_nodes * n_nodes.saturating_sub(1) / 2
}

impl<T: TaxonId> DistanceStore<T> {
    /// Creates a store for the given taxa without any distances set.
    /// Bails if a taxon appears more than once.
    ///
    /// # Example
    /// ```
    /// use phylo_nj::distances::DistanceStore;
    /// let mut store = DistanceStore::new(vec!["A", "B"]).unwrap();
    /// store.set_by_id(&"A", &"B", 2.0).unwrap();
    /// assert_eq!(store.get_by_id(&"B", &"A").unwrap(), 2.0);
    /// ```
    pub fn new(taxa: Vec<T>) -> Result<Self> {
        let mut taxon_idx = HashMap::with_capacity(taxa.len());
        for (i, id) in taxa.iter().enumerate() {
            if taxon_idx.insert(id.clone(), i).is_some() {
                bail!(DuplicateTaxonError {
                    id: format!("{:?}", id)
                });
            }
        }
        let n = taxa.len();
        // room for the n - 1 internal nodes a full build creates
        let capacity = triangle_len(2 * n);
        let mut values = Vec::with_capacity(capacity);
        values.resize(triangle_len(n), 0.0);
        let mut present = FixedBitSet::with_capacity(capacity);
        present.grow(triangle_len(n));
        Ok(Self {
            taxa,
            taxon_idx,
            n_internals: 0,
            values,
            present,
        })
    }

    /// Creates a store from a square matrix whose rows and columns follow the order of `taxa`.
    /// Bails if the dimensions do not match the taxa or if the matrix is not symmetric.
    ///
    /// # Example
    /// ```
    /// use nalgebra::dmatrix;
    /// use phylo_nj::distances::DistanceStore;
    /// use phylo_nj::tree::NodeIdx::Leaf;
    /// let store = DistanceStore::from_matrix(
    ///     vec!["A".to_string(), "B".to_string(), "C".to_string()],
    ///     &dmatrix![0.0, 2.0, 3.0; 2.0, 0.0, 3.0; 3.0, 3.0, 0.0],
    /// )
    /// .unwrap();
    /// assert_eq!(store.get(&Leaf(2), &Leaf(0)).unwrap(), 3.0);
    /// ```
    pub fn from_matrix(taxa: Vec<T>, matrix: &DMatrix<f64>) -> Result<Self> {
        if !matrix.is_square() {
            bail!(DimensionError {
                message: format!(
                    "Distance matrix must be square, got {}x{}",
                    matrix.nrows(),
                    matrix.ncols()
                )
            });
        }
        if matrix.nrows() != taxa.len() {
            bail!(DimensionError {
                message: format!(
                    "Distance matrix has {} rows but {} taxa were given",
                    matrix.nrows(),
                    taxa.len()
                )
            });
        }
        let mut store = Self::new(taxa)?;
        for (i, j) in (0..matrix.nrows()).tuple_combinations() {
            if matrix[(i, j)] != matrix[(j, i)] {
                bail!(AsymmetricInputError { i, j });
            }
            store.set(&Leaf(i), &Leaf(j), matrix[(i, j)])?;
        }
        info!(
            "Created distance store for {} taxa from a matrix.",
            store.n_taxa()
        );
        Ok(store)
    }

    /// Creates a store from `(taxon, taxon, distance)` triples. Pairs that are
    /// not listed stay unset. A later triple for the same pair overwrites an earlier one.
    pub fn from_pairs(taxa: Vec<T>, pairs: impl IntoIterator<Item = (T, T, f64)>) -> Result<Self> {
        let mut store = Self::new(taxa)?;
        for (a, b, dist) in pairs {
            store.set_by_id(&a, &b, dist)?;
        }
        Ok(store)
    }

    pub fn taxa(&self) -> &[T] {
        &self.taxa
    }

    pub fn n_taxa(&self) -> usize {
        self.taxa.len()
    }

    /// Number of registered nodes, leaves and internal nodes together.
    pub fn n_nodes(&self) -> usize {
        self.taxa.len() + self.n_internals
    }

    pub fn leaf_idx(&self, id: &T) -> Result<NodeIdx> {
        match self.taxon_idx.get(id) {
            Some(&i) => Ok(Leaf(i)),
            None => bail!(UnknownTaxonError {
                id: format!("{:?}", id)
            }),
        }
    }

    /// Handles of all leaves in input order.
    pub fn leaves(&self) -> Vec<NodeIdx> {
        (0..self.taxa.len()).map(Leaf).collect()
    }

    fn dense_idx(&self, idx: &NodeIdx) -> Result<usize> {
        match *idx {
            Leaf(i) if i < self.taxa.len() => Ok(i),
            Int(k) if k < self.n_internals => Ok(self.taxa.len() + k),
            _ => bail!(UnknownNodeError(*idx)),
        }
    }

    /// Makes room for the distances of the next internal node, which must be
    /// `Internal(k)` with `k` the number of internal nodes registered so far.
    pub fn register_internal(&mut self, idx: &NodeIdx) -> Result<()> {
        if *idx != Int(self.n_internals) {
            bail!(
                "Expected internal node {} to be registered next, got {}.",
                self.n_internals,
                idx
            );
        }
        self.n_internals += 1;
        let len = triangle_len(self.n_nodes());
        self.values.resize(len, 0.0);
        self.present.grow(len);
        Ok(())
    }

    pub fn contains(&self, a: &NodeIdx, b: &NodeIdx) -> bool {
        match (self.dense_idx(a), self.dense_idx(b)) {
            (Ok(i), Ok(j)) if i == j => true,
            (Ok(i), Ok(j)) => self.present.contains(triangle_idx(i.max(j), i.min(j))),
            _ => false,
        }
    }

    /// Distance between two registered nodes, 0 between a node and itself.
    /// Bails with [`MissingDistanceError`] if the pair was never set.
    pub fn get(&self, a: &NodeIdx, b: &NodeIdx) -> Result<f64> {
        let (i, j) = (self.dense_idx(a)?, self.dense_idx(b)?);
        if i == j {
            return Ok(0.0);
        }
        let pos = triangle_idx(i.max(j), i.min(j));
        if !self.present.contains(pos) {
            bail!(MissingDistanceError { a: *a, b: *b });
        }
        Ok(self.values[pos])
    }

    /// Sets the distance for both orderings of the pair.
    /// A node's distance to itself can only be set to 0.
    pub fn set(&mut self, a: &NodeIdx, b: &NodeIdx, dist: f64) -> Result<()> {
        let (i, j) = (self.dense_idx(a)?, self.dense_idx(b)?);
        if i == j {
            if dist != 0.0 {
                bail!(InvalidDistanceError {
                    a: *a,
                    b: *b,
                    value: dist
                });
            }
            return Ok(());
        }
        let pos = triangle_idx(i.max(j), i.min(j));
        self.values[pos] = dist;
        self.present.insert(pos);
        Ok(())
    }

    pub fn get_by_id(&self, a: &T, b: &T) -> Result<f64> {
        self.get(&self.leaf_idx(a)?, &self.leaf_idx(b)?)
    }

    pub fn set_by_id(&mut self, a: &T, b: &T, dist: f64) -> Result<()> {
        let (a, b) = (self.leaf_idx(a)?, self.leaf_idx(b)?);
        self.set(&a, &b, dist)
    }

    /// Checks that every pair of the given nodes has a finite, non-negative distance.
    pub fn check_complete(&self, nodes: &[NodeIdx]) -> Result<()> {
        for (a, b) in nodes.iter().tuple_combinations() {
            let dist = self.get(a, b)?;
            if !dist.is_finite() || dist < 0.0 {
                bail!(InvalidDistanceError {
                    a: *a,
                    b: *b,
                    value: dist
                });
            }
        }
        Ok(())
    }

    pub fn is_complete_for(&self, nodes: &[NodeIdx]) -> bool {
        nodes
            .iter()
            .tuple_combinations()
            .all(|(a, b)| self.contains(a, b))
    }
}

#[cfg(test)]
mod distances_tests;
