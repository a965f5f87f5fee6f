use anyhow::bail;

use crate::distances::DistanceStore;
use crate::nj::DegenerateSeparationError;
use crate::tree::NodeIdx;
use crate::{Result, TaxonId};

/// Ordered working set of the nodes that can still be joined.
///
/// Order only matters for tie-breaking: among equally good pairs the first one
/// met when scanning positions `(i, j)`, `i` then `j` ascending, is selected.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveNodes {
    nodes: Vec<NodeIdx>,
    cache_separations: bool,
}

impl ActiveNodes {
    pub fn new(nodes: Vec<NodeIdx>, cache_separations: bool) -> Self {
        Self {
            nodes,
            cache_separations,
        }
    }

    pub fn nodes(&self) -> &[NodeIdx] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Net divergence of `node`: sum of its distances to every other active node
    /// divided by `len - 2`. Only defined while at least three nodes are active.
    pub fn separation<T: TaxonId>(
        &self,
        node: &NodeIdx,
        distances: &DistanceStore<T>,
    ) -> Result<f64> {
        if self.nodes.len() < 3 {
            bail!(DegenerateSeparationError {
                active: self.nodes.len()
            });
        }
        let mut dist_sum = 0.0;
        for other in self.nodes.iter().filter(|&other| other != node) {
            dist_sum += distances.get(node, other)?;
        }
        Ok(dist_sum / (self.nodes.len() - 2) as f64)
    }

    /// Separations of all active nodes, in active order.
    pub fn separations<T: TaxonId>(&self, distances: &DistanceStore<T>) -> Result<Vec<f64>> {
        cfg_if::cfg_if! {
        if #[cfg(feature = "par-nj")] {
            use rayon::prelude::*;
            let nodes = self.nodes.par_iter();
        } else {
            let nodes = self.nodes.iter();
        }
        }
        nodes
            .map(|node| self.separation(node, distances))
            .collect()
    }

    /// Q value of the pair, `d(a, b) - separation(a) - separation(b)`.
    pub fn nj_criterion<T: TaxonId>(
        &self,
        a: &NodeIdx,
        b: &NodeIdx,
        distances: &DistanceStore<T>,
    ) -> Result<f64> {
        let dist = distances.get(a, b)?;
        let sep_a = self.separation(a, distances)?;
        let sep_b = self.separation(b, distances)?;
        Ok(dist - sep_a - sep_b)
    }

    fn criterion_at<T: TaxonId>(
        &self,
        i: usize,
        j: usize,
        distances: &DistanceStore<T>,
        separations: Option<&[f64]>,
    ) -> Result<f64> {
        match separations {
            Some(seps) => {
                let dist = distances.get(&self.nodes[i], &self.nodes[j])?;
                Ok(dist - seps[i] - seps[j])
            }
            None => self.nj_criterion(&self.nodes[i], &self.nodes[j], distances),
        }
    }

    /// Positions of the pair minimising the Q value together with that value.
    /// The scan is seeded with positions `(0, 1)` and only a strictly smaller
    /// value replaces the current best.
    pub(crate) fn argmin_criterion<T: TaxonId>(
        &self,
        distances: &DistanceStore<T>,
    ) -> Result<(usize, usize, f64)> {
        let n = self.nodes.len();
        let cached = if self.cache_separations {
            Some(self.separations(distances)?)
        } else {
            None
        };
        let seps = cached.as_deref();
        let mut best = (0, 1, self.criterion_at(0, 1, distances, seps)?);

        cfg_if::cfg_if! {
        if #[cfg(feature = "par-nj")] {
            use rayon::prelude::*;
            let rows = (0..n)
                .into_par_iter()
                .map(|i| {
                    (0..n)
                        .map(|j| {
                            if i == j {
                                Ok(f64::NAN)
                            } else {
                                self.criterion_at(i, j, distances, seps)
                            }
                        })
                        .collect::<Result<Vec<f64>>>()
                })
                .collect::<Result<Vec<_>>>()?;
            for (i, row) in rows.iter().enumerate() {
                for (j, &q) in row.iter().enumerate() {
                    if i != j && q < best.2 {
                        best = (i, j, q);
                    }
                }
            }
        } else {
            for i in 0..n {
                for j in (0..n).filter(|&j| j != i) {
                    let q = self.criterion_at(i, j, distances, seps)?;
                    if q < best.2 {
                        best = (i, j, q);
                    }
                }
            }
        }
        }
        Ok(best)
    }

    /// Pair of active nodes to join next, in scan order.
    /// Bails if fewer than three nodes are active.
    ///
    /// # Example
    /// ```
    /// use nalgebra::dmatrix;
    /// use phylo_nj::distances::DistanceStore;
    /// use phylo_nj::nj::ActiveNodes;
    /// use phylo_nj::tree::NodeIdx::Leaf;
    /// let store = DistanceStore::from_matrix(
    ///     vec!["A", "B", "C", "D"],
    ///     &dmatrix![0.0, 4.0, 5.0, 10.0;
    ///               4.0, 0.0, 7.0, 12.0;
    ///               5.0, 7.0, 0.0, 9.0;
    ///               10.0, 12.0, 9.0, 0.0],
    /// )
    /// .unwrap();
    /// let active = ActiveNodes::new(store.leaves(), true);
    /// assert_eq!(active.best_pair(&store).unwrap(), (Leaf(0), Leaf(1)));
    /// ```
    pub fn best_pair<T: TaxonId>(
        &self,
        distances: &DistanceStore<T>,
    ) -> Result<(NodeIdx, NodeIdx)> {
        let (i, j, _) = self.argmin_criterion(distances)?;
        Ok((self.nodes[i], self.nodes[j]))
    }

    /// Lengths of the edges from the future common ancestor of `a` and `b` to
    /// `a` and to `b`. Negative lengths are returned as they are.
    pub fn branch_lengths<T: TaxonId>(
        &self,
        a: &NodeIdx,
        b: &NodeIdx,
        distances: &DistanceStore<T>,
    ) -> Result<(f64, f64)> {
        let dist = distances.get(a, b)?;
        let sep_a = self.separation(a, distances)?;
        let sep_b = self.separation(b, distances)?;
        Ok((
            0.5 * (dist + (sep_a - sep_b)),
            0.5 * (dist + (sep_b - sep_a)),
        ))
    }

    /// Sets the distance from `new` to every active node other than `a` and `b`
    /// to `(d(a, n) + d(b, n) - d(a, b)) / 2`. `new` must already be registered
    /// in the store. Entries of `a` and `b` are left in place.
    pub fn update_distances<T: TaxonId>(
        &self,
        a: &NodeIdx,
        b: &NodeIdx,
        new: &NodeIdx,
        distances: &mut DistanceStore<T>,
    ) -> Result<()> {
        let dist_ab = distances.get(a, b)?;
        for other in self.nodes.iter().filter(|&n| n != a && n != b) {
            let new_dist = 0.5 * (distances.get(a, other)? + distances.get(b, other)? - dist_ab);
            distances.set(other, new, new_dist)?;
        }
        Ok(())
    }

    /// Removes the joined pair, keeping the order of the remaining nodes, and
    /// appends their new ancestor.
    pub fn replace_pair(&mut self, a: &NodeIdx, b: &NodeIdx, new: NodeIdx) -> Result<()> {
        for idx in [a, b] {
            if !self.nodes.contains(idx) {
                bail!("{} is not an active node.", idx);
            }
        }
        if a == b {
            bail!("Cannot join {} with itself.", a);
        }
        self.nodes.retain(|n| n != a && n != b);
        self.nodes.push(new);
        Ok(())
    }
}
