use crate::distances::DistanceStore;
use crate::tree::Tree;
use crate::Result;

pub trait TreeBuilder<T> {
    fn build_tree(&self, distances: DistanceStore<T>) -> Result<Tree<T>>;
}
