use std::fmt::{Debug, Display};

use assert_matches::assert_matches;
use nalgebra::{dmatrix, DMatrix};
use rstest::*;

use crate::distances::{
    AsymmetricInputError, DimensionError, DistanceStore, DuplicateTaxonError,
    InvalidDistanceError, MissingDistanceError, UnknownNodeError, UnknownTaxonError,
};
use crate::tree::NodeIdx::{Internal as I, Leaf as L};

#[cfg(test)]
fn downcast_error<T: Display + Debug + Send + Sync + 'static, S: Debug>(
    result: &anyhow::Result<S>,
) -> &T {
    (result.as_ref().unwrap_err()).downcast_ref::<T>().unwrap()
}

#[cfg(test)]
fn abcd_store() -> DistanceStore<&'static str> {
    DistanceStore::from_matrix(
        vec!["A", "B", "C", "D"],
        &dmatrix![
            0.0, 4.0, 5.0, 10.0;
            4.0, 0.0, 7.0, 12.0;
            5.0, 7.0, 0.0, 9.0;
            10.0, 12.0, 9.0, 0.0],
    )
    .unwrap()
}

#[test]
fn from_matrix_is_symmetric() {
    let store = abcd_store();
    assert_eq!(store.n_taxa(), 4);
    assert_eq!(store.n_nodes(), 4);
    for i in 0..4 {
        for j in 0..4 {
            assert_eq!(
                store.get(&L(i), &L(j)).unwrap(),
                store.get(&L(j), &L(i)).unwrap()
            );
        }
    }
    assert_eq!(store.get(&L(0), &L(3)).unwrap(), 10.0);
    assert_eq!(store.get(&L(2), &L(1)).unwrap(), 7.0);
    assert_eq!(store.get_by_id(&"D", &"B").unwrap(), 12.0);
}

#[test]
fn self_distance_is_zero() {
    let mut store = abcd_store();
    assert_eq!(store.get(&L(2), &L(2)).unwrap(), 0.0);
    assert!(store.set(&L(2), &L(2), 0.0).is_ok());
    let res = store.set(&L(2), &L(2), 1.0);
    assert_matches!(
        downcast_error::<InvalidDistanceError, _>(&res),
        InvalidDistanceError { value, .. } if *value == 1.0
    );
}

#[test]
fn set_overwrites_both_orderings() {
    let mut store = abcd_store();
    store.set(&L(3), &L(0), 1.5).unwrap();
    assert_eq!(store.get(&L(0), &L(3)).unwrap(), 1.5);
    assert_eq!(store.get(&L(3), &L(0)).unwrap(), 1.5);
    store.set_by_id(&"B", &"C", 0.25).unwrap();
    assert_eq!(store.get(&L(2), &L(1)).unwrap(), 0.25);
}

#[test]
fn missing_distance() {
    let store = DistanceStore::from_pairs(
        vec!["A", "B", "C"],
        vec![("A", "B", 1.0), ("B", "C", 2.0)],
    )
    .unwrap();
    assert!(store.contains(&L(0), &L(1)));
    assert!(store.contains(&L(2), &L(1)));
    assert!(!store.contains(&L(0), &L(2)));
    assert!(!store.is_complete_for(&store.leaves()));
    assert!(store.is_complete_for(&[L(0), L(1)]));

    let res = store.get(&L(2), &L(0));
    let err = downcast_error::<MissingDistanceError, _>(&res);
    assert_eq!(err.a, L(2));
    assert_eq!(err.b, L(0));
}

#[test]
fn internal_nodes_need_registration() {
    let mut store = abcd_store();
    let res = store.set(&I(0), &L(1), 1.0);
    assert_matches!(downcast_error::<UnknownNodeError, _>(&res), UnknownNodeError(I(0)));
    assert!(store.register_internal(&I(1)).is_err());

    store.register_internal(&I(0)).unwrap();
    assert_eq!(store.n_nodes(), 5);
    assert!(!store.contains(&I(0), &L(1)));
    store.set(&L(2), &I(0), 3.5).unwrap();
    assert_eq!(store.get(&I(0), &L(2)).unwrap(), 3.5);
    assert!(store.get(&I(0), &L(1)).is_err());

    store.register_internal(&I(1)).unwrap();
    store.set(&I(1), &I(0), 0.5).unwrap();
    assert_eq!(store.get(&I(0), &I(1)).unwrap(), 0.5);
    // leaf entries survive growing the store
    assert_eq!(store.get(&L(3), &L(1)).unwrap(), 12.0);
    assert_eq!(store.get(&L(2), &I(0)).unwrap(), 3.5);
}

#[test]
fn unknown_leaf() {
    let store = abcd_store();
    assert!(store.get(&L(4), &L(0)).is_err());
    let res = store.get_by_id(&"A", &"Z");
    assert_eq!(
        downcast_error::<UnknownTaxonError, _>(&res).to_string(),
        "Unknown taxon \"Z\""
    );
}

#[test]
fn duplicate_taxa() {
    let res = DistanceStore::new(vec!["A", "B", "A"]);
    assert_eq!(downcast_error::<DuplicateTaxonError, _>(&res).id, "\"A\"");
}

#[rstest]
#[case::not_square(DMatrix::<f64>::zeros(3, 2), 3)]
#[case::too_few_rows(DMatrix::<f64>::zeros(2, 2), 3)]
#[case::too_many_rows(DMatrix::<f64>::zeros(4, 4), 3)]
fn matrix_dimension_mismatch(#[case] matrix: DMatrix<f64>, #[case] n: usize) {
    let taxa = (0..n).map(|i| format!("T{}", i)).collect();
    let res = DistanceStore::from_matrix(taxa, &matrix);
    assert!(downcast_error::<DimensionError, _>(&res)
        .to_string()
        .contains("Distance matrix"));
}

#[test]
fn asymmetric_matrix() {
    let res = DistanceStore::from_matrix(
        vec![1, 2, 3],
        &dmatrix![
            0.0, 1.0, 2.0;
            1.0, 0.0, 3.0;
            2.0, 3.5, 0.0],
    );
    assert_matches!(
        downcast_error::<AsymmetricInputError, _>(&res),
        AsymmetricInputError { i: 1, j: 2 }
    );
}

#[rstest]
#[case::negative(-1.0)]
#[case::nan(f64::NAN)]
#[case::infinite(f64::INFINITY)]
fn check_complete_rejects(#[case] value: f64) {
    let mut store = abcd_store();
    assert!(store.check_complete(&store.leaves()).is_ok());
    store.set(&L(1), &L(3), value).unwrap();
    let res = store.check_complete(&store.leaves());
    let err = downcast_error::<InvalidDistanceError, _>(&res);
    assert_eq!((err.a, err.b), (L(1), L(3)));
}

#[test]
fn check_complete_reports_missing() {
    let store = DistanceStore::from_pairs(vec!["A", "B", "C"], vec![("A", "B", 1.0)]).unwrap();
    let res = store.check_complete(&store.leaves());
    assert!(downcast_error::<MissingDistanceError, _>(&res)
        .to_string()
        .starts_with("No distance between Leaf node 0 and Leaf node 2"));
}
