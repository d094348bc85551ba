use itertools::{Itertools, MinMaxResult};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Rescales every column independently to `(v - min) / (max - min)`.
///
/// A column whose values are all equal has no range and is mapped to `0.0`.
pub fn min_max_scale(rows: &mut [Vec<f64>]) {
  let width = rows.first().map(Vec::len).unwrap_or(0);
  for column in 0..width {
    let (min, max) = match rows.iter().map(|row| row[column]).minmax_by(f64::total_cmp) {
      MinMaxResult::NoElements => continue,
      MinMaxResult::OneElement(v) => (v, v),
      MinMaxResult::MinMax(min, max) => (min, max),
    };
    let range = max - min;
    for row in rows.iter_mut() {
      row[column] = if range > 0.0 { (row[column] - min) / range } else { 0.0 };
    }
  }
}

/// Shuffles two equally long slices with the same permutation, derived from
/// `seed` alone.
pub fn shuffle_in_lockstep<A, B>(a: &mut [A], b: &mut [B], seed: u64) {
  debug_assert_eq!(a.len(), b.len());
  let len = a.len().min(b.len());
  if len == 0 {
    return;
  }
  let mut rng = StdRng::seed_from_u64(seed);
  for i in 0..len {
    let j = rng.gen_range(0..len);
    a.swap(i, j);
    b.swap(i, j);
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  #[test]
  fn scales_columns_independently() {
    let mut rows = vec![vec![1.0, 10.0], vec![3.0, 20.0], vec![2.0, 30.0]];
    min_max_scale(&mut rows);
    assert_eq!(rows, vec![vec![0.0, 0.0], vec![1.0, 0.5], vec![0.5, 1.0]]);
  }

  #[test]
  fn constant_column_maps_to_zero() {
    let mut rows = vec![vec![4.0, 1.0], vec![4.0, 2.0]];
    min_max_scale(&mut rows);
    assert_eq!(rows, vec![vec![0.0, 0.0], vec![0.0, 1.0]]);
    let mut empty: Vec<Vec<f64>> = Vec::new();
    min_max_scale(&mut empty);
  }

  #[test]
  fn same_seed_same_order() {
    let mut a: Vec<usize> = (0..20).collect();
    let mut b = a.clone();
    let mut c = a.clone();
    let mut d = a.clone();
    shuffle_in_lockstep(&mut a, &mut b, 42);
    shuffle_in_lockstep(&mut c, &mut d, 42);
    assert_eq!(a, c);
    assert_eq!(a, b);
  }

  proptest! {
    #[test]
    fn shuffle_keeps_rows_paired(rows in prop::collection::vec(-100.0..100.0f64, 0..60), seed in any::<u64>()) {
      let mut inputs: Vec<Vec<f64>> = rows.iter().map(|v| vec![*v]).collect();
      let mut targets: Vec<f64> = rows.iter().map(|v| v * 2.0).collect();
      shuffle_in_lockstep(&mut inputs, &mut targets, seed);
      for (x, t) in inputs.iter().zip(&targets) {
        prop_assert_eq!(x[0] * 2.0, *t);
      }
      let mut sorted: Vec<f64> = inputs.iter().map(|x| x[0]).collect();
      let mut expected = rows.clone();
      sorted.sort_by(f64::total_cmp);
      expected.sort_by(f64::total_cmp);
      prop_assert_eq!(sorted, expected);
    }

    #[test]
    fn shuffle_is_deterministic(len in 0usize..80, seed in any::<u64>()) {
      let mut a: Vec<usize> = (0..len).collect();
      let mut b = a.clone();
      let mut c = a.clone();
      let mut d = a.clone();
      shuffle_in_lockstep(&mut a, &mut b, seed);
      shuffle_in_lockstep(&mut c, &mut d, seed);
      prop_assert_eq!(a, c);
    }

    #[test]
    fn scaling_unit_column_is_identity(inner in prop::collection::vec(0.0..=1.0f64, 0..40)) {
      let mut column = vec![0.0, 1.0];
      column.extend(inner);
      let mut rows: Vec<Vec<f64>> = column.iter().map(|v| vec![*v]).collect();
      min_max_scale(&mut rows);
      for (row, v) in rows.iter().zip(&column) {
        prop_assert!((row[0] - v).abs() < 1e-12);
      }
    }

    #[test]
    fn scaled_values_stay_in_unit_interval(rows in prop::collection::vec(prop::collection::vec(-1e6..1e6f64, 3), 1..40)) {
      let mut rows = rows;
      min_max_scale(&mut rows);
      for v in rows.iter().flatten() {
        prop_assert!((0.0..=1.0).contains(v));
      }
    }
  }
}
