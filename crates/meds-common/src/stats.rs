//! Order statistics used by the binning transforms.
//!
//! Quantiles use linear interpolation between closest ranks, which is the
//! default method of the numerical tooling the training data is usually
//! inspected with. Inputs are expected to be finite.

/// Returns a sorted copy of the values.
fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear interpolation that stays monotone in `t`.
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let diff = b - a;
    if t >= 0.5 { b - diff * (1.0 - t) } else { a + diff * t }
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    lerp(sorted[lower], sorted[upper], position - lower as f64)
}

/// Computes the `q`-th quantile (`0.0..=1.0`) of the values.
///
/// Returns `None` for an empty slice.
///
/// ```
/// use meds_common::quantile;
///
/// assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0], 0.5), Some(2.5));
/// assert_eq!(quantile(&[], 0.5), None);
/// ```
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(quantile_sorted(&sorted(values), q))
}

/// Computes `k + 1` equal-probability bin edges spanning `[0, 1]`.
///
/// The first edge is the minimum and the last the maximum of the values.
pub fn quantile_edges(values: &[f64], k: usize) -> Option<Vec<f64>> {
    if values.is_empty() || k == 0 {
        return None;
    }
    let sorted = sorted(values);
    Some(
        (0..=k)
            .map(|i| quantile_sorted(&sorted, i as f64 / k as f64))
            .collect(),
    )
}

/// Returns the index of the bin `value` falls into given increasing `bins`.
///
/// Bin `i` satisfies `bins[i - 1] <= value < bins[i]`; values below the first
/// edge land in bin `0` and values at or above the last edge in `bins.len()`.
///
/// ```
/// use meds_common::digitize;
///
/// let bins = [1.0, 2.0, 3.0];
/// assert_eq!(digitize(0.5, &bins), 0);
/// assert_eq!(digitize(1.0, &bins), 1);
/// assert_eq!(digitize(2.5, &bins), 2);
/// assert_eq!(digitize(9.0, &bins), 3);
/// ```
pub fn digitize(value: f64, bins: &[f64]) -> usize {
    bins.partition_point(|&edge| edge <= value)
}

/// Median of the values, `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Arithmetic mean of the values, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn edges_of_uniform_values() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let edges = quantile_edges(&values, 4).expect("edges");
        assert_eq!(edges, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn single_value_quantiles_collapse() {
        let edges = quantile_edges(&[5.0], 3).expect("edges");
        assert_eq!(edges, vec![5.0; 4]);
    }

    proptest! {
        #[test]
        fn edges_are_monotone(values in prop::collection::vec(-1e6f64..1e6, 1..200), k in 1usize..12) {
            let edges = quantile_edges(&values, k).unwrap();
            prop_assert_eq!(edges.len(), k + 1);
            for pair in edges.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
        }

        #[test]
        fn digitize_stays_in_range(value in -1e6f64..1e6, values in prop::collection::vec(-1e6f64..1e6, 1..50)) {
            let edges = quantile_edges(&values, 5).unwrap();
            let bin = digitize(value, &edges[1..edges.len() - 1]);
            prop_assert!(bin <= 4);
        }
    }
}
