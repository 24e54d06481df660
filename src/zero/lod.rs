//! Limit of detection estimated from the data.

use crate::data::FeatureTable;

/// Estimate the limit of detection (LOD) of a feature table.
///
/// The smallest strictly positive finite intensity, rounded to the nearest
/// integer (ties to even). Returns `NaN` when the table has no positive value.
pub fn cutoff_lod(table: &FeatureTable) -> f64 {
    let min_positive = table
        .values()
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold(f64::INFINITY, f64::min);

    if min_positive.is_infinite() {
        log::warn!("No positive intensities, limit of detection is undefined");
        f64::NAN
    } else {
        let lod = min_positive.round_ties_even();
        log::debug!("Limit of detection: {} (minimum positive {})", lod, min_positive);
        lod
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(values: &[f64]) -> FeatureTable {
        FeatureTable::from_rows(
            &[values.to_vec()],
            vec!["m1".into()],
            (0..values.len()).map(|j| format!("s{}", j)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_lod_ignores_zeros() {
        assert_eq!(cutoff_lod(&table(&[0.0, 0.0, 5.0, 12.0, 0.0])), 5.0);
    }

    #[test]
    fn test_lod_rounds() {
        assert_eq!(cutoff_lod(&table(&[7.6, 20.0])), 8.0);
        assert_eq!(cutoff_lod(&table(&[2.5, 20.0])), 2.0);
        assert_eq!(cutoff_lod(&table(&[f64::NAN, 3.2])), 3.0);
    }

    #[test]
    fn test_lod_undefined() {
        assert!(cutoff_lod(&table(&[0.0, 0.0])).is_nan());
        assert!(cutoff_lod(&FeatureTable::empty()).is_nan());
    }
}
