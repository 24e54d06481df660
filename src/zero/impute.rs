//! Imputation of zero intensities below the limit of detection.

use crate::data::FeatureTable;
use crate::error::{MetaboError, Result};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Replace every zero cell with a random integer drawn uniformly from `[0, lod)`.
///
/// Non-zero and missing cells are left unchanged. The caller owns the random
/// source, so passing a seeded generator makes the result reproducible.
///
/// # Errors
/// `InvalidParameter` when `lod` is `NaN` or below 1 (empty range).
pub fn impute<R: Rng>(table: &FeatureTable, lod: f64, rng: &mut R) -> Result<FeatureTable> {
    if !(lod >= 1.0) || !lod.is_finite() {
        return Err(MetaboError::InvalidParameter(format!(
            "Imputation needs a limit of detection of at least 1, got {}",
            lod
        )));
    }
    // Integers strictly below lod
    let upper = lod.ceil() as i64;

    let mut n_imputed = 0usize;
    let mut data = table.matrix().clone();
    for v in data.iter_mut() {
        if *v == 0.0 {
            *v = rng.gen_range(0..upper) as f64;
            n_imputed += 1;
        }
    }
    log::info!("Imputed {} zero values below LOD {}", n_imputed, lod);

    FeatureTable::new(data, table.feature_ids().to_vec(), table.sample_ids().to_vec())
}

/// [`impute`] with a `ChaCha8Rng` seeded from `seed`.
pub fn impute_seeded(table: &FeatureTable, lod: f64, seed: u64) -> Result<FeatureTable> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    impute(table, lod, &mut rng)
}

/// [`impute`] with a generator seeded from system entropy.
///
/// Results differ between runs.
pub fn impute_unseeded(table: &FeatureTable, lod: f64) -> Result<FeatureTable> {
    let mut rng = ChaCha8Rng::from_entropy();
    impute(table, lod, &mut rng)
}
