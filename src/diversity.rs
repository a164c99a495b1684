//! Alpha- and beta-diversity metrics over feature tables.
//!
//! Alpha metrics reduce each sample column to one number. Beta metrics
//! produce a symmetric sample x sample distance matrix; pairwise distances
//! run on a rayon pool sized by the caller's parallelism hint.

use itertools::Itertools;
use log::debug;
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{KmerizerError, Result};
use crate::pipeline::{AlphaMetric, BetaMetric};
use crate::table::FeatureTable;

/// A named per-sample diversity vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaDiversity {
    name: String,
    sample_ids: Vec<String>,
    values: Vec<f64>,
}

impl AlphaDiversity {
    pub fn from_parts(name: &str, sample_ids: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if sample_ids.len() != values.len() {
            return Err(KmerizerError::ShapeMismatch(format!(
                "alpha vector '{}' has {} values for {} samples",
                name,
                values.len(),
                sample_ids.len()
            )));
        }
        Ok(AlphaDiversity {
            name: name.to_string(),
            sample_ids,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.sample_ids
            .iter()
            .map(|s| s.as_str())
            .zip(self.values.iter().copied())
    }
}

/// A symmetric sample x sample distance matrix with a zero diagonal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceMatrix {
    sample_ids: Vec<String>,
    data: Array2<f64>,
}

impl DistanceMatrix {
    pub fn from_parts(sample_ids: Vec<String>, data: Array2<f64>) -> Result<Self> {
        let n = sample_ids.len();
        if data.dim() != (n, n) {
            return Err(KmerizerError::ShapeMismatch(format!(
                "distance matrix is {:?} for {} samples",
                data.dim(),
                n
            )));
        }
        Ok(DistanceMatrix { sample_ids, data })
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[[i, j]]
    }
}

/// Runs `distance` over every sample pair, on a dedicated pool when the
/// parallelism hint is non-zero.
fn pairwise_distances<F>(
    table: &FeatureTable,
    parallelism: usize,
    distance: F,
) -> Result<DistanceMatrix>
where
    F: Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> f64 + Sync,
{
    let n = table.n_samples();
    let pairs: Vec<(usize, usize)> = (0..n).tuple_combinations().collect();
    let matrix = table.matrix();

    let compute = || -> Vec<(usize, usize, f64)> {
        pairs
            .par_iter()
            .map(|&(i, j)| (i, j, distance(matrix.column(i), matrix.column(j))))
            .collect()
    };
    let distances = if parallelism == 0 {
        compute()
    } else {
        debug!("computing {} sample pairs on {} threads", pairs.len(), parallelism);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .build()
            .map_err(|e| {
                KmerizerError::InvalidParameter(format!(
                    "cannot build a {parallelism}-thread pool: {e}"
                ))
            })?;
        pool.install(compute)
    };

    let mut data = Array2::<f64>::zeros((n, n));
    for (i, j, d) in distances {
        data[[i, j]] = d;
        data[[j, i]] = d;
    }
    DistanceMatrix::from_parts(table.sample_ids().to_vec(), data)
}

/// Number of features observed (count above zero) in each sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservedFeatures;

impl AlphaMetric for ObservedFeatures {
    fn name(&self) -> &str {
        "observed_features"
    }

    fn compute(&self, table: &FeatureTable) -> Result<AlphaDiversity> {
        let values = table
            .matrix()
            .columns()
            .into_iter()
            .map(|col| col.iter().filter(|&&v| v > 0.0).count() as f64)
            .collect();
        AlphaDiversity::from_parts(self.name(), table.sample_ids().to_vec(), values)
    }
}

/// Shannon entropy of each sample's relative feature abundances, in nats.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShannonEntropy;

impl AlphaMetric for ShannonEntropy {
    fn name(&self) -> &str {
        "shannon_entropy"
    }

    fn compute(&self, table: &FeatureTable) -> Result<AlphaDiversity> {
        let values = table
            .matrix()
            .columns()
            .into_iter()
            .map(|col| {
                let total: f64 = col.sum();
                if total <= 0.0 {
                    return 0.0;
                }
                -col.iter()
                    .filter(|&&v| v > 0.0)
                    .map(|&v| {
                        let p = v / total;
                        p * p.ln()
                    })
                    .sum::<f64>()
            })
            .collect();
        AlphaDiversity::from_parts(self.name(), table.sample_ids().to_vec(), values)
    }
}

/// Presence/absence Jaccard distance: one minus shared features over the
/// union of observed features.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaccardDistance;

impl BetaMetric for JaccardDistance {
    fn name(&self) -> &str {
        "jaccard"
    }

    fn compute(&self, table: &FeatureTable, parallelism: usize) -> Result<DistanceMatrix> {
        pairwise_distances(table, parallelism, |u, v| {
            let mut shared = 0usize;
            let mut union = 0usize;
            for (&a, &b) in u.iter().zip(v.iter()) {
                let in_a = a > 0.0;
                let in_b = b > 0.0;
                if in_a || in_b {
                    union += 1;
                    if in_a && in_b {
                        shared += 1;
                    }
                }
            }
            if union == 0 {
                0.0
            } else {
                1.0 - shared as f64 / union as f64
            }
        })
    }
}

/// Bray-Curtis dissimilarity on raw abundances.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrayCurtisDistance;

impl BetaMetric for BrayCurtisDistance {
    fn name(&self) -> &str {
        "braycurtis"
    }

    fn compute(&self, table: &FeatureTable, parallelism: usize) -> Result<DistanceMatrix> {
        pairwise_distances(table, parallelism, |u, v| {
            let mut shared_mass = 0.0;
            let mut total_mass = 0.0;
            for (&a, &b) in u.iter().zip(v.iter()) {
                shared_mass += a.min(b);
                total_mass += a + b;
            }
            if total_mass == 0.0 {
                0.0
            } else {
                1.0 - 2.0 * shared_mass / total_mass
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    fn table() -> FeatureTable {
        FeatureTable::from_parts(
            arr2(&[
                [4.0, 0.0, 1.0],
                [4.0, 0.0, 2.0],
                [4.0, 5.0, 0.0],
                [4.0, 5.0, 0.0],
            ]),
            vec![
                "k1".to_string(),
                "k2".to_string(),
                "k3".to_string(),
                "k4".to_string(),
            ],
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_observed_features() {
        let alpha = ObservedFeatures.compute(&table()).unwrap();
        assert_eq!(alpha.name(), "observed_features");
        assert_eq!(alpha.values(), [4.0, 2.0, 2.0]);
    }

    #[test]
    fn test_shannon_uniform_is_log_richness() {
        let alpha = ShannonEntropy.compute(&table()).unwrap();
        // s1 holds four equal counts, s2 two equal counts.
        assert_relative_eq!(alpha.values()[0], 4.0_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(alpha.values()[1], 2.0_f64.ln(), epsilon = 1e-12);
        // s3: p = [1/3, 2/3].
        let expected = -(1.0 / 3.0 * (1.0_f64 / 3.0).ln() + 2.0 / 3.0 * (2.0_f64 / 3.0).ln());
        assert_relative_eq!(alpha.values()[2], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_shannon_empty_sample_is_zero() {
        let table = FeatureTable::from_parts(
            arr2(&[[0.0], [0.0]]),
            vec!["k1".to_string(), "k2".to_string()],
            vec!["s1".to_string()],
        )
        .unwrap();
        let alpha = ShannonEntropy.compute(&table).unwrap();
        assert_eq!(alpha.values(), [0.0]);
    }

    #[test]
    fn test_jaccard_distances() {
        let dm = JaccardDistance.compute(&table(), 0).unwrap();
        assert_eq!(dm.n_samples(), 3);
        assert_eq!(dm.get(0, 0), 0.0);
        assert_relative_eq!(dm.get(0, 1), dm.get(1, 0), epsilon = 1e-15);
        // s1 observes all four features, s2 only k3 and k4.
        assert_relative_eq!(dm.get(0, 1), 1.0 - 2.0 / 4.0, epsilon = 1e-12);
        // s2 and s3 observe disjoint feature sets.
        assert_relative_eq!(dm.get(1, 2), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bray_curtis_distances() {
        let dm = BrayCurtisDistance.compute(&table(), 0).unwrap();
        // s2 vs s3: no shared mass at all.
        assert_relative_eq!(dm.get(1, 2), 1.0, epsilon = 1e-12);
        // s1 vs s2: shared mass 8 of total 26.
        assert_relative_eq!(dm.get(0, 1), 1.0 - 16.0 / 26.0, epsilon = 1e-12);
        assert_eq!(dm.get(2, 2), 0.0);
    }

    #[test]
    fn test_identical_samples_are_at_distance_zero() {
        let table = FeatureTable::from_parts(
            arr2(&[[3.0, 3.0], [1.0, 1.0]]),
            vec!["k1".to_string(), "k2".to_string()],
            vec!["s1".to_string(), "s2".to_string()],
        )
        .unwrap();
        let jaccard = JaccardDistance.compute(&table, 0).unwrap();
        let bray = BrayCurtisDistance.compute(&table, 0).unwrap();
        assert_eq!(jaccard.get(0, 1), 0.0);
        assert_eq!(bray.get(0, 1), 0.0);
    }

    #[test]
    fn test_parallelism_hint_does_not_change_results() {
        let serial = BrayCurtisDistance.compute(&table(), 0).unwrap();
        let threaded = BrayCurtisDistance.compute(&table(), 2).unwrap();
        assert_eq!(serial.matrix(), threaded.matrix());
    }
}
