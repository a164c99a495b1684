//! Principal coordinates analysis of distance matrices.
//!
//! Classical PCoA: square the distances, double-center (Gower), take the
//! symmetric eigendecomposition, and scale eigenvectors by the square root
//! of their eigenvalues. Axes are ordered by descending eigenvalue and
//! negative eigenvalues are clamped to zero before scaling.

use log::debug;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::diversity::DistanceMatrix;
use crate::error::{KmerizerError, Result};
use crate::pipeline::OrdinationMethod;

/// Coordinates and variance proportions from one ordination run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinationResult {
    sample_ids: Vec<String>,
    /// Sample x axis coordinates, axes in descending-eigenvalue order.
    coordinates: Array2<f64>,
    /// Eigenvalues after clamping negatives to zero, one per axis.
    eigenvalues: Vec<f64>,
    /// Fraction of total positive eigenvalue mass per axis.
    proportion_explained: Vec<f64>,
}

impl OrdinationResult {
    pub fn from_parts(
        sample_ids: Vec<String>,
        coordinates: Array2<f64>,
        eigenvalues: Vec<f64>,
        proportion_explained: Vec<f64>,
    ) -> Result<Self> {
        let (rows, axes) = coordinates.dim();
        if rows != sample_ids.len()
            || eigenvalues.len() != axes
            || proportion_explained.len() != axes
        {
            return Err(KmerizerError::ShapeMismatch(format!(
                "ordination with {} samples has coordinates {:?}, {} eigenvalues, {} proportions",
                sample_ids.len(),
                coordinates.dim(),
                eigenvalues.len(),
                proportion_explained.len()
            )));
        }
        Ok(OrdinationResult {
            sample_ids,
            coordinates,
            eigenvalues,
            proportion_explained,
        })
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn coordinates(&self) -> &Array2<f64> {
        &self.coordinates
    }

    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    pub fn proportion_explained(&self) -> &[f64] {
        &self.proportion_explained
    }

    pub fn n_axes(&self) -> usize {
        self.coordinates.ncols()
    }
}

/// Default ordination collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrincipalCoordinates;

impl OrdinationMethod for PrincipalCoordinates {
    fn compute(&self, distances: &DistanceMatrix) -> Result<OrdinationResult> {
        let n = distances.n_samples();
        if n == 0 {
            return Err(KmerizerError::ShapeMismatch(
                "cannot ordinate an empty distance matrix".to_string(),
            ));
        }

        // Gower-centered matrix B = -0.5 * J D^2 J.
        let squared = distances.matrix().mapv(|d| d * d);
        let row_means = squared.mean_axis(ndarray::Axis(1));
        let grand_mean = squared.mean();
        let (row_means, grand_mean) = match (row_means, grand_mean) {
            (Some(r), Some(g)) => (r, g),
            _ => {
                return Err(KmerizerError::ShapeMismatch(
                    "cannot ordinate an empty distance matrix".to_string(),
                ))
            }
        };
        let centered = DMatrix::<f64>::from_fn(n, n, |i, j| {
            -0.5 * (squared[[i, j]] - row_means[i] - row_means[j] + grand_mean)
        });

        let eigen = SymmetricEigen::new(centered);
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let positive_total: f64 = eigen.eigenvalues.iter().map(|&l| l.max(0.0)).sum();
        let mut coordinates = Array2::<f64>::zeros((n, n));
        let mut eigenvalues = Vec::with_capacity(n);
        let mut proportion_explained = Vec::with_capacity(n);
        for (axis, &source) in order.iter().enumerate() {
            let lambda = eigen.eigenvalues[source].max(0.0);
            let scale = lambda.sqrt();
            for i in 0..n {
                coordinates[[i, axis]] = eigen.eigenvectors[(i, source)] * scale;
            }
            eigenvalues.push(lambda);
            proportion_explained.push(if positive_total > 0.0 {
                lambda / positive_total
            } else {
                0.0
            });
        }
        debug!(
            "pcoa over {} samples: leading axis explains {:.1}%",
            n,
            proportion_explained.first().copied().unwrap_or(0.0) * 100.0
        );

        OrdinationResult::from_parts(
            distances.sample_ids().to_vec(),
            coordinates,
            eigenvalues,
            proportion_explained,
        )
    }
}
