//! Feature table representation.
//!
//! A feature table stores a dense numeric matrix with features as rows and
//! samples as columns, the observations-as-rows convention shared by the
//! abundance input and the k-mer output. Identifier lookup maps are kept
//! alongside the matrix for constant-time row/column access.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{KmerizerError, Result};

/// Dense feature x sample matrix with identifier bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTable {
    data: Array2<f64>,
    feature_ids: Vec<String>,
    feature_map: HashMap<String, usize>,
    sample_ids: Vec<String>,
    sample_map: HashMap<String, usize>,
}

impl FeatureTable {
    /// Builds a table from a matrix and its row/column identifiers.
    ///
    /// Fails if the matrix shape disagrees with the identifier counts or if
    /// any identifier repeats.
    pub fn from_parts(
        data: Array2<f64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_features, n_samples) = data.dim();
        if n_features != feature_ids.len() {
            return Err(KmerizerError::ShapeMismatch(format!(
                "{} matrix rows vs {} feature IDs",
                n_features,
                feature_ids.len()
            )));
        }
        if n_samples != sample_ids.len() {
            return Err(KmerizerError::ShapeMismatch(format!(
                "{} matrix columns vs {} sample IDs",
                n_samples,
                sample_ids.len()
            )));
        }

        let feature_map = build_index(&feature_ids)?;
        let sample_map = build_index(&sample_ids)?;

        Ok(FeatureTable {
            data,
            feature_ids,
            feature_map,
            sample_ids,
            sample_map,
        })
    }

    /// Returns the dimensions of the table (features, samples).
    pub fn dimensions(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Returns a reference to the underlying matrix.
    pub fn matrix(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Row index of a feature identifier, if present.
    pub fn feature_index(&self, id: &str) -> Option<usize> {
        self.feature_map.get(id).copied()
    }

    /// Column index of a sample identifier, if present.
    pub fn sample_index(&self, id: &str) -> Option<usize> {
        self.sample_map.get(id).copied()
    }

    /// Retrieves the values for a specific feature across samples.
    pub fn feature_row(&self, id: &str) -> Option<ArrayView1<'_, f64>> {
        self.feature_index(id).map(|idx| self.data.row(idx))
    }

    /// Retrieves the values for a specific sample across features.
    pub fn sample_column(&self, id: &str) -> Option<ArrayView1<'_, f64>> {
        self.sample_index(id).map(|idx| self.data.column(idx))
    }

    /// Per-sample totals (column sums), in sample order.
    pub fn sample_totals(&self) -> Array1<f64> {
        self.data.sum_axis(Axis(0))
    }

    /// Builds a new table keeping only the named features, in the given order.
    ///
    /// Fails on identifiers absent from the table.
    pub fn select_features(&self, ids: &[String]) -> Result<Self> {
        let mut indices = Vec::with_capacity(ids.len());
        for id in ids {
            let idx = self
                .feature_index(id)
                .ok_or_else(|| KmerizerError::UnknownFeature(id.clone()))?;
            indices.push(idx);
        }
        let data = self.data.select(Axis(0), &indices);
        FeatureTable::from_parts(data, ids.to_vec(), self.sample_ids.clone())
    }
}

fn build_index(ids: &[String]) -> Result<HashMap<String, usize>> {
    let mut map = HashMap::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        if map.insert(id.clone(), i).is_some() {
            return Err(KmerizerError::DuplicateId(id.clone()));
        }
    }
    Ok(map)
}
