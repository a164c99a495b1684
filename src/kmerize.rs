//! K-mer frequency table construction.
//!
//! Aligns a sequence set against an abundance table, scores each surviving
//! sequence over a shared k-mer vocabulary, and propagates the scores through
//! per-sample abundances. The result is a k-mer x sample table in the same
//! observations-as-rows orientation as the input.

use log::{debug, info};
use ndarray::Array2;

use crate::error::{KmerizerError, Result};
use crate::sequences::SequenceSet;
use crate::table::FeatureTable;
use crate::vectorize::{KmerParams, KmerVectorizer};

/// Builds a k-mer x sample frequency table.
///
/// Only sequence identifiers present both in `sequences` and as feature rows
/// of `abundance` participate, in the table's row order. A sample's score for
/// a k-mer is the abundance-weighted sum of that k-mer's per-sequence scores.
///
/// # Errors
///
/// Returns [`KmerizerError::NoOverlap`] when no identifier is shared, before
/// any k-mer extraction happens, and [`KmerizerError::InvalidParameter`] for
/// out-of-range scoring parameters.
pub fn build_kmer_table(
    sequences: &SequenceSet,
    abundance: &FeatureTable,
    params: &KmerParams,
) -> Result<FeatureTable> {
    let mut kept_ids: Vec<String> = Vec::new();
    let mut docs: Vec<&str> = Vec::new();
    for id in abundance.feature_ids() {
        if let Some(seq) = sequences.get(id) {
            kept_ids.push(id.clone());
            docs.push(seq);
        }
    }
    if kept_ids.is_empty() {
        return Err(KmerizerError::NoOverlap);
    }
    if kept_ids.len() < abundance.n_features() {
        debug!(
            "{} of {} abundance features have no sequence and were dropped",
            abundance.n_features() - kept_ids.len(),
            abundance.n_features()
        );
    }

    let vectorized = KmerVectorizer::new(params).fit_transform(&docs)?;
    let aligned = abundance.select_features(&kept_ids)?;

    // Propagate: output[j, s] = sum_i scores[i, j] * abundance[i, s].
    let n_samples = aligned.n_samples();
    let mut data = Array2::<f64>::zeros((vectorized.vocabulary.len(), n_samples));
    let abundance_rows = aligned.matrix();
    for (i, scores_row) in vectorized.scores.outer_iterator().enumerate() {
        let sample_row = abundance_rows.row(i);
        for (j, &score) in scores_row.iter() {
            data.row_mut(j).scaled_add(score, &sample_row);
        }
    }

    info!(
        "built k-mer table: {} k-mers x {} samples from {} aligned sequences",
        vectorized.vocabulary.len(),
        n_samples,
        kept_ids.len()
    );
    FeatureTable::from_parts(data, vectorized.vocabulary, aligned.sample_ids().to_vec())
}
