//! Vocabulary construction and sequence scoring.
//!
//! Turns a list of sequences into a sparse sequence x k-mer score matrix.
//! The vocabulary is pruned by document frequency (how many sequences carry a
//! k-mer), optionally capped to the highest-scoring k-mers, and always held
//! in lexicographic order so repeated runs produce identical tables.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{KmerizerError, Result};
use crate::kmers::KmerCounter;

/// How vocabulary entries are scored per sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringMode {
    /// Raw occurrence counts.
    Count,
    /// Term-frequency x smoothed inverse-document-frequency, L2-normalized
    /// per sequence.
    Tfidf,
}

/// A document-frequency threshold: either an absolute number of sequences or
/// a proportion of the sequence count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DocFrequency {
    AbsoluteCount(usize),
    Proportion(f64),
}

impl DocFrequency {
    /// Resolves the lower bound to an absolute sequence count.
    ///
    /// A proportion >= 1.0 is reinterpreted as an absolute count: a literal
    /// proportion of 1.0 would demand presence in every sequence and empty
    /// the vocabulary for almost any real input.
    pub fn resolve_min(&self, n_docs: usize) -> Result<usize> {
        match *self {
            DocFrequency::AbsoluteCount(c) => {
                if c == 0 {
                    return Err(KmerizerError::InvalidParameter(
                        "min_doc_freq absolute count must be at least 1".to_string(),
                    ));
                }
                Ok(c)
            }
            DocFrequency::Proportion(p) => {
                if !p.is_finite() || p < 0.0 {
                    return Err(KmerizerError::InvalidParameter(format!(
                        "min_doc_freq proportion must be a non-negative finite number, got {p}"
                    )));
                }
                if p >= 1.0 {
                    Ok(p.trunc() as usize)
                } else {
                    Ok((p * n_docs as f64).ceil() as usize)
                }
            }
        }
    }

    /// Resolves the upper bound to an absolute sequence count.
    pub fn resolve_max(&self, n_docs: usize) -> Result<usize> {
        match *self {
            DocFrequency::AbsoluteCount(c) => {
                if c == 0 {
                    return Err(KmerizerError::InvalidParameter(
                        "max_doc_freq absolute count must be at least 1".to_string(),
                    ));
                }
                Ok(c)
            }
            DocFrequency::Proportion(p) => {
                if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                    return Err(KmerizerError::InvalidParameter(format!(
                        "max_doc_freq proportion must lie in [0, 1], got {p}"
                    )));
                }
                Ok((p * n_docs as f64).floor() as usize)
            }
        }
    }
}

impl FromStr for DocFrequency {
    type Err = String;

    /// Boundary-layer parse: a bare integer is an absolute count, anything
    /// with a decimal point or exponent is a proportion.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let looks_fractional = s.contains(['.', 'e', 'E']);
        if looks_fractional {
            let p: f64 = s
                .parse()
                .map_err(|_| format!("'{s}' is not a valid document frequency"))?;
            if !p.is_finite() || p < 0.0 {
                return Err(format!("document frequency must be non-negative, got '{s}'"));
            }
            Ok(DocFrequency::Proportion(p))
        } else {
            let c: usize = s
                .parse()
                .map_err(|_| format!("'{s}' is not a valid document frequency"))?;
            Ok(DocFrequency::AbsoluteCount(c))
        }
    }
}

/// Scoring and pruning parameters for the k-mer table builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmerParams {
    pub kmer_size: usize,
    pub scoring: ScoringMode,
    pub min_doc_freq: DocFrequency,
    pub max_doc_freq: DocFrequency,
    pub max_vocab_size: Option<usize>,
}

impl Default for KmerParams {
    fn default() -> Self {
        KmerParams {
            kmer_size: 16,
            scoring: ScoringMode::Count,
            min_doc_freq: DocFrequency::AbsoluteCount(1),
            max_doc_freq: DocFrequency::Proportion(1.0),
            max_vocab_size: None,
        }
    }
}

impl KmerParams {
    /// Re-checks the ranges the boundary layer should already have enforced.
    pub fn validate(&self) -> Result<()> {
        if self.kmer_size == 0 {
            return Err(KmerizerError::InvalidParameter(
                "kmer_size must be a positive integer".to_string(),
            ));
        }
        if self.max_vocab_size == Some(0) {
            return Err(KmerizerError::InvalidParameter(
                "max_vocab_size must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// The fitted vocabulary and per-sequence score matrix.
pub struct Vectorized {
    /// K-mer strings in lexicographic order; one column of `scores` each.
    pub vocabulary: Vec<String>,
    /// Sparse sequence x vocabulary scores (rows follow the input order).
    pub scores: CsMat<f64>,
}

/// Builds score matrices over a fixed-length k-mer vocabulary.
pub struct KmerVectorizer<'p> {
    params: &'p KmerParams,
}

impl<'p> KmerVectorizer<'p> {
    pub fn new(params: &'p KmerParams) -> Self {
        KmerVectorizer { params }
    }

    /// Extracts k-mers from every sequence, prunes the vocabulary, and
    /// scores each sequence against it.
    pub fn fit_transform(&self, docs: &[&str]) -> Result<Vectorized> {
        self.params.validate()?;

        let n_docs = docs.len();
        let min_count = self.params.min_doc_freq.resolve_min(n_docs)?;
        let max_count = self.params.max_doc_freq.resolve_max(n_docs)?;

        let counter = KmerCounter::new(self.params.kmer_size);
        let doc_counts: Vec<HashMap<&str, u32>> =
            docs.iter().map(|d| counter.count(d)).collect();

        // Document frequency and corpus-wide totals per k-mer.
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut total_freq: HashMap<&str, u64> = HashMap::new();
        for counts in &doc_counts {
            for (&kmer, &count) in counts {
                *doc_freq.entry(kmer).or_insert(0) += 1;
                *total_freq.entry(kmer).or_insert(0) += u64::from(count);
            }
        }
        debug!(
            "extracted {} distinct {}-mers from {} sequences",
            doc_freq.len(),
            self.params.kmer_size,
            n_docs
        );

        let mut vocabulary: Vec<&str> = doc_freq
            .iter()
            .filter(|(_, &df)| df >= min_count && df <= max_count)
            .map(|(&kmer, _)| kmer)
            .collect();
        vocabulary.sort_unstable();

        if let Some(cap) = self.params.max_vocab_size {
            if vocabulary.len() > cap {
                vocabulary = self.truncate_vocabulary(vocabulary, &doc_freq, &total_freq, n_docs, cap);
            }
        }

        if vocabulary.is_empty() {
            warn!(
                "vocabulary is empty after document-frequency pruning ({} distinct k-mers seen)",
                doc_freq.len()
            );
        }

        let scores = self.score_matrix(&doc_counts, &vocabulary, &doc_freq, n_docs);
        Ok(Vectorized {
            vocabulary: vocabulary.into_iter().map(String::from).collect(),
            scores,
        })
    }

    /// Keeps the `cap` highest-ranked k-mers, ties to the lexicographically
    /// smaller string, then restores lexicographic order.
    fn truncate_vocabulary<'a>(
        &self,
        vocabulary: Vec<&'a str>,
        doc_freq: &HashMap<&str, usize>,
        total_freq: &HashMap<&str, u64>,
        n_docs: usize,
        cap: usize,
    ) -> Vec<&'a str> {
        let mut ranked: Vec<(&str, f64)> = vocabulary
            .into_iter()
            .map(|kmer| {
                let total = total_freq.get(kmer).copied().unwrap_or(0) as f64;
                let score = match self.params.scoring {
                    ScoringMode::Count => total,
                    ScoringMode::Tfidf => {
                        let df = doc_freq.get(kmer).copied().unwrap_or(0);
                        total * smoothed_idf(df, n_docs)
                    }
                };
                (kmer, score)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked.truncate(cap);

        let mut kept: Vec<&str> = ranked.into_iter().map(|(kmer, _)| kmer).collect();
        kept.sort_unstable();
        kept
    }

    fn score_matrix(
        &self,
        doc_counts: &[HashMap<&str, u32>],
        vocabulary: &[&str],
        doc_freq: &HashMap<&str, usize>,
        n_docs: usize,
    ) -> CsMat<f64> {
        let column: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(j, &kmer)| (kmer, j))
            .collect();

        let mut triplets = TriMat::new((doc_counts.len(), vocabulary.len()));
        for (i, counts) in doc_counts.iter().enumerate() {
            let mut row: Vec<(usize, f64)> = counts
                .iter()
                .filter_map(|(&kmer, &count)| {
                    column.get(kmer).map(|&j| {
                        let value = match self.params.scoring {
                            ScoringMode::Count => f64::from(count),
                            ScoringMode::Tfidf => {
                                let df = doc_freq.get(kmer).copied().unwrap_or(0);
                                f64::from(count) * smoothed_idf(df, n_docs)
                            }
                        };
                        (j, value)
                    })
                })
                .collect();

            if self.params.scoring == ScoringMode::Tfidf {
                let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for (_, v) in row.iter_mut() {
                        *v /= norm;
                    }
                }
            }

            row.sort_unstable_by_key(|&(j, _)| j);
            for (j, value) in row {
                triplets.add_triplet(i, j, value);
            }
        }
        triplets.to_csr()
    }
}

/// Smoothed inverse document frequency: add-one on both the document count
/// and the document frequency, plus one on the log term.
fn smoothed_idf(df: usize, n_docs: usize) -> f64 {
    ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(k: usize) -> KmerParams {
        KmerParams {
            kmer_size: k,
            ..KmerParams::default()
        }
    }

    fn dense(scores: &CsMat<f64>) -> Vec<Vec<f64>> {
        let (rows, cols) = scores.shape();
        let mut out = vec![vec![0.0; cols]; rows];
        for (row, vec) in scores.outer_iterator().enumerate() {
            for (col, &v) in vec.iter() {
                out[row][col] = v;
            }
        }
        out
    }

    #[test]
    fn test_count_mode_vocabulary_and_counts() {
        let p = params(2);
        let out = KmerVectorizer::new(&p)
            .fit_transform(&["ABAB", "BA"])
            .unwrap();

        // "ABAB" -> AB x2, BA x1; "BA" -> BA x1.
        assert_eq!(out.vocabulary, vec!["AB".to_string(), "BA".to_string()]);
        assert_eq!(dense(&out.scores), vec![vec![2.0, 1.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_min_doc_freq_absolute_prunes_unshared() {
        let mut p = params(2);
        p.min_doc_freq = DocFrequency::AbsoluteCount(2);
        let out = KmerVectorizer::new(&p)
            .fit_transform(&["ABC", "ABD"])
            .unwrap();

        // Only "AB" appears in both sequences.
        assert_eq!(out.vocabulary, vec!["AB".to_string()]);
        assert_eq!(dense(&out.scores), vec![vec![1.0], vec![1.0]]);
    }

    #[test]
    fn test_max_doc_freq_proportion_drops_ubiquitous() {
        let mut p = params(2);
        p.max_doc_freq = DocFrequency::Proportion(0.5);
        let out = KmerVectorizer::new(&p)
            .fit_transform(&["ABC", "ABD"])
            .unwrap();

        // "AB" sits in 2/2 sequences, above the 50% ceiling.
        assert_eq!(out.vocabulary, vec!["BC".to_string(), "BD".to_string()]);
    }

    #[test]
    fn test_min_doc_freq_proportion_one_is_absolute_one() {
        let mut p = params(2);
        p.min_doc_freq = DocFrequency::Proportion(1.0);
        let out = KmerVectorizer::new(&p)
            .fit_transform(&["ABC", "XYZ"])
            .unwrap();

        // Treated as "at least one sequence", not "every sequence".
        assert_eq!(out.vocabulary.len(), 4);
    }

    #[test]
    fn test_empty_vocabulary_after_pruning_is_not_an_error() {
        let mut p = params(2);
        p.min_doc_freq = DocFrequency::AbsoluteCount(5);
        let out = KmerVectorizer::new(&p)
            .fit_transform(&["ABC", "ABD"])
            .unwrap();

        assert!(out.vocabulary.is_empty());
        assert_eq!(out.scores.shape(), (2, 0));

        // Bounds that cross after resolution admit no document frequency at
        // all; that is an empty vocabulary, not a parameter error.
        let mut p = params(2);
        p.min_doc_freq = DocFrequency::AbsoluteCount(3);
        p.max_doc_freq = DocFrequency::AbsoluteCount(2);
        let out = KmerVectorizer::new(&p)
            .fit_transform(&["ABC", "ABD"])
            .unwrap();

        assert!(out.vocabulary.is_empty());
        assert_eq!(out.scores.shape(), (2, 0));
    }

    #[test]
    fn test_max_vocab_size_top_n_with_lexicographic_ties() {
        let mut p = params(1);
        p.max_vocab_size = Some(2);
        // Totals: A x3, B x2, C x2. A ranks first; B and C tie and the
        // lexicographically smaller B takes the last slot.
        let out = KmerVectorizer::new(&p)
            .fit_transform(&["AAB", "CCB", "A"])
            .unwrap();

        assert_eq!(out.vocabulary, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut p = params(2);
        p.min_doc_freq = DocFrequency::AbsoluteCount(0);
        assert!(matches!(
            KmerVectorizer::new(&p).fit_transform(&["AB"]),
            Err(KmerizerError::InvalidParameter(_))
        ));

        let mut p = params(2);
        p.max_doc_freq = DocFrequency::Proportion(1.5);
        assert!(KmerVectorizer::new(&p).fit_transform(&["AB"]).is_err());

        let mut p = params(2);
        p.min_doc_freq = DocFrequency::Proportion(f64::NAN);
        assert!(KmerVectorizer::new(&p).fit_transform(&["AB"]).is_err());
    }

    #[test]
    fn test_zero_kmer_size_rejected() {
        let p = params(0);
        assert!(matches!(
            KmerVectorizer::new(&p).fit_transform(&["ACGT"]),
            Err(KmerizerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_tfidf_uniform_idf_reduces_to_unit_rows() {
        let mut p = params(7);
        p.scoring = ScoringMode::Tfidf;
        // No shared 7-mers between the two sequences, so every IDF weight is
        // identical and normalization leaves 1/sqrt(14) everywhere.
        let out = KmerVectorizer::new(&p)
            .fit_transform(&["TACGGGAGGGTGCAAGCGTT", "TACGAGAAGGGTTAGCGTTA"])
            .unwrap();

        assert_eq!(out.vocabulary.len(), 28);
        let expected = 1.0 / 14.0_f64.sqrt();
        let rows = dense(&out.scores);
        for row in &rows {
            for &v in row.iter().filter(|&&v| v != 0.0) {
                assert_relative_eq!(v, expected, epsilon = 1e-9);
            }
            assert_eq!(row.iter().filter(|&&v| v != 0.0).count(), 14);
        }
    }

    #[test]
    fn test_tfidf_weighting_and_normalization() {
        let mut p = params(2);
        p.scoring = ScoringMode::Tfidf;
        // "abcd" -> ab, bc, cd; "abef" -> ab, be, ef. Only "ab" is shared.
        let out = KmerVectorizer::new(&p)
            .fit_transform(&["abcd", "abef"])
            .unwrap();

        assert_eq!(
            out.vocabulary,
            vec!["ab", "bc", "be", "cd", "ef"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );

        let idf_shared = (3.0_f64 / 3.0).ln() + 1.0;
        let idf_unique = (3.0_f64 / 2.0).ln() + 1.0;
        let norm = (idf_shared.powi(2) + 2.0 * idf_unique.powi(2)).sqrt();

        let rows = dense(&out.scores);
        assert_relative_eq!(rows[0][0], idf_shared / norm, epsilon = 1e-12);
        assert_relative_eq!(rows[0][1], idf_unique / norm, epsilon = 1e-12);
        assert_relative_eq!(rows[0][3], idf_unique / norm, epsilon = 1e-12);
        assert_relative_eq!(rows[1][0], idf_shared / norm, epsilon = 1e-12);
        assert_relative_eq!(rows[1][2], idf_unique / norm, epsilon = 1e-12);
        // Each row is unit length.
        for row in &rows {
            let len: f64 = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert_relative_eq!(len, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_short_sequences_contribute_nothing() {
        let p = params(4);
        let out = KmerVectorizer::new(&p)
            .fit_transform(&["ACG", "ACGT"])
            .unwrap();

        assert_eq!(out.vocabulary, vec!["ACGT".to_string()]);
        assert_eq!(dense(&out.scores), vec![vec![0.0], vec![1.0]]);
    }

    #[test]
    fn test_doc_frequency_from_str() {
        assert_eq!(
            "3".parse::<DocFrequency>().unwrap(),
            DocFrequency::AbsoluteCount(3)
        );
        assert_eq!(
            "0.25".parse::<DocFrequency>().unwrap(),
            DocFrequency::Proportion(0.25)
        );
        assert_eq!(
            "1.0".parse::<DocFrequency>().unwrap(),
            DocFrequency::Proportion(1.0)
        );
        assert!("abc".parse::<DocFrequency>().is_err());
        assert!("-0.5".parse::<DocFrequency>().is_err());
    }
}
