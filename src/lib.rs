//! kmerizer: k-mer frequency tables and diversity analysis for biological
//! sequences.
//!
//! The crate exposes two entry points. [`build_kmer_table`] turns a set of
//! sequences plus a sequence x sample abundance table into a k-mer x sample
//! frequency table, with optional TF-IDF weighting and document-frequency
//! pruning of the vocabulary. [`CoreMetrics`] chains that conversion into a
//! fixed diversity pipeline: rarefaction, alpha and beta diversity,
//! principal coordinates, and a scatter plot, returning every intermediate
//! artifact.

pub mod diversity;
pub mod error;
pub mod io;
pub mod kmerize;
pub mod kmers;
pub mod metadata;
pub mod ordination;
pub mod pipeline;
pub mod rarefaction;
pub mod sequences;
pub mod table;
pub mod vectorize;
pub mod visualization;

pub use error::{KmerizerError, Result};
pub use kmerize::build_kmer_table;
pub use pipeline::{Artifact, CoreMetrics, CoreMetricsParams, NamedArtifact};
pub use sequences::SequenceSet;
pub use table::FeatureTable;
pub use vectorize::{DocFrequency, KmerParams, ScoringMode};
