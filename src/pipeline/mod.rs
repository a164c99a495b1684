//! The core-metrics pipeline and the collaborator seams it runs on.
//!
//! Every external operation the pipeline chains together (rarefaction,
//! alpha and beta diversity, ordination, plotting) sits behind a trait, and
//! concrete implementations are injected when the pipeline is constructed.
//! The defaults live in their own modules; tests swap in stand-ins.

pub mod core_metrics;

pub use core_metrics::{Artifact, CoreMetrics, CoreMetricsParams, NamedArtifact};

use crate::diversity::{AlphaDiversity, DistanceMatrix};
use crate::error::Result;
use crate::metadata::SampleMetadata;
use crate::ordination::OrdinationResult;
use crate::table::FeatureTable;
use crate::visualization::ScatterPlot;

/// Subsamples a table so every sample reaches a common depth.
pub trait Rarefier {
    fn rarefy(
        &self,
        table: &FeatureTable,
        depth: u64,
        with_replacement: bool,
    ) -> Result<FeatureTable>;
}

/// Reduces each sample of a table to one diversity number.
pub trait AlphaMetric {
    /// Column name the resulting vector merges under.
    fn name(&self) -> &str;
    fn compute(&self, table: &FeatureTable) -> Result<AlphaDiversity>;
}

/// Computes pairwise sample distances; `parallelism` is a thread-count hint
/// forwarded unchanged, zero meaning the implementation's default.
pub trait BetaMetric {
    fn name(&self) -> &str;
    fn compute(&self, table: &FeatureTable, parallelism: usize) -> Result<DistanceMatrix>;
}

/// Embeds a distance matrix into coordinate axes ranked by explained
/// variance.
pub trait OrdinationMethod {
    fn compute(&self, distances: &DistanceMatrix) -> Result<OrdinationResult>;
}

/// Renders merged metadata as a two-dimensional scatter plot.
pub trait ScatterPlotter {
    fn plot(&self, metadata: &SampleMetadata, color_by: Option<&str>) -> Result<ScatterPlot>;
}
