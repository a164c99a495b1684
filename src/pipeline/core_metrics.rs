//! The core-metrics pipeline: rarefy, kmerize, diversity, ordination, plot.
//!
//! A strictly linear chain with no retries: each step consumes the previous
//! step's output and any failure aborts the whole run with that step's
//! error. Every intermediate result is kept and returned as a named
//! artifact, so callers can persist or inspect the full trail.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::diversity::{
    AlphaDiversity, BrayCurtisDistance, DistanceMatrix, JaccardDistance, ObservedFeatures,
    ShannonEntropy,
};
use crate::error::Result;
use crate::kmerize::build_kmer_table;
use crate::metadata::SampleMetadata;
use crate::ordination::{OrdinationResult, PrincipalCoordinates};
use crate::pipeline::{AlphaMetric, BetaMetric, OrdinationMethod, Rarefier, ScatterPlotter};
use crate::rarefaction::TableRarefier;
use crate::sequences::SequenceSet;
use crate::table::FeatureTable;
use crate::vectorize::KmerParams;
use crate::visualization::{ScatterPlot, SvgScatterPlotter};

/// Parameters for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreMetricsParams {
    /// Total observations to subsample every sample down to.
    pub sampling_depth: u64,
    pub kmer_params: KmerParams,
    pub with_replacement: bool,
    /// Thread-count hint for the beta-diversity steps, zero for the default.
    pub parallelism: usize,
    /// Leading ordination axes to merge into the metadata.
    pub pc_dimensions: usize,
    /// Categorical metadata column used to color the scatter plot.
    pub color_by: Option<String>,
}

impl CoreMetricsParams {
    pub fn new(sampling_depth: u64) -> Self {
        CoreMetricsParams {
            sampling_depth,
            kmer_params: KmerParams::default(),
            with_replacement: false,
            parallelism: 0,
            pc_dimensions: 3,
            color_by: None,
        }
    }
}

/// One intermediate or final pipeline result.
#[derive(Debug, Clone)]
pub enum Artifact {
    Table(FeatureTable),
    AlphaVector(AlphaDiversity),
    DistanceMatrix(DistanceMatrix),
    Ordination(OrdinationResult),
    Plot(ScatterPlot),
}

impl Artifact {
    pub fn as_table(&self) -> Option<&FeatureTable> {
        match self {
            Artifact::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_alpha(&self) -> Option<&AlphaDiversity> {
        match self {
            Artifact::AlphaVector(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_distance_matrix(&self) -> Option<&DistanceMatrix> {
        match self {
            Artifact::DistanceMatrix(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_ordination(&self) -> Option<&OrdinationResult> {
        match self {
            Artifact::Ordination(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_plot(&self) -> Option<&ScatterPlot> {
        match self {
            Artifact::Plot(p) => Some(p),
            _ => None,
        }
    }
}

/// An artifact under its fixed position name in the pipeline's output.
#[derive(Debug, Clone)]
pub struct NamedArtifact {
    pub name: &'static str,
    pub artifact: Artifact,
}

impl NamedArtifact {
    fn new(name: &'static str, artifact: Artifact) -> Self {
        NamedArtifact { name, artifact }
    }
}

/// The pipeline with its injected collaborators.
pub struct CoreMetrics {
    rarefier: Box<dyn Rarefier>,
    observed_features: Box<dyn AlphaMetric>,
    shannon: Box<dyn AlphaMetric>,
    jaccard: Box<dyn BetaMetric>,
    bray_curtis: Box<dyn BetaMetric>,
    ordination: Box<dyn OrdinationMethod>,
    plotter: Box<dyn ScatterPlotter>,
}

impl CoreMetrics {
    /// Pipeline over the default collaborators, with OS-seeded rarefaction.
    pub fn new() -> Self {
        CoreMetrics {
            rarefier: Box::new(TableRarefier::new()),
            observed_features: Box::new(ObservedFeatures),
            shannon: Box::new(ShannonEntropy),
            jaccard: Box::new(JaccardDistance),
            bray_curtis: Box::new(BrayCurtisDistance),
            ordination: Box::new(PrincipalCoordinates),
            plotter: Box::new(SvgScatterPlotter::new()),
        }
    }

    /// Default collaborators with reproducible rarefaction.
    pub fn with_seed(seed: u64) -> Self {
        CoreMetrics {
            rarefier: Box::new(TableRarefier::with_seed(seed)),
            ..CoreMetrics::new()
        }
    }

    /// Full collaborator injection.
    #[allow(clippy::too_many_arguments)]
    pub fn with_collaborators(
        rarefier: Box<dyn Rarefier>,
        observed_features: Box<dyn AlphaMetric>,
        shannon: Box<dyn AlphaMetric>,
        jaccard: Box<dyn BetaMetric>,
        bray_curtis: Box<dyn BetaMetric>,
        ordination: Box<dyn OrdinationMethod>,
        plotter: Box<dyn ScatterPlotter>,
    ) -> Self {
        CoreMetrics {
            rarefier,
            observed_features,
            shannon,
            jaccard,
            bray_curtis,
            ordination,
            plotter,
        }
    }

    /// Runs the fixed pipeline and returns its nine artifacts in order:
    /// rarefied table, k-mer table, two alpha vectors, two distance
    /// matrices, two ordination results, scatter plot.
    pub fn run(
        &self,
        sequences: &SequenceSet,
        abundance: &FeatureTable,
        metadata: &SampleMetadata,
        params: &CoreMetricsParams,
    ) -> Result<Vec<NamedArtifact>> {
        info!(
            "core metrics: {} sequences, {} samples, depth {}",
            sequences.len(),
            abundance.n_samples(),
            params.sampling_depth
        );

        let rarefied =
            self.rarefier
                .rarefy(abundance, params.sampling_depth, params.with_replacement)?;
        let kmer_table = build_kmer_table(sequences, &rarefied, &params.kmer_params)?;

        let mut working = metadata.clone();
        let observed = self.observed_features.compute(&kmer_table)?;
        working = working.merge_numeric(observed.name(), observed.sample_ids(), observed.values())?;
        let shannon = self.shannon.compute(&kmer_table)?;
        working = working.merge_numeric(shannon.name(), shannon.sample_ids(), shannon.values())?;

        let jaccard_dm = self.jaccard.compute(&kmer_table, params.parallelism)?;
        let bray_curtis_dm = self.bray_curtis.compute(&kmer_table, params.parallelism)?;

        let jaccard_pcoa = self.ordination.compute(&jaccard_dm)?;
        let bray_curtis_pcoa = self.ordination.compute(&bray_curtis_dm)?;
        working = merge_ordination(
            working,
            self.jaccard.name(),
            &jaccard_pcoa,
            params.pc_dimensions,
        )?;
        working = merge_ordination(
            working,
            self.bray_curtis.name(),
            &bray_curtis_pcoa,
            params.pc_dimensions,
        )?;

        let plot = self.plotter.plot(&working, params.color_by.as_deref())?;
        debug!("core metrics finished; collecting artifacts");

        Ok(vec![
            NamedArtifact::new("rarefied_table", Artifact::Table(rarefied)),
            NamedArtifact::new("kmer_table", Artifact::Table(kmer_table)),
            NamedArtifact::new(
                "observed_features_vector",
                Artifact::AlphaVector(observed),
            ),
            NamedArtifact::new("shannon_vector", Artifact::AlphaVector(shannon)),
            NamedArtifact::new(
                "jaccard_distance_matrix",
                Artifact::DistanceMatrix(jaccard_dm),
            ),
            NamedArtifact::new(
                "bray_curtis_distance_matrix",
                Artifact::DistanceMatrix(bray_curtis_dm),
            ),
            NamedArtifact::new("jaccard_pcoa_results", Artifact::Ordination(jaccard_pcoa)),
            NamedArtifact::new(
                "bray_curtis_pcoa_results",
                Artifact::Ordination(bray_curtis_pcoa),
            ),
            NamedArtifact::new("scatter_plot", Artifact::Plot(plot)),
        ])
    }
}

impl Default for CoreMetrics {
    fn default() -> Self {
        CoreMetrics::new()
    }
}

/// Merges the leading `pc_dimensions` axes of an ordination into the
/// metadata, labeled with the metric, axis number, and rounded percentage
/// of variance explained.
fn merge_ordination(
    metadata: SampleMetadata,
    metric: &str,
    result: &OrdinationResult,
    pc_dimensions: usize,
) -> Result<SampleMetadata> {
    let axes = pc_dimensions.min(result.n_axes());
    let mut working = metadata;
    for axis in 0..axes {
        let percent = (result.proportion_explained()[axis] * 100.0).round() as i64;
        let label = format!("{} PC{} ({}%)", metric, axis + 1, percent);
        let values = result.coordinates().column(axis).to_vec();
        working = working.merge_numeric(&label, result.sample_ids(), &values)?;
    }
    Ok(working)
}
