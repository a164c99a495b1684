//! Command-line interface for the kmerizer toolkit.
//!
//! Two subcommands mirror the two library entry points: `kmerize` builds a
//! k-mer frequency table from sequences and an abundance table, and
//! `core-metrics` runs the full diversity pipeline and writes every
//! artifact it produces into an output directory.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use kmerizer::io::{
    load_sequences, read_feature_table, write_alpha_vector, write_distance_matrix,
    write_feature_table, write_ordination,
};
use kmerizer::metadata::load_metadata;
use kmerizer::pipeline::{Artifact, CoreMetrics, CoreMetricsParams, NamedArtifact};
use kmerizer::{build_kmer_table, DocFrequency, KmerParams, ScoringMode};

#[derive(Parser, Debug)]
#[command(author, version, about = "K-mer frequency tables and diversity analysis for biological sequences", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a k-mer x sample frequency table
    Kmerize {
        /// FASTA file of sequences, plain or compressed
        #[arg(short, long)]
        sequences: PathBuf,

        /// Abundance table TSV with a '#OTU ID' header row
        #[arg(short, long)]
        table: PathBuf,

        /// Output path for the k-mer table TSV
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        kmer: KmerArgs,
    },

    /// Run the diversity pipeline and write all nine artifacts
    CoreMetrics {
        /// FASTA file of sequences, plain or compressed
        #[arg(short, long)]
        sequences: PathBuf,

        /// Abundance table TSV with a '#OTU ID' header row
        #[arg(short, long)]
        table: PathBuf,

        /// Sample metadata TSV, sample IDs in the first column
        #[arg(short, long)]
        metadata: PathBuf,

        /// Directory the artifacts are written into
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Total observations to rarefy every sample down to
        #[arg(short = 'd', long)]
        sampling_depth: u64,

        /// Rarefy with replacement instead of without
        #[arg(long)]
        with_replacement: bool,

        /// Threads for the distance-matrix steps, 0 for the rayon default
        #[arg(long, default_value_t = 1)]
        threads: usize,

        /// Leading principal-coordinate axes merged into the metadata
        #[arg(long, default_value_t = 3)]
        pc_dimensions: usize,

        /// Categorical metadata column to color the scatter plot by
        #[arg(long)]
        color_by: Option<String>,

        /// Seed for reproducible rarefaction
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        kmer: KmerArgs,
    },
}

/// Scoring and pruning flags shared by both subcommands.
#[derive(Args, Debug)]
struct KmerArgs {
    /// K-mer length
    #[arg(short = 'k', long, default_value_t = 16)]
    kmer_size: usize,

    /// Score k-mers with TF-IDF weights instead of raw counts
    #[arg(long)]
    tfidf: bool,

    /// Minimum sequences a k-mer must appear in; an integer is an absolute
    /// count, a decimal below 1.0 a proportion
    #[arg(long, default_value = "1")]
    min_df: DocFrequency,

    /// Maximum sequences a k-mer may appear in; an integer is an absolute
    /// count, a decimal a proportion
    #[arg(long, default_value = "1.0")]
    max_df: DocFrequency,

    /// Keep only the top-N k-mers by aggregate score
    #[arg(long)]
    max_features: Option<usize>,
}

impl KmerArgs {
    fn to_params(&self) -> KmerParams {
        KmerParams {
            kmer_size: self.kmer_size,
            scoring: if self.tfidf {
                ScoringMode::Tfidf
            } else {
                ScoringMode::Count
            },
            min_doc_freq: self.min_df,
            max_doc_freq: self.max_df,
            max_vocab_size: self.max_features,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Kmerize {
            sequences,
            table,
            output,
            kmer,
        } => run_kmerize(&sequences, &table, &output, &kmer),
        Commands::CoreMetrics {
            sequences,
            table,
            metadata,
            output_dir,
            sampling_depth,
            with_replacement,
            threads,
            pc_dimensions,
            color_by,
            seed,
            kmer,
        } => {
            let params = CoreMetricsParams {
                sampling_depth,
                kmer_params: kmer.to_params(),
                with_replacement,
                parallelism: threads,
                pc_dimensions,
                color_by,
            };
            run_core_metrics(&sequences, &table, &metadata, &output_dir, seed, &params)
        }
    }
}

fn run_kmerize(
    sequences_path: &Path,
    table_path: &Path,
    output: &Path,
    kmer: &KmerArgs,
) -> Result<()> {
    let sequences = load_sequences(sequences_path)
        .with_context(|| format!("reading sequences from {}", sequences_path.display()))?;
    let abundance = read_feature_table(table_path)
        .with_context(|| format!("reading abundance table from {}", table_path.display()))?;

    let kmer_table = build_kmer_table(&sequences, &abundance, &kmer.to_params())?;
    write_feature_table(&kmer_table, output)
        .with_context(|| format!("writing k-mer table to {}", output.display()))?;
    info!(
        "wrote {} k-mers x {} samples to {}",
        kmer_table.n_features(),
        kmer_table.n_samples(),
        output.display()
    );
    Ok(())
}

fn run_core_metrics(
    sequences_path: &Path,
    table_path: &Path,
    metadata_path: &Path,
    output_dir: &Path,
    seed: Option<u64>,
    params: &CoreMetricsParams,
) -> Result<()> {
    let sequences = load_sequences(sequences_path)
        .with_context(|| format!("reading sequences from {}", sequences_path.display()))?;
    let abundance = read_feature_table(table_path)
        .with_context(|| format!("reading abundance table from {}", table_path.display()))?;
    let metadata = load_metadata(metadata_path)
        .with_context(|| format!("reading metadata from {}", metadata_path.display()))?;

    let pipeline = match seed {
        Some(seed) => CoreMetrics::with_seed(seed),
        None => CoreMetrics::new(),
    };
    let artifacts = pipeline.run(&sequences, &abundance, &metadata, params)?;

    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    for artifact in &artifacts {
        let path = write_artifact(artifact, output_dir)
            .with_context(|| format!("writing artifact '{}'", artifact.name))?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn write_artifact(artifact: &NamedArtifact, dir: &Path) -> Result<PathBuf> {
    let path = match &artifact.artifact {
        Artifact::Table(table) => {
            let path = dir.join(format!("{}.tsv", artifact.name));
            write_feature_table(table, &path)?;
            path
        }
        Artifact::AlphaVector(alpha) => {
            let path = dir.join(format!("{}.tsv", artifact.name));
            write_alpha_vector(alpha, &path)?;
            path
        }
        Artifact::DistanceMatrix(distances) => {
            let path = dir.join(format!("{}.tsv", artifact.name));
            write_distance_matrix(distances, &path)?;
            path
        }
        Artifact::Ordination(result) => {
            let path = dir.join(format!("{}.json", artifact.name));
            write_ordination(result, &path)?;
            path
        }
        Artifact::Plot(plot) => {
            let path = dir.join(format!("{}.svg", artifact.name));
            fs::write(&path, plot.svg())?;
            path
        }
    };
    Ok(path)
}
