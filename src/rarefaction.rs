//! Rarefaction: subsampling every sample of a table to a common depth.
//!
//! Counts are floored to whole observations before drawing. Sampling runs
//! per sample, either without replacement (a uniform draw from the sample's
//! observation pool) or with replacement (count-weighted draws).

use log::info;
use ndarray::Array2;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{KmerizerError, Result};
use crate::pipeline::Rarefier;
use crate::table::FeatureTable;

/// Default rarefaction collaborator.
///
/// With a fixed seed the draw is reproducible across runs; without one the
/// generator is seeded from the operating system.
#[derive(Debug, Clone, Default)]
pub struct TableRarefier {
    seed: Option<u64>,
}

impl TableRarefier {
    pub fn new() -> Self {
        TableRarefier { seed: None }
    }

    pub fn with_seed(seed: u64) -> Self {
        TableRarefier { seed: Some(seed) }
    }

    fn make_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

impl Rarefier for TableRarefier {
    /// Subsamples every sample column to exactly `depth` observations.
    ///
    /// Fails with [`KmerizerError::InsufficientDepth`] if any sample holds
    /// fewer than `depth` whole observations. Feature rows that end up empty
    /// are kept so the table's identifiers stay stable.
    fn rarefy(
        &self,
        table: &FeatureTable,
        depth: u64,
        with_replacement: bool,
    ) -> Result<FeatureTable> {
        let (n_features, n_samples) = table.dimensions();
        let mut rng = self.make_rng();
        let mut data = Array2::<f64>::zeros((n_features, n_samples));

        for (s, sample_id) in table.sample_ids().iter().enumerate() {
            let counts: Vec<u64> = table
                .matrix()
                .column(s)
                .iter()
                .map(|&v| v.max(0.0) as u64)
                .collect();
            let total: u64 = counts.iter().sum();
            if total < depth {
                return Err(KmerizerError::InsufficientDepth {
                    sample: sample_id.clone(),
                    available: total,
                    requested: depth,
                });
            }
            if depth == 0 {
                continue;
            }

            let drawn = if with_replacement {
                draw_with_replacement(&counts, depth, &mut rng)?
            } else {
                draw_without_replacement(&counts, total, depth, &mut rng)
            };
            for (f, &count) in drawn.iter().enumerate() {
                data[[f, s]] = count as f64;
            }
        }

        info!(
            "rarefied {} samples to depth {} ({} replacement)",
            n_samples,
            depth,
            if with_replacement { "with" } else { "without" }
        );
        FeatureTable::from_parts(data, table.feature_ids().to_vec(), table.sample_ids().to_vec())
    }
}

/// Draws `depth` distinct observation units from a pool of `total`, mapping
/// each unit back to its feature through cumulative counts.
fn draw_without_replacement(
    counts: &[u64],
    total: u64,
    depth: u64,
    rng: &mut StdRng,
) -> Vec<u64> {
    let mut cumulative = Vec::with_capacity(counts.len());
    let mut running = 0u64;
    for &count in counts {
        running += count;
        cumulative.push(running);
    }

    let mut drawn = vec![0u64; counts.len()];
    for unit in rand::seq::index::sample(rng, total as usize, depth as usize) {
        let feature = cumulative.partition_point(|&c| c <= unit as u64);
        drawn[feature] += 1;
    }
    drawn
}

/// Draws `depth` observations with replacement, weighting each feature by
/// its current count.
fn draw_with_replacement(counts: &[u64], depth: u64, rng: &mut StdRng) -> Result<Vec<u64>> {
    let dist = WeightedIndex::new(counts)
        .map_err(|e| KmerizerError::InvalidParameter(format!("cannot subsample counts: {e}")))?;
    let mut drawn = vec![0u64; counts.len()];
    for _ in 0..depth {
        drawn[dist.sample(rng)] += 1;
    }
    Ok(drawn)
}
