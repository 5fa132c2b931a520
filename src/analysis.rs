use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::GameConfig;
use crate::error::Result;
use crate::portfolio::Allocation;
use crate::seed::MarketSeed;
use crate::session::Session;

/// Outcome of one complete session in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub seed: u64,
    pub score: f64,
    pub total_return: f64,
    pub final_value: f64,
    /// Ids of the events drawn, in turn order.
    pub events: Vec<String>,
}

/// Distribution statistics for a continuous metric across N runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    pub runs: usize,
    pub score: DistStats,
    pub total_return: DistStats,
    /// Number of runs in which each event id fired.
    pub event_counts: BTreeMap<String, usize>,
}

/// Play `runs` sessions with seeds `config.seed + i` (wrapping at
/// `u64::MAX`), holding `allocation` every turn. Sessions run in parallel;
/// output is in run order.
pub fn run_batch(
    config: &GameConfig,
    seed: &MarketSeed,
    allocation: &Allocation,
    runs: u64,
) -> Result<Vec<RunSummary>> {
    info!(runs, start_seed = config.seed, "batch started");
    (0..runs)
        .into_par_iter()
        .map(|i| {
            let config = GameConfig { seed: config.seed.wrapping_add(i), ..config.clone() };
            let run_seed = config.seed;
            let mut session = Session::new(config, seed)?;
            let card = session.play_out(allocation)?;
            Ok(RunSummary {
                seed: run_seed,
                score: card.score,
                total_return: card.total_return,
                final_value: card.final_value,
                events: card.events.into_iter().map(|e| e.event_id).collect(),
            })
        })
        .collect()
}

/// Cross-run distributions. `None` for an empty batch.
pub fn summarize(runs: &[RunSummary]) -> Option<BatchStats> {
    let scores: Vec<f64> = runs.iter().map(|r| r.score).collect();
    let returns: Vec<f64> = runs.iter().map(|r| r.total_return).collect();

    let mut event_counts = BTreeMap::new();
    for run in runs {
        for id in &run.events {
            *event_counts.entry(id.clone()).or_insert(0) += 1;
        }
    }

    Some(BatchStats {
        runs: runs.len(),
        score: DistStats::from_values(&scores)?,
        total_return: DistStats::from_values(&returns)?,
        event_counts,
    })
}

impl DistStats {
    /// Percentiles by linear interpolation between ranks; `std_dev` is the
    /// sample (n − 1) deviation. `None` for no values.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let (&min, &max) = (sorted.first()?, sorted.last()?);

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let std_dev = match n {
            1 => 0.0,
            _ => (sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt(),
        };
        let q = |p| quantile(&sorted, p);

        Some(DistStats {
            n,
            min,
            p5: q(0.05),
            p25: q(0.25),
            p50: q(0.50),
            p75: q(0.75),
            p95: q(0.95),
            max,
            mean,
            std_dev,
        })
    }
}

/// `sorted` must be non-empty and ascending; `p` in `0.0..=1.0`.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let (below, above) = (rank.floor() as usize, rank.ceil() as usize);
    sorted[below] + (sorted[above] - sorted[below]) * (rank - below as f64)
}
