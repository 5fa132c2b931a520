use serde::{Deserialize, Serialize};

use crate::events::EventRecord;

/// Per-turn → per-year Sharpe scaling for quarterly turns: `√4 = 2`.
///
/// Kept as a named constant rather than derived from the turn length;
/// `GameConfig::annualization_factor` overrides it per session.
pub const ANNUALIZATION_FACTOR: f64 = 2.0;

/// Dispersion within this many ulps of the per-turn growth factor
/// `1 + mean` is rounding noise from the value division, not real spread.
const FLAT_ULPS: f64 = 64.0;

/// Largest standard deviation still treated as zero for returns averaging `mean`.
fn flat_bound(mean: f64) -> f64 {
    FLAT_ULPS * f64::EPSILON * (1.0 + mean.abs())
}

/// Simple returns between consecutive history samples.
pub fn period_returns(history: &[f64]) -> Vec<f64> {
    history.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

/// Mean and population standard deviation. `None` for an empty slice.
pub fn mean_and_stdev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Annualized Sharpe ratio of the per-turn returns, zero risk-free rate.
///
/// Histories shorter than two samples and flat return series score `0`.
/// A series is flat when its spread is zero up to the rounding of the
/// returns themselves; small but real spread still scores.
pub fn sharpe_score(history: &[f64], annualization_factor: f64) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let returns = period_returns(history);
    match mean_and_stdev(&returns) {
        Some((mean, stdev)) if stdev > flat_bound(mean) => mean / stdev * annualization_factor,
        _ => 0.0,
    }
}

/// `final / baseline − 1`; `0` when there is nothing to compare.
pub fn total_return(history: &[f64]) -> f64 {
    match (history.first(), history.last()) {
        (Some(&first), Some(&last)) if history.len() >= 2 && first != 0.0 => last / first - 1.0,
        _ => 0.0,
    }
}

/// End-of-session result handed to whatever persists or displays scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: f64,
    pub total_return: f64,
    pub baseline_value: f64,
    pub final_value: f64,
    pub history: Vec<f64>,
    pub events: Vec<EventRecord>,
}

impl ScoreCard {
    pub fn new(history: &[f64], events: &[EventRecord], annualization_factor: f64) -> Self {
        ScoreCard {
            score: sharpe_score(history, annualization_factor),
            total_return: total_return(history),
            baseline_value: history.first().copied().unwrap_or(0.0),
            final_value: history.last().copied().unwrap_or(0.0),
            history: history.to_vec(),
            events: events.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_history_scores_zero() {
        assert_eq!(sharpe_score(&[1_000_000.0, 1_000_000.0, 1_000_000.0], ANNUALIZATION_FACTOR), 0.0);
    }

    #[test]
    fn short_history_scores_zero() {
        assert_eq!(sharpe_score(&[], ANNUALIZATION_FACTOR), 0.0);
        assert_eq!(sharpe_score(&[1_000_000.0], ANNUALIZATION_FACTOR), 0.0);
    }

    #[test]
    fn exact_identical_returns_score_zero() {
        let h = [100.0, 200.0, 400.0, 800.0];
        assert_eq!(period_returns(&h), vec![1.0, 1.0, 1.0]);
        assert_eq!(sharpe_score(&h, ANNUALIZATION_FACTOR), 0.0);
    }

    #[test]
    fn constant_growth_with_rounding_noise_scores_zero() {
        let h: Vec<f64> = (0..8).map(|i| 1_000_000.0 * 1.1_f64.powi(i)).collect();
        assert_eq!(sharpe_score(&h, ANNUALIZATION_FACTOR), 0.0);
    }

    #[test]
    fn tiny_but_real_dispersion_still_scores() {
        // Returns ≈ 1e-6 and 1e-6 + 2e-13: stdev 1e-13, far above rounding.
        let g = 1.0 + 1e-6;
        let h = [1.0, g, g * (g + 2e-13)];
        let s = sharpe_score(&h, ANNUALIZATION_FACTOR);
        assert!(s > 1.0e7 && s < 3.0e7, "score {s}");
    }

    #[test]
    fn rising_history_scores_positive() {
        let h = [100.0, 101.0, 103.0, 104.0, 108.0];
        assert!(sharpe_score(&h, ANNUALIZATION_FACTOR) > 0.0);
    }

    #[test]
    fn falling_history_scores_negative() {
        let h = [100.0, 97.0, 96.0, 90.0, 89.5];
        assert!(sharpe_score(&h, ANNUALIZATION_FACTOR) < 0.0);
    }

    #[test]
    fn known_value() {
        // returns: +10 %, −10 % → mean ≈ 0 → score ≈ 0.
        assert!(sharpe_score(&[100.0, 110.0, 99.0], 2.0).abs() < 1e-12);

        // returns: 0.1, 0.3 → mean 0.2, population stdev 0.1 → 2.0 × 2.0 = 4.0.
        let s = sharpe_score(&[100.0, 110.0, 143.0], 2.0);
        assert!((s - 4.0).abs() < 1e-9, "score {s}");
    }

    #[test]
    fn factor_scales_linearly() {
        let h = [100.0, 105.0, 103.0, 110.0];
        let one = sharpe_score(&h, 1.0);
        assert!((sharpe_score(&h, ANNUALIZATION_FACTOR) - 2.0 * one).abs() < 1e-12);
    }

    #[test]
    fn total_return_of_history() {
        assert!((total_return(&[1_000_000.0, 900_000.0, 1_250_000.0]) - 0.25).abs() < 1e-12);
        assert_eq!(total_return(&[1_000_000.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn scorecard_collects_history_ends() {
        let card = ScoreCard::new(&[100.0, 110.0, 143.0], &[], 2.0);
        assert_eq!(card.baseline_value, 100.0);
        assert_eq!(card.final_value, 143.0);
        assert!((card.total_return - 0.43).abs() < 1e-12);
        assert!((card.score - 4.0).abs() < 1e-9);
    }
}
