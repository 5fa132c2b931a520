//! Geometric Brownian motion price stepping.
//!
//! One step is the exact log-space solution over `dt` for constant
//! parameters:
//!
//! ```text
//! S' = S · exp((μ − σ²/2)·dt + σ·√dt·Z)
//! ```
//!
//! The exponential keeps prices strictly positive for any finite input, so
//! a non-positive or non-finite result can only mean the caller broke the
//! `price > 0` precondition. That is treated as a bug and panics.

use tracing::error;

use crate::portfolio::Asset;
use crate::shocks::NormalSource;

/// Advance `price` by one interval of length `dt` years given a
/// standard-normal draw `z`.
pub fn step(price: f64, mu: f64, sigma: f64, dt: f64, z: f64) -> f64 {
    let drift = (mu - 0.5 * sigma * sigma) * dt;
    let shock = if sigma == 0.0 { 0.0 } else { sigma * dt.sqrt() * z };
    let next = price * (drift + shock).exp();

    if !(next.is_finite() && next > 0.0) {
        error!(price, mu, sigma, dt, z, next, "GBM step left the positive reals");
        panic!(
            "GBM step produced {next} from price={price} mu={mu} sigma={sigma} dt={dt} z={z}; \
             caller must supply price > 0 and finite parameters"
        );
    }
    next
}

/// [`step`] with `z` pulled from `source`.
pub fn sample_step(price: f64, mu: f64, sigma: f64, dt: f64, source: &mut impl NormalSource) -> f64 {
    step(price, mu, sigma, dt, source.next_normal())
}

/// Step one asset `days` times in place. Returns the final price.
pub fn advance(asset: &mut Asset, days: u32, dt: f64, source: &mut impl NormalSource) -> f64 {
    for _ in 0..days {
        asset.price = sample_step(asset.price, asset.mu, asset.sigma, dt, source);
    }
    asset.price
}

/// Step every asset once, in portfolio order. One simulated trading day.
pub fn advance_day(assets: &mut [Asset], dt: f64, source: &mut impl NormalSource) {
    for asset in assets {
        asset.price = sample_step(asset.price, asset.mu, asset.sigma, dt, source);
    }
}

/// Full path for a single price, including the starting point.
/// `path.len() == days + 1`.
pub fn price_path(
    start: f64,
    mu: f64,
    sigma: f64,
    dt: f64,
    days: u32,
    source: &mut impl NormalSource,
) -> Vec<f64> {
    let mut path = Vec::with_capacity(days as usize + 1);
    let mut price = start;
    path.push(price);
    for _ in 0..days {
        price = sample_step(price, mu, sigma, dt, source);
        path.push(price);
    }
    path
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::shocks::{BoxMuller, FixedShocks, ZeroShock};
    use crate::types::{TRADING_DAY_DT, TRADING_DAYS_PER_YEAR};

    #[test]
    fn zero_volatility_is_deterministic() {
        let expected = 100.0 * (0.07 * TRADING_DAY_DT).exp();
        for z in [-5.0, 0.0, 3.0, f64::INFINITY] {
            assert_eq!(step(100.0, 0.07, 0.0, TRADING_DAY_DT, z), expected, "z = {z}");
        }
    }

    #[test]
    fn drift_only_year_compounds_to_exp_mu() {
        let mut asset = Asset::new("AAA", 100.0, 0.10, 0.0);
        let end = advance(&mut asset, TRADING_DAYS_PER_YEAR, TRADING_DAY_DT, &mut ZeroShock);
        let expected = 100.0 * 0.10_f64.exp();
        assert!((end - expected).abs() < 1e-9, "end {end} vs {expected}");
        assert!((end - 110.517).abs() < 1e-3);
    }

    #[test]
    fn positive_shock_raises_price_above_drift_path() {
        let flat = step(100.0, 0.05, 0.3, TRADING_DAY_DT, 0.0);
        let up = step(100.0, 0.05, 0.3, TRADING_DAY_DT, 1.0);
        let down = step(100.0, 0.05, 0.3, TRADING_DAY_DT, -1.0);
        assert!(down < flat && flat < up);
    }

    #[test]
    fn volatility_drag_lowers_median() {
        // With z = 0 the step is exp((mu - sigma²/2) dt): higher sigma, lower price.
        let calm = step(100.0, 0.05, 0.1, 1.0, 0.0);
        let wild = step(100.0, 0.05, 0.6, 1.0, 0.0);
        assert!(wild < calm);
        assert!((wild - 100.0 * (0.05_f64 - 0.18).exp()).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "caller must supply price > 0")]
    fn non_positive_input_price_panics() {
        step(0.0, 0.05, 0.2, TRADING_DAY_DT, 0.1);
    }

    #[test]
    fn price_path_has_days_plus_one_points() {
        let mut src = FixedShocks::new(vec![0.5, -0.5]);
        let path = price_path(50.0, 0.1, 0.2, TRADING_DAY_DT, 10, &mut src);
        assert_eq!(path.len(), 11);
        assert_eq!(path[0], 50.0);
    }

    #[test]
    fn splitting_a_run_matches_running_straight_through() {
        // 10 days then 15 days == 25 days when fed the same shock stream.
        let shocks: Vec<f64> = (0..25).map(|i| ((i * 7) % 11) as f64 / 5.0 - 1.0).collect();

        let mut whole = Asset::new("AAA", 80.0, 0.08, 0.35);
        advance(&mut whole, 25, TRADING_DAY_DT, &mut FixedShocks::new(shocks.clone()));

        let mut split = Asset::new("AAA", 80.0, 0.08, 0.35);
        let mut src = FixedShocks::new(shocks);
        advance(&mut split, 10, TRADING_DAY_DT, &mut src);
        advance(&mut split, 15, TRADING_DAY_DT, &mut src);

        assert_eq!(whole.price, split.price);
    }

    /// Mean of S_T over many paths should sit near S_0·exp(μT).
    #[test]
    fn terminal_mean_matches_lognormal_expectation() {
        let mut src = BoxMuller::new(ChaCha20Rng::seed_from_u64(42));
        let n = 4_000;
        let (s0, mu, sigma) = (100.0, 0.08, 0.25);
        let mean = (0..n)
            .map(|_| {
                let mut a = Asset::new("AAA", s0, mu, sigma);
                advance(&mut a, 63, TRADING_DAY_DT, &mut src)
            })
            .sum::<f64>()
            / n as f64;
        let expected = s0 * (mu * 0.25_f64).exp();
        assert!(
            (mean - expected).abs() / expected < 0.01,
            "mean terminal price {mean:.3} vs expected {expected:.3}"
        );
    }

    #[test]
    fn advance_day_touches_each_asset_once() {
        let mut assets = vec![Asset::new("AAA", 100.0, 0.0, 0.2), Asset::new("BBB", 100.0, 0.0, 0.2)];
        let mut src = FixedShocks::new(vec![1.0, -1.0]);
        advance_day(&mut assets, TRADING_DAY_DT, &mut src);
        assert!(assets[0].price > 100.0);
        assert!(assets[1].price < 100.0);
    }

    proptest! {
        #[test]
        fn step_preserves_positivity(
            price in 1e-6f64..1e9,
            mu in -2.0f64..2.0,
            sigma in 0.0f64..3.0,
            dt in 1e-4f64..1.0,
            z in -8.0f64..8.0,
        ) {
            let next = step(price, mu, sigma, dt, z);
            prop_assert!(next.is_finite() && next > 0.0, "next = {}", next);
        }
    }
}
