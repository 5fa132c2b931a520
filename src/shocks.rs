use std::f64::consts::PI;

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Source of standard-normal variates driving the GBM shock term.
///
/// Production sessions use [`BoxMuller`]; tests inject [`ZeroShock`] or
/// [`FixedShocks`] to make price paths deterministic.
pub trait NormalSource {
    fn next_normal(&mut self) -> f64;
}

impl<T: NormalSource + ?Sized> NormalSource for &mut T {
    fn next_normal(&mut self) -> f64 {
        (**self).next_normal()
    }
}

impl<T: NormalSource + ?Sized> NormalSource for Box<T> {
    fn next_normal(&mut self) -> f64 {
        (**self).next_normal()
    }
}

/// Box–Muller transform over two independent uniforms.
///
/// `u` is drawn from (0, 1] so `ln(u)` is always finite; `v` from [0, 1).
/// Only the cosine branch is used, so each variate costs two uniforms.
pub struct BoxMuller<R> {
    rng: R,
}

impl<R: Rng> BoxMuller<R> {
    pub fn new(rng: R) -> Self {
        BoxMuller { rng }
    }
}

impl<R: Rng> NormalSource for BoxMuller<R> {
    fn next_normal(&mut self) -> f64 {
        let u = 1.0 - self.rng.random::<f64>();
        let v = self.rng.random::<f64>();
        (-2.0 * u.ln()).sqrt() * (2.0 * PI * v).cos()
    }
}

/// rand_distr's ziggurat sampler. Same distribution as [`BoxMuller`],
/// different stream for the same seed.
pub struct Ziggurat<R> {
    rng: R,
}

impl<R: Rng> Ziggurat<R> {
    pub fn new(rng: R) -> Self {
        Ziggurat { rng }
    }
}

impl<R: Rng> NormalSource for Ziggurat<R> {
    fn next_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }
}

/// Always zero: every step follows the pure drift term.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroShock;

impl NormalSource for ZeroShock {
    fn next_normal(&mut self) -> f64 {
        0.0
    }
}

/// Replays a fixed list of variates, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct FixedShocks {
    values: Vec<f64>,
    cursor: usize,
}

impl FixedShocks {
    /// Panics if `values` is empty.
    pub fn new(values: Vec<f64>) -> Self {
        assert!(!values.is_empty(), "FixedShocks needs at least one value");
        FixedShocks { values, cursor: 0 }
    }
}

impl NormalSource for FixedShocks {
    fn next_normal(&mut self) -> f64 {
        let z = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        z
    }
}

/// Which production sampler a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShockMethod {
    #[default]
    BoxMuller,
    Ziggurat,
}

/// Type-erased production source built from a [`ShockMethod`].
pub fn production_source<R: Rng + 'static>(method: ShockMethod, rng: R) -> Box<dyn NormalSource> {
    match method {
        ShockMethod::BoxMuller => Box::new(BoxMuller::new(rng)),
        ShockMethod::Ziggurat => Box::new(Ziggurat::new(rng)),
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn moments(source: &mut impl NormalSource, n: usize) -> (f64, f64) {
        let draws: Vec<f64> = (0..n).map(|_| source.next_normal()).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n as f64;
        (mean, var)
    }

    /// 50k Box–Muller draws: mean within ±0.03 of 0, variance within ±5 % of 1.
    #[test]
    fn box_muller_is_standard_normal() {
        let mut src = BoxMuller::new(ChaCha20Rng::seed_from_u64(42));
        let (mean, var) = moments(&mut src, 50_000);
        assert!(mean.abs() < 0.03, "mean {mean:.4} too far from 0");
        assert!((var - 1.0).abs() < 0.05, "variance {var:.4} too far from 1");
    }

    #[test]
    fn ziggurat_is_standard_normal() {
        let mut src = Ziggurat::new(ChaCha20Rng::seed_from_u64(7));
        let (mean, var) = moments(&mut src, 50_000);
        assert!(mean.abs() < 0.03, "mean {mean:.4} too far from 0");
        assert!((var - 1.0).abs() < 0.05, "variance {var:.4} too far from 1");
    }

    #[test]
    fn box_muller_never_produces_non_finite_values() {
        let mut src = BoxMuller::new(ChaCha20Rng::seed_from_u64(1));
        for _ in 0..100_000 {
            assert!(src.next_normal().is_finite());
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = BoxMuller::new(ChaCha20Rng::seed_from_u64(9));
        let mut b = BoxMuller::new(ChaCha20Rng::seed_from_u64(9));
        for _ in 0..100 {
            assert_eq!(a.next_normal(), b.next_normal());
        }
    }

    #[test]
    fn fixed_shocks_cycle() {
        let mut src = FixedShocks::new(vec![1.0, -1.0]);
        let got: Vec<f64> = (0..5).map(|_| src.next_normal()).collect();
        assert_eq!(got, vec![1.0, -1.0, 1.0, -1.0, 1.0]);
    }

    #[test]
    fn mutable_reference_forwards() {
        fn draw(mut source: impl NormalSource) -> f64 {
            source.next_normal()
        }
        let mut inner = FixedShocks::new(vec![0.5, 2.0]);
        assert_eq!(draw(&mut inner), 0.5);
        assert_eq!(draw(&mut inner), 2.0);
    }

    #[test]
    fn shock_method_json_is_snake_case() {
        let json = serde_json::to_string(&ShockMethod::BoxMuller).unwrap();
        assert_eq!(json, r#""box_muller""#);
    }
}
