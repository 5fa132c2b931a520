use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::portfolio::Asset;
use crate::types::{Symbol, Turn};

/// Which assets an event touches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Targets {
    All,
    Symbols(Vec<Symbol>),
}

impl Targets {
    pub fn contains(&self, symbol: &Symbol) -> bool {
        match self {
            Targets::All => true,
            Targets::Symbols(list) => list.contains(symbol),
        }
    }
}

/// Pure transformation of one asset's state.
///
/// `mu` is shifted additively, `sigma` and (optionally) `price` are scaled
/// multiplicatively. Assets outside `targets` come back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impact {
    pub targets: Targets,
    #[serde(default)]
    pub mu_shift: f64,
    #[serde(default = "one")]
    pub sigma_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_shock: Option<f64>,
}

fn one() -> f64 {
    1.0
}

impl Impact {
    pub fn apply(&self, asset: &Asset) -> Asset {
        if !self.targets.contains(&asset.symbol) {
            return asset.clone();
        }
        let mut out = asset.clone();
        out.mu += self.mu_shift;
        out.sigma *= self.sigma_scale;
        if let Some(shock) = self.price_shock {
            out.price *= shock;
        }
        out
    }
}

/// Immutable descriptor for a discrete market shock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub id: String,
    pub name: String,
    pub headline: String,
    pub impact: Impact,
}

impl MarketEvent {
    pub fn apply(&self, asset: &Asset) -> Asset {
        self.impact.apply(asset)
    }

    /// Reject impacts that could break `price > 0` or `sigma >= 0`.
    pub fn validate(&self) -> Result<()> {
        let bad = |what: String| GameError::invalid_config(format!("event {}: {what}", self.id));
        let Impact { mu_shift, sigma_scale, price_shock, .. } = &self.impact;
        if !mu_shift.is_finite() {
            return Err(bad(format!("mu_shift {mu_shift} is not finite")));
        }
        if !(sigma_scale.is_finite() && *sigma_scale >= 0.0) {
            return Err(bad(format!("sigma_scale {sigma_scale} must be finite and >= 0")));
        }
        if let Some(shock) = price_shock
            && !(shock.is_finite() && *shock > 0.0)
        {
            return Err(bad(format!("price_shock {shock} must be finite and > 0")));
        }
        Ok(())
    }
}

/// Entry in a session's append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub turn: Turn,
    pub event_id: String,
    pub name: String,
    pub headline: String,
}

impl EventRecord {
    pub fn new(turn: Turn, event: &MarketEvent) -> Self {
        EventRecord {
            turn,
            event_id: event.id.clone(),
            name: event.name.clone(),
            headline: event.headline.clone(),
        }
    }
}

/// Session-scoped bag of events not yet drawn. Built fresh from config for
/// every session; draws are uniform and without replacement.
#[derive(Debug, Clone, Default)]
pub struct EventPool {
    remaining: Vec<MarketEvent>,
}

impl EventPool {
    pub fn new(events: Vec<MarketEvent>) -> Self {
        EventPool { remaining: events }
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn remaining(&self) -> &[MarketEvent] {
        &self.remaining
    }

    /// Uniformly pick the index of the next event without removing it.
    pub fn choose(&self, rng: &mut impl Rng) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(rng.random_range(0..self.remaining.len()))
        }
    }

    /// Remove the event at `index`, keeping the rest in order.
    pub fn take(&mut self, index: usize) -> MarketEvent {
        self.remaining.remove(index)
    }
}

/// Large-cap technology names the sector-specific events hit.
pub fn tech_symbols() -> Vec<Symbol> {
    ["AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "AMD", "META", "NFLX", "TSLA", "PLTR"]
        .into_iter()
        .map(Symbol::from)
        .collect()
}

/// The shipped event table.
pub fn canonical_events() -> Vec<MarketEvent> {
    let event = |id: &str, name: &str, headline: &str, impact: Impact| MarketEvent {
        id: id.to_string(),
        name: name.to_string(),
        headline: headline.to_string(),
        impact,
    };
    let tech = Targets::Symbols(tech_symbols());

    vec![
        event(
            "market-boom",
            "Market Boom",
            "Breaking: A market-wide boom boosts investor confidence!",
            Impact { targets: Targets::All, mu_shift: 0.10, sigma_scale: 1.0, price_shock: None },
        ),
        event(
            "tech-bubble-burst",
            "Tech Bubble Bursts",
            "Breaking: The AI & Tech bubble has burst, causing massive volatility in tech stocks!",
            Impact { targets: tech.clone(), mu_shift: 0.0, sigma_scale: 2.0, price_shock: Some(0.85) },
        ),
        event(
            "fed-rate-hike",
            "Fed Rate Hikes",
            "Breaking: The Fed unexpectedly hikes interest rates, slowing market growth.",
            Impact { targets: Targets::All, mu_shift: -0.05, sigma_scale: 1.0, price_shock: None },
        ),
        event(
            "recession-fears",
            "Recession Fears",
            "Breaking: Recession fears grip the market, increasing volatility across all assets.",
            Impact { targets: Targets::All, mu_shift: 0.0, sigma_scale: 1.5, price_shock: None },
        ),
        event(
            "market-crash",
            "Market Crash",
            "Market Crash! AI bubble burst, volatility spiking.",
            Impact { targets: Targets::All, mu_shift: 0.0, sigma_scale: 1.8, price_shock: Some(0.90) },
        ),
        event(
            "tech-boom",
            "Tech Boom",
            "Tech Boom! Unprecedented growth sector-wide.",
            Impact { targets: tech, mu_shift: 0.15, sigma_scale: 1.0, price_shock: None },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn draw(pool: &mut EventPool, rng: &mut ChaCha20Rng) -> Option<MarketEvent> {
        pool.choose(rng).map(|i| pool.take(i))
    }

    fn by_id(id: &str) -> MarketEvent {
        canonical_events().into_iter().find(|e| e.id == id).unwrap()
    }

    #[test]
    fn symbol_scoped_event_leaves_others_bit_identical() {
        let burst = by_id("tech-bubble-burst");
        let mut bank = Asset::new("JPM", 187.31, 0.061_234, 0.217_89);
        bank.shares = 1234.5678;
        let after = burst.apply(&bank);
        assert_eq!(after.price.to_bits(), bank.price.to_bits());
        assert_eq!(after.mu.to_bits(), bank.mu.to_bits());
        assert_eq!(after.sigma.to_bits(), bank.sigma.to_bits());
        assert_eq!(after, bank);
    }

    #[test]
    fn symbol_scoped_event_hits_members() {
        let burst = by_id("tech-bubble-burst");
        let nvda = Asset::new("NVDA", 100.0, 0.2, 0.4);
        let after = burst.apply(&nvda);
        assert!((after.sigma - 0.8).abs() < 1e-12);
        assert!((after.price - 85.0).abs() < 1e-12);
        assert_eq!(after.mu, 0.2);
    }

    #[test]
    fn market_wide_drift_shift_is_additive() {
        let hike = by_id("fed-rate-hike");
        let a = hike.apply(&Asset::new("SPY", 500.0, 0.07, 0.15));
        assert!((a.mu - 0.02).abs() < 1e-12);
        assert_eq!(a.sigma, 0.15);
        assert_eq!(a.price, 500.0);
    }

    #[test]
    fn apply_does_not_touch_shares() {
        let crash = by_id("market-crash");
        let mut a = Asset::new("SPY", 500.0, 0.07, 0.15);
        a.shares = 10.0;
        assert_eq!(crash.apply(&a).shares, 10.0);
    }

    #[test]
    fn canonical_events_are_valid_and_unique() {
        let events = canonical_events();
        let ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), events.len());
        for e in &events {
            e.validate().unwrap();
        }
    }

    #[test]
    fn validate_rejects_non_positive_price_shock() {
        let mut e = by_id("market-crash");
        e.impact.price_shock = Some(0.0);
        assert!(e.validate().is_err());
        e.impact.price_shock = None;
        e.impact.sigma_scale = -1.0;
        assert!(e.validate().is_err());
    }

    #[test]
    fn pool_draws_each_event_exactly_once() {
        let mut pool = EventPool::new(canonical_events());
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let mut seen = HashSet::new();
        while let Some(e) = draw(&mut pool, &mut rng) {
            assert!(seen.insert(e.id.clone()), "drew {} twice", e.id);
        }
        assert_eq!(seen.len(), canonical_events().len());
        assert!(draw(&mut pool, &mut rng).is_none());
        assert!(pool.is_empty());
    }

    /// Over many fresh pools, every event should show up first roughly 1/6 of the time.
    #[test]
    fn first_draw_is_roughly_uniform() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let n = 6_000;
        let mut counts = std::collections::HashMap::new();
        for _ in 0..n {
            let mut pool = EventPool::new(canonical_events());
            let e = draw(&mut pool, &mut rng).unwrap();
            *counts.entry(e.id).or_insert(0usize) += 1;
        }
        assert_eq!(counts.len(), 6);
        for (id, c) in counts {
            assert!((800..=1200).contains(&c), "{id} drawn first {c} times out of {n}");
        }
    }

    #[test]
    fn impact_json_defaults() {
        let impact: Impact = serde_json::from_str(r#"{"targets":"all","mu_shift":0.1}"#).unwrap();
        assert_eq!(impact.sigma_scale, 1.0);
        assert_eq!(impact.price_shock, None);
        let scoped: Impact =
            serde_json::from_str(r#"{"targets":{"symbols":["AAPL"]},"sigma_scale":2.0}"#).unwrap();
        assert!(scoped.targets.contains(&Symbol::from("AAPL")));
        assert_eq!(scoped.mu_shift, 0.0);
    }
}
