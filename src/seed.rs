use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GameError, Result};
use crate::portfolio::Asset;
use crate::types::Symbol;

/// Starting parameters for one asset, as supplied by the market-data
/// provider at session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeed {
    pub symbol: Symbol,
    pub price: f64,
    pub mu: f64,
    pub sigma: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl AssetSeed {
    pub const FALLBACK_PRICE: f64 = 150.0;
    pub const FALLBACK_MU: f64 = 0.05;
    pub const FALLBACK_SIGMA: f64 = 0.25;

    pub fn new(symbol: impl Into<Symbol>, price: f64, mu: f64, sigma: f64) -> Self {
        AssetSeed { symbol: symbol.into(), price, mu, sigma, narrative: None }
    }

    /// Placeholder parameters used when the provider has no data for `symbol`.
    pub fn fallback(symbol: impl Into<Symbol>) -> Self {
        let symbol = symbol.into();
        warn!(%symbol, "no market data; using fallback parameters");
        AssetSeed {
            symbol,
            price: Self::FALLBACK_PRICE,
            mu: Self::FALLBACK_MU,
            sigma: Self::FALLBACK_SIGMA,
            narrative: Some("Simulation Mode (Data Unavailable)".to_string()),
        }
    }

    pub fn to_asset(&self) -> Asset {
        Asset {
            symbol: self.symbol.clone(),
            price: self.price,
            mu: self.mu,
            sigma: self.sigma,
            shares: 0.0,
            narrative: self.narrative.clone(),
        }
    }
}

/// The full inbound seed for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSeed {
    pub assets: Vec<AssetSeed>,
}

impl MarketSeed {
    pub fn new(assets: Vec<AssetSeed>) -> Self {
        MarketSeed { assets }
    }

    /// Offline seed for demos and benches.
    pub fn canonical() -> Self {
        MarketSeed::new(vec![
            AssetSeed::new("AAPL", 227.50, 0.18, 0.24),
            AssetSeed::new("MSFT", 415.10, 0.21, 0.22),
            AssetSeed::new("NVDA", 118.90, 0.55, 0.52),
            AssetSeed::new("SPY", 571.40, 0.11, 0.13),
            AssetSeed::new("JPM", 210.80, 0.14, 0.21),
        ])
    }

    /// Seed for `symbols`, taking provider data from `known` where present
    /// and falling back to placeholder parameters otherwise.
    pub fn select(symbols: &[Symbol], known: &MarketSeed) -> Self {
        MarketSeed::new(
            symbols
                .iter()
                .map(|s| {
                    known
                        .assets
                        .iter()
                        .find(|a| &a.symbol == s)
                        .cloned()
                        .unwrap_or_else(|| AssetSeed::fallback(s.clone()))
                })
                .collect(),
        )
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.assets.iter().map(|a| a.symbol.clone()).collect()
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let seed: MarketSeed = serde_json::from_str(text)?;
        seed.validate()?;
        Ok(seed)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Positivity, finiteness and uniqueness only; plausibility is the
    /// provider's business.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for seed in &self.assets {
            seed.to_asset().validate()?;
            if !seen.insert(&seed.symbol) {
                return Err(GameError::DuplicateSymbol { symbol: seed.symbol.clone() });
            }
        }
        Ok(())
    }
}
