use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{GameError, Result};
use crate::types::Symbol;

/// Relative tolerance for value-conservation checks.
pub const VALUE_TOLERANCE: f64 = 1e-9;

/// One holding plus its GBM parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: Symbol,
    /// Current mark; strictly positive.
    pub price: f64,
    /// Annual drift, continuously compounded.
    pub mu: f64,
    /// Annual volatility of log-returns; non-negative.
    pub sigma: f64,
    pub shares: f64,
    /// Free-text blurb from the market-data provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl Asset {
    pub fn new(symbol: impl Into<Symbol>, price: f64, mu: f64, sigma: f64) -> Self {
        Asset { symbol: symbol.into(), price, mu, sigma, shares: 0.0, narrative: None }
    }

    pub fn market_value(&self) -> f64 {
        self.price * self.shares
    }

    /// Check the seed-time contract: finite parameters, `price > 0`, `sigma >= 0`.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in
            [("price", self.price), ("mu", self.mu), ("sigma", self.sigma), ("shares", self.shares)]
        {
            if !value.is_finite() {
                return Err(GameError::NonFiniteParameter {
                    symbol: self.symbol.clone(),
                    field,
                    value,
                });
            }
        }
        if self.price <= 0.0 {
            return Err(GameError::NonPositivePrice { symbol: self.symbol.clone(), price: self.price });
        }
        if self.sigma < 0.0 {
            return Err(GameError::NegativeVolatility {
                symbol: self.symbol.clone(),
                sigma: self.sigma,
            });
        }
        Ok(())
    }
}

/// Fixed, ordered set of assets plus cash. The symbol set cannot change
/// after construction; only prices, parameters and holdings move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portfolio {
    assets: Vec<Asset>,
    pub cash: f64,
}

impl Portfolio {
    pub fn new(assets: Vec<Asset>, cash: f64) -> Result<Self> {
        let mut seen = HashSet::new();
        for asset in &assets {
            asset.validate()?;
            if !seen.insert(asset.symbol.clone()) {
                return Err(GameError::DuplicateSymbol { symbol: asset.symbol.clone() });
            }
        }
        if !cash.is_finite() {
            return Err(GameError::invalid_config(format!("cash is not finite ({cash})")));
        }
        Ok(Portfolio { assets, cash })
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub(crate) fn assets_mut(&mut self) -> &mut [Asset] {
        &mut self.assets
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Asset> {
        self.assets.iter().find(|a| &a.symbol == symbol)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.get(symbol).is_some()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.assets.iter().map(|a| &a.symbol)
    }

    /// `cash + Σ price × shares`.
    pub fn total_value(&self) -> f64 {
        self.cash + self.assets.iter().map(Asset::market_value).sum::<f64>()
    }

    /// Re-weight holdings to `allocation` at current prices, preserving
    /// total value.
    ///
    /// Assets the allocation does not mention are liquidated into cash.
    /// Allocation entries for symbols outside the portfolio are ignored;
    /// the session rejects them before calling this. Percentages are
    /// trusted as given.
    pub fn rebalance(&mut self, allocation: &Allocation) {
        let total = self.total_value();
        let mut invested = 0.0;

        for asset in &mut self.assets {
            // Positivity is an invariant of the simulator; a zero price here
            // means something upstream is broken.
            assert!(
                asset.price > 0.0,
                "cannot rebalance {}: non-positive price {}",
                asset.symbol,
                asset.price
            );
            let target_value = total * allocation.percent(&asset.symbol) / 100.0;
            asset.shares = target_value / asset.price;
            invested += target_value;
        }

        self.cash = total - invested;

        let floor = -VALUE_TOLERANCE * total.abs().max(1.0);
        if self.cash < floor {
            error!(cash = self.cash, total, "rebalance left negative cash");
            debug_assert!(self.cash >= floor, "negative cash {} after rebalance", self.cash);
        }
    }
}

/// Target weight per symbol, in percent of total portfolio value.
///
/// Ordered by symbol so serialized output is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Allocation(BTreeMap<Symbol, f64>);

impl Allocation {
    pub fn new() -> Self {
        Allocation(BTreeMap::new())
    }

    pub fn with(mut self, symbol: impl Into<Symbol>, percent: f64) -> Self {
        self.set(symbol, percent);
        self
    }

    pub fn set(&mut self, symbol: impl Into<Symbol>, percent: f64) {
        self.0.insert(symbol.into(), percent);
    }

    /// Weight for `symbol`; absent symbols weigh zero.
    pub fn percent(&self, symbol: &Symbol) -> f64 {
        self.0.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.0.iter().map(|(s, p)| (s, *p))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whole-percent split that sums to exactly 100: each symbol gets
    /// `floor(100 / n)` and the remainder goes one point at a time to the
    /// leading symbols.
    pub fn equal_split<'a>(symbols: impl IntoIterator<Item = &'a Symbol>) -> Self {
        let symbols: Vec<&Symbol> = symbols.into_iter().collect();
        let n = symbols.len() as u32;
        if n == 0 {
            return Allocation::new();
        }
        let base = 100 / n;
        let remainder = 100 % n;
        symbols
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let extra = if (i as u32) < remainder { 1 } else { 0 };
                (s.clone(), f64::from(base + extra))
            })
            .collect()
    }

    /// Parse `"AAPL=40,MSFT=60"`. Whitespace around entries is ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut out = Allocation::new();
        for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let malformed = || GameError::MalformedAllocation { entry: entry.to_string() };
            let (symbol, percent) = entry.split_once('=').ok_or_else(malformed)?;
            let symbol = symbol.trim();
            if symbol.is_empty() {
                return Err(malformed());
            }
            let percent: f64 = percent.trim().parse().map_err(|_| malformed())?;
            out.set(symbol, percent);
        }
        Ok(out)
    }

    /// Turn-boundary check: whole percents in 0..=100, every symbol known
    /// to `portfolio`, and an exact total of 100.
    pub fn validate_for(&self, portfolio: &Portfolio) -> Result<()> {
        for (symbol, percent) in self.iter() {
            if !portfolio.contains(symbol) {
                return Err(GameError::UnknownSymbol { symbol: symbol.clone() });
            }
            if !(0.0..=100.0).contains(&percent) || percent.fract() != 0.0 {
                return Err(GameError::InvalidPercent { symbol: symbol.clone(), percent });
            }
        }
        let total = self.total();
        if total != 100.0 {
            return Err(GameError::AllocationSum { total });
        }
        Ok(())
    }
}

impl FromIterator<(Symbol, f64)> for Allocation {
    fn from_iter<I: IntoIterator<Item = (Symbol, f64)>>(iter: I) -> Self {
        Allocation(iter.into_iter().collect())
    }
}
