use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::events::{MarketEvent, canonical_events};
use crate::scoring::ANNUALIZATION_FACTOR;
use crate::shocks::ShockMethod;
use crate::types::{DAYS_PER_QUARTER, TRADING_DAY_DT, Turn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub seed: u64,
    pub max_turns: u32,
    /// Simulated trading days per turn.
    pub days_per_turn: u32,
    /// Length of one simulated day in years.
    pub dt: f64,
    pub starting_cash: f64,
    /// Multiplier turning the per-turn Sharpe ratio into an annual figure.
    pub annualization_factor: f64,
    /// Turns (1-based) on which a market event is drawn, while any remain.
    pub event_turns: Vec<Turn>,
    pub events: Vec<MarketEvent>,
    pub min_assets: usize,
    pub max_assets: usize,
    #[serde(default)]
    pub shock_method: ShockMethod,
}

impl GameConfig {
    pub fn canonical() -> Self {
        GameConfig {
            seed: 42,
            // Twenty quarterly turns: five simulated years.
            max_turns: 20,
            days_per_turn: DAYS_PER_QUARTER,
            dt: TRADING_DAY_DT,
            starting_cash: 1_000_000.0,
            annualization_factor: ANNUALIZATION_FACTOR,
            event_turns: vec![Turn(5), Turn(10), Turn(15), Turn(19)],
            events: canonical_events(),
            min_assets: 3,
            max_assets: 5,
            shock_method: ShockMethod::BoxMuller,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: GameConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn is_event_turn(&self, turn: Turn) -> bool {
        self.event_turns.contains(&turn)
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(GameError::invalid_config(msg));

        if self.max_turns == 0 {
            return bad("max_turns must be at least 1".into());
        }
        if self.days_per_turn == 0 {
            return bad("days_per_turn must be at least 1".into());
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return bad(format!("dt must be finite and positive, got {}", self.dt));
        }
        if !(self.starting_cash.is_finite() && self.starting_cash > 0.0) {
            return bad(format!("starting_cash must be finite and positive, got {}", self.starting_cash));
        }
        if !self.annualization_factor.is_finite() {
            return bad(format!("annualization_factor {} is not finite", self.annualization_factor));
        }
        if let Some(turn) = self.event_turns.iter().find(|t| t.0 == 0 || t.0 > self.max_turns) {
            return bad(format!("event turn {turn} outside 1..={}", self.max_turns));
        }
        if self.min_assets == 0 || self.min_assets > self.max_assets {
            return bad(format!(
                "asset range {}..={} is empty or starts at zero",
                self.min_assets, self.max_assets
            ));
        }

        let mut ids = HashSet::new();
        for event in &self.events {
            event.validate()?;
            if !ids.insert(event.id.as_str()) {
                return bad(format!("duplicate event id {}", event.id));
            }
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::canonical()
    }
}
