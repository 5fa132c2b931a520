use std::fmt;

use serde::{Deserialize, Serialize};

/// Ticker symbol identifying one asset for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol(s.to_string())
    }
}

/// 1-based turn number. `Turn(0)` denotes the pre-simulation baseline,
/// which is also index 0 of the value history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Turn(pub u32);

impl Turn {
    pub const BASELINE: Turn = Turn(0);

    pub fn next(self) -> Self {
        Turn(self.0 + 1)
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trading-day convention: 252 sessions per year, so one simulated day
/// is `dt = 1/252` years.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Year fraction of a single trading day.
pub const TRADING_DAY_DT: f64 = 1.0 / TRADING_DAYS_PER_YEAR as f64;

/// One quarter of trading days; the canonical length of a turn.
pub const DAYS_PER_QUARTER: u32 = TRADING_DAYS_PER_YEAR / 4;
