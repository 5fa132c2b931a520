use thiserror::Error;

use crate::types::{Symbol, Turn};

pub type Result<T> = std::result::Result<T, GameError>;

/// Input-contract violations and loading failures.
///
/// Every variant is returned before any session state is touched. Numeric
/// degeneracy (a flat value history) is not an error, and broken internal
/// invariants panic instead of surfacing here.
#[derive(Error, Debug)]
pub enum GameError {
    #[error("allocation must sum to 100%, got {total}%")]
    AllocationSum { total: f64 },

    #[error("{symbol}: allocation must be a whole percent between 0 and 100, got {percent}")]
    InvalidPercent { symbol: Symbol, percent: f64 },

    #[error("allocation names {symbol}, which is not in the portfolio")]
    UnknownSymbol { symbol: Symbol },

    #[error("malformed allocation entry {entry:?}: expected SYMBOL=PERCENT")]
    MalformedAllocation { entry: String },

    #[error("{symbol}: price must be positive, got {price}")]
    NonPositivePrice { symbol: Symbol, price: f64 },

    #[error("{symbol}: volatility must be non-negative, got {sigma}")]
    NegativeVolatility { symbol: Symbol, sigma: f64 },

    #[error("{symbol}: {field} is not finite ({value})")]
    NonFiniteParameter { symbol: Symbol, field: &'static str, value: f64 },

    #[error("{symbol} appears more than once")]
    DuplicateSymbol { symbol: Symbol },

    #[error("expected between {min} and {max} assets, got {actual}")]
    AssetCount { min: usize, max: usize, actual: usize },

    #[error("session already completed all {max_turns} turns")]
    SessionComplete { max_turns: u32 },

    #[error("session is on turn {completed} of {max_turns}; no final score yet")]
    SessionIncomplete { completed: Turn, max_turns: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GameError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        GameError::InvalidConfig(message.into())
    }

    /// True for errors caused by what the caller supplied, as opposed to
    /// failures reading external files.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, GameError::Io(_) | GameError::Json(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_sum_message_names_total() {
        let err = GameError::AllocationSum { total: 90.0 };
        assert_eq!(err.to_string(), "allocation must sum to 100%, got 90%");
    }

    #[test]
    fn io_errors_are_not_contract_violations() {
        let io = GameError::from(std::io::Error::other("disk"));
        assert!(!io.is_contract_violation());
        assert!(GameError::AllocationSum { total: 0.0 }.is_contract_violation());
    }
}
