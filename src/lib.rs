pub mod analysis;
pub mod config;
pub mod error;
pub mod events;
pub mod gbm;
pub mod portfolio;
pub mod scoring;
pub mod seed;
pub mod session;
pub mod shocks;
pub mod types;

pub use error::{GameError, Result};
