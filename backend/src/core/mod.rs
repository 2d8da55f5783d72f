//! Session-wide building blocks: configuration and the period clock

pub mod config;
pub mod time;

pub use config::{ConfigError, MarketConfig, MarketPreset};
pub use time::PeriodClock;
