//! Configuration module for paste-dispenser.
//!
//! Provides types for loading and validating board, driver, bus and sequence
//! configurations from TOML files (with `std` feature) or pre-built data.

mod board;
mod driver;
#[cfg(feature = "std")]
mod loader;
mod polarity;
mod sequence;
mod system;
pub mod timing;
pub mod units;
mod validation;

pub use board::{BoardConfig, BusConfig, PollPolicy, RetryPolicy, Role, DEFAULT_SYSTEM_CLOCK_HZ};
pub use driver::DriverConfig;
pub use polarity::{LinePolarities, Polarity};
pub use sequence::{SequenceConfig, MAX_POINTS};
pub use system::SystemConfig;
pub use timing::PwmDivider;
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Hertz, Microsteps, Point};
