//! Actuator driver configuration from TOML.

use heapless::String;
use serde::Deserialize;

use super::polarity::LinePolarities;
use super::units::{Hertz, Microsteps};

/// Complete actuator driver configuration from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// Human-readable name (max 32 chars).
    pub name: String<32>,

    /// Fixed step pulse frequency.
    #[serde(rename = "step_frequency_hz")]
    pub step_frequency: Hertz,

    /// Microstep setting (1, 2, 4, 8 or 16).
    #[serde(default)]
    pub microsteps: Microsteps,

    /// Active level of each control line.
    #[serde(default)]
    pub polarity: LinePolarities,
}

impl DriverConfig {
    /// Create a configuration with default polarities and full stepping.
    pub fn new(name: &str, step_frequency: Hertz) -> Self {
        Self {
            name: String::try_from(name).unwrap_or_default(),
            step_frequency,
            microsteps: Microsteps::FULL,
            polarity: LinePolarities::default(),
        }
    }
}
