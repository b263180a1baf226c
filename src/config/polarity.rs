//! Line polarity configuration.

use serde::Deserialize;

/// Electrical level that means "asserted" on a control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Asserted when driven high.
    ActiveHigh,
    /// Asserted when driven low.
    #[default]
    ActiveLow,
}

impl Polarity {
    /// Pin level (true = high) for the requested logical state.
    #[inline]
    pub const fn level(self, asserted: bool) -> bool {
        match self {
            Polarity::ActiveHigh => asserted,
            Polarity::ActiveLow => !asserted,
        }
    }
}

/// Polarity of every driver control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LinePolarities {
    /// Enable line (asserted = coils energised).
    #[serde(default)]
    pub enable: Polarity,
    /// Sleep line (asserted = driver asleep).
    #[serde(default)]
    pub sleep: Polarity,
    /// Reset line (asserted = driver held in reset).
    #[serde(default)]
    pub reset: Polarity,
    /// Direction line (asserted = forward).
    #[serde(default)]
    pub direction: Polarity,
}

impl Default for LinePolarities {
    fn default() -> Self {
        Self {
            enable: Polarity::ActiveLow,
            sleep: Polarity::ActiveLow,
            reset: Polarity::ActiveLow,
            direction: Polarity::ActiveLow,
        }
    }
}
