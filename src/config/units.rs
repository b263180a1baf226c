//! Unit types for physical quantities.
//!
//! Provides type-safe representations of step frequencies, microstep
//! resolutions, and axis positions to prevent unit confusion at compile time.

use serde::Deserialize;

use crate::error::ConfigError;

/// Step pulse frequency in hertz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(transparent)]
pub struct Hertz(pub u32);

impl Hertz {
    /// Create a new Hertz value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Period of one pulse in nanoseconds (rounded up).
    #[inline]
    pub fn period_ns(self) -> u64 {
        if self.0 == 0 {
            u64::MAX
        } else {
            (1_000_000_000 + u64::from(self.0) - 1) / u64::from(self.0)
        }
    }
}

/// Microstep divisor selected through the MS1..MS3 lines.
///
/// Validated at construction to be one of the resolutions the driver chip
/// decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Microsteps(u16);

impl Microsteps {
    /// Full step (no microstepping).
    pub const FULL: Self = Self(1);
    /// Half step.
    pub const HALF: Self = Self(2);
    /// Quarter step.
    pub const QUARTER: Self = Self(4);
    /// Eighth step.
    pub const EIGHTH: Self = Self(8);
    /// Sixteenth step (maximum resolution).
    pub const SIXTEENTH: Self = Self(16);

    /// Valid microstep values.
    const VALID_VALUES: [u16; 5] = [1, 2, 4, 8, 16];

    /// Create a new Microsteps value with validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMicrosteps` if the driver cannot select it.
    pub fn new(value: u16) -> Result<Self, ConfigError> {
        if Self::VALID_VALUES.contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidMicrosteps(value))
        }
    }

    /// Get the raw divisor value.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Check if a value is valid.
    #[inline]
    pub fn is_valid(value: u16) -> bool {
        Self::VALID_VALUES.contains(&value)
    }

    /// Logic levels for MS1, MS2 and MS3 (true = high).
    pub const fn select_levels(self) -> [bool; 3] {
        match self.0 {
            2 => [true, false, false],
            4 => [false, true, false],
            8 => [true, true, false],
            16 => [true, true, true],
            _ => [false, false, false],
        }
    }
}

impl Default for Microsteps {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<u16> for Microsteps {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Microsteps {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let value = u16::deserialize(deserializer)?;
        Microsteps::new(value).map_err(|e| {
            let mut buf = heapless::String::<128>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}

/// Planar target for the X-Y stage, in device position units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(from = "(i32, i32)")]
pub struct Point {
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
}

impl Point {
    /// Origin of the stage.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Create a new point.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}
