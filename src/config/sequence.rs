//! Dispense sequence configuration from TOML.

use heapless::Vec;
use serde::Deserialize;

use crate::error::ConfigError;

use super::units::Point;

/// Maximum number of points in one sequence.
pub const MAX_POINTS: usize = 32;

/// One dispense pass over a list of X-Y points.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceConfig {
    /// Ordered X-Y targets.
    pub points: Vec<Point, MAX_POINTS>,

    /// Z target that brings the nozzle down to the work.
    pub z_drop: i32,

    /// Z target that lifts the nozzle clear.
    pub z_rise: i32,

    /// Plunger steps applied at each point.
    #[serde(default = "default_apply_steps")]
    pub apply_steps: u32,

    /// X-Y target after the last point.
    #[serde(default)]
    pub origin: Point,
}

fn default_apply_steps() -> u32 {
    15
}

impl SequenceConfig {
    /// Create a sequence with the default apply length and origin.
    ///
    /// # Errors
    ///
    /// `TooManyPoints` when `points` holds more than [`MAX_POINTS`].
    pub fn new(points: &[Point], z_drop: i32, z_rise: i32) -> Result<Self, ConfigError> {
        let list = Vec::from_slice(points).map_err(|_| ConfigError::TooManyPoints(points.len()))?;
        Ok(Self {
            points: list,
            z_drop,
            z_rise,
            apply_steps: default_apply_steps(),
            origin: Point::ORIGIN,
        })
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the sequence has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
