//! Step pulse clock divider.
//!
//! The step output runs a free-running 16-bit PWM period at 50% duty, so the
//! only knob for the step frequency is the fractional clock divider in front
//! of the counter.

use libm::{floorf, roundf};

use crate::error::ConfigError;

use super::units::Hertz;

/// Fractional PWM clock divider in 8.4 fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmDivider {
    /// Integer part, 1..=255.
    pub integer: u8,
    /// Sixteenths, 0..=15.
    pub fraction: u8,
}

impl PwmDivider {
    /// Counter ticks per step pulse (full 16-bit wrap).
    pub const PERIOD_TICKS: u32 = 65_536;

    /// Lowest and highest whole step frequencies reachable from `sys_clock_hz`.
    pub fn reachable(sys_clock_hz: u32) -> (u32, u32) {
        let min = sys_clock_hz / (Self::PERIOD_TICKS * 256) + 1;
        let max = sys_clock_hz / Self::PERIOD_TICKS;
        (min, max)
    }

    /// Compute the divider that produces `step` from `sys_clock_hz`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidStepFrequency` when the divider would fall
    /// outside [1, 256).
    pub fn for_step_frequency(sys_clock_hz: u32, step: Hertz) -> Result<Self, ConfigError> {
        let (min, max) = Self::reachable(sys_clock_hz);
        if step.0 < min || step.0 > max {
            return Err(ConfigError::InvalidStepFrequency {
                requested: step.0,
                min,
                max,
            });
        }

        let div = sys_clock_hz as f32 / (Self::PERIOD_TICKS as f32 * step.0 as f32);
        let whole = floorf(div);
        let mut integer = whole as u16;
        let mut fraction = roundf((div - whole) * 16.0) as u16;
        if fraction == 16 {
            fraction = 0;
            integer += 1;
        }
        if integer > 255 {
            integer = 255;
            fraction = 15;
        }

        Ok(Self {
            integer: integer as u8,
            fraction: fraction as u8,
        })
    }

    /// Divider as a real number.
    #[inline]
    pub fn as_f32(self) -> f32 {
        self.integer as f32 + self.fraction as f32 / 16.0
    }

    /// Step frequency actually produced from `sys_clock_hz`.
    #[inline]
    pub fn actual_frequency(self, sys_clock_hz: u32) -> f32 {
        sys_clock_hz as f32 / (Self::PERIOD_TICKS as f32 * self.as_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYS_CLK: u32 = 125_000_000;

    #[test]
    fn test_reachable_range() {
        assert_eq!(PwmDivider::reachable(SYS_CLK), (8, 1907));
    }

    #[test]
    fn test_fifteen_hz() {
        let div = PwmDivider::for_step_frequency(SYS_CLK, Hertz(15)).unwrap();
        assert_eq!(div.integer, 127);
        assert!((div.actual_frequency(SYS_CLK) - 15.0).abs() < 0.1);
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            PwmDivider::for_step_frequency(SYS_CLK, Hertz(5)),
            Err(ConfigError::InvalidStepFrequency { requested: 5, .. })
        ));
        assert!(PwmDivider::for_step_frequency(SYS_CLK, Hertz(2000)).is_err());
    }

    #[test]
    fn test_extremes_stay_in_register_range() {
        let low = PwmDivider::for_step_frequency(SYS_CLK, Hertz(8)).unwrap();
        assert!(low.integer >= 1);
        let high = PwmDivider::for_step_frequency(SYS_CLK, Hertz(1907)).unwrap();
        assert_eq!(high.integer, 1);
    }
}
