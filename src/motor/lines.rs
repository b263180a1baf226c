//! Digital control lines with explicit polarity.

use embedded_hal::digital::OutputPin;

use crate::config::units::Microsteps;
use crate::config::Polarity;
use crate::error::DriverError;

/// An output pin plus the level that means "asserted".
pub struct ControlLine<P: OutputPin> {
    pin: P,
    polarity: Polarity,
}

impl<P: OutputPin> ControlLine<P> {
    /// Wrap a pin. The line is not driven until the first `set`.
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    /// Drive the line to the requested logical state.
    pub fn set(&mut self, asserted: bool) -> Result<(), DriverError> {
        if self.polarity.level(asserted) {
            self.pin.set_high().map_err(|_| DriverError::PinError)?;
        } else {
            self.pin.set_low().map_err(|_| DriverError::PinError)?;
        }
        Ok(())
    }

    /// Drive the line to its active level.
    #[inline]
    pub fn assert(&mut self) -> Result<(), DriverError> {
        self.set(true)
    }

    /// Drive the line to its inactive level.
    #[inline]
    pub fn deassert(&mut self) -> Result<(), DriverError> {
        self.set(false)
    }
}

/// All digital lines of one stepper driver chip.
pub struct DriverLines<P: OutputPin> {
    /// Coil drive enable.
    pub enable: ControlLine<P>,
    /// Low-power sleep.
    pub sleep: ControlLine<P>,
    /// Chip reset.
    pub reset: ControlLine<P>,
    /// Direction select.
    pub direction: ControlLine<P>,
    /// MS1..MS3 resolution select, active high.
    pub microstep: [P; 3],
}

impl<P: OutputPin> DriverLines<P> {
    /// Drive MS1..MS3 for the requested resolution.
    pub fn select_microsteps(&mut self, microsteps: Microsteps) -> Result<(), DriverError> {
        for (pin, high) in self.microstep.iter_mut().zip(microsteps.select_levels()) {
            if high {
                pin.set_high().map_err(|_| DriverError::PinError)?;
            } else {
                pin.set_low().map_err(|_| DriverError::PinError)?;
            }
        }
        Ok(())
    }
}
