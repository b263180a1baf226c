//! Simulated output pins.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::motor::StepperDriverBuilder;

use super::pwm::{SimCounter, SimPulse, SimPwm};

/// Output pin whose level can be read back. Clones share the level.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Rc<Cell<Option<bool>>>,
}

impl SimPin {
    /// An undriven pin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last level written, `None` if never driven.
    pub fn level(&self) -> Option<bool> {
        self.level.get()
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(Some(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.set(Some(true));
        Ok(())
    }
}

/// Every pin of one driver chip, kept for inspection after the driver takes
/// its clones.
#[derive(Debug, Clone, Default)]
pub struct SimDriverPins {
    /// ENABLE.
    pub enable: SimPin,
    /// SLEEP.
    pub sleep: SimPin,
    /// RESET.
    pub reset: SimPin,
    /// DIR.
    pub direction: SimPin,
    /// MS1..MS3.
    pub microstep: [SimPin; 3],
}

impl SimDriverPins {
    /// Fresh undriven pins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder wired to these pins, pulsing on `step_slice` and counting
    /// with `counter_slice`.
    pub fn builder(
        &self,
        pwm: &SimPwm,
        step_slice: u8,
        counter_slice: u8,
    ) -> StepperDriverBuilder<SimPin, SimPulse, SimCounter> {
        StepperDriverBuilder::new()
            .enable_pin(self.enable.clone())
            .sleep_pin(self.sleep.clone())
            .reset_pin(self.reset.clone())
            .dir_pin(self.direction.clone())
            .microstep_pins(self.microstep.clone())
            .step_pulse(pwm.step_output(step_slice))
            .pulse_counter(pwm.edge_counter(counter_slice, step_slice))
    }
}
