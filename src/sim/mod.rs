//! Host-side simulation of the board peripherals.
//!
//! Used by the tests and the demo to run drivers, the bus protocol and full
//! dispense sequences without hardware.

mod bus;
mod delay;
mod pins;
mod pwm;

pub use bus::{SimAxis, SimBus, SimBusError};
pub use delay::{SimClock, SimDelay, TICK_NS};
pub use pins::{SimDriverPins, SimPin};
pub use pwm::{SimCounter, SimPulse, SimPwm, SLICES};

use crate::motor::StepperDriver;

/// Driver wired to simulated peripherals.
pub type SimDriver = StepperDriver<SimPin, SimPulse, SimCounter>;
