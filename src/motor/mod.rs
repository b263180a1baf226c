//! Motor module for paste-dispenser.
//!
//! Provides the stepper actuator driver with hardware-counted bounded moves
//! and the interrupt-safe driver table that routes counter wrap events.

mod builder;
mod driver;
pub mod lines;
pub mod peripheral;
pub mod state;
mod table;

pub use builder::StepperDriverBuilder;
pub use driver::{StepperDriver, MAX_BOUNDED_STEPS};
pub use lines::{ControlLine, DriverLines};
pub use peripheral::{CounterId, PulseCounter, StepPulse};
pub use state::{Direction, DriverState, MotionState};
pub use table::{AxisSlot, DriverTable, WrapTarget};
