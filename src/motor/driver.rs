//! Stepper actuator driver.
//!
//! Generic over embedded-hal 1.0 output pins plus the step pulse and pulse
//! counter peripherals. Bounded moves are counted in hardware: the step output
//! feeds an edge counter whose wrap interrupt ends the move, so the step count
//! does not depend on software timing.

use embedded_hal::digital::OutputPin;
use heapless::String;

use crate::config::units::{Hertz, Microsteps};
use crate::error::{DriverError, Precondition, Result};

use super::lines::DriverLines;
use super::peripheral::{CounterId, PulseCounter, StepPulse};
use super::state::{Direction, DriverState, MotionState};

/// Longest bounded move the 16-bit pulse counter can count.
pub const MAX_BOUNDED_STEPS: u32 = 65_536;

/// Stepper actuator driver.
///
/// Generic over:
/// - `P`: control line pin type (must implement `OutputPin`)
/// - `PWM`: step pulse output (must implement `StepPulse`)
/// - `CNT`: edge counter wired to the step output (must implement `PulseCounter`)
///
/// The driver owns every line and peripheral it is given; nothing else may
/// write them.
pub struct StepperDriver<P, PWM, CNT>
where
    P: OutputPin,
    PWM: StepPulse,
    CNT: PulseCounter,
{
    /// Driver name for logging/debugging.
    name: String<32>,

    /// Enable, sleep, reset, direction and microstep lines.
    lines: DriverLines<P>,

    /// Step pulse output.
    pulse: PWM,

    /// Edge counter bound to the step output.
    counter: CNT,

    /// Fixed step frequency.
    step_frequency: Hertz,

    /// Current microstep resolution.
    microsteps: Microsteps,

    /// What the step output is doing.
    motion: MotionState,

    /// Whether the enable line is asserted.
    enabled: bool,

    /// Whether the sleep line is asserted.
    asleep: bool,

    /// Bounded moves finished by the wrap interrupt.
    completed_moves: u32,
}

impl<P, PWM, CNT> StepperDriver<P, PWM, CNT>
where
    P: OutputPin,
    PWM: StepPulse,
    CNT: PulseCounter,
{
    /// Create a driver. Lines are not driven until `init`.
    pub(crate) fn new(
        name: String<32>,
        lines: DriverLines<P>,
        pulse: PWM,
        counter: CNT,
        step_frequency: Hertz,
        microsteps: Microsteps,
    ) -> Self {
        Self {
            name,
            lines,
            pulse,
            counter,
            step_frequency,
            microsteps,
            motion: MotionState::Idle,
            enabled: false,
            asleep: false,
            completed_moves: 0,
        }
    }

    /// Put every line and peripheral into its safe default: coils disabled,
    /// sleep and reset released, microsteps selected, pulses and counter off.
    pub(crate) fn init(&mut self) -> Result<()> {
        self.lines.enable.deassert()?;
        self.lines.sleep.deassert()?;
        self.lines.reset.deassert()?;
        self.lines.select_microsteps(self.microsteps)?;

        self.pulse
            .set_enabled(false)
            .map_err(|_| DriverError::PulseError)?;
        self.pulse
            .set_frequency(self.step_frequency)
            .map_err(|_| DriverError::PulseError)?;
        self.disarm_counter()?;

        self.motion = MotionState::Idle;
        self.enabled = false;
        self.asleep = false;

        info!(
            "driver initialised: {} Hz, 1/{} step",
            self.step_frequency.0,
            self.microsteps.value()
        );
        Ok(())
    }

    /// Get the driver name.
    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Current motion state.
    #[inline]
    pub fn motion(&self) -> MotionState {
        self.motion
    }

    /// Observable state including the enable line.
    #[inline]
    pub fn state(&self) -> DriverState {
        DriverState::from_parts(self.motion, self.enabled)
    }

    /// Whether the coils are energised.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the driver chip is asleep.
    #[inline]
    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    /// Configured step frequency.
    #[inline]
    pub fn step_frequency(&self) -> Hertz {
        self.step_frequency
    }

    /// Current microstep resolution.
    #[inline]
    pub fn microsteps(&self) -> Microsteps {
        self.microsteps
    }

    /// Identifier of the bound pulse counter.
    #[inline]
    pub fn counter_id(&self) -> CounterId {
        self.counter.id()
    }

    /// Edges counted in the current bounded move.
    #[inline]
    pub fn pulses_counted(&self) -> u32 {
        self.counter.count()
    }

    /// Bounded moves ended by the wrap interrupt since construction.
    #[inline]
    pub fn completed_moves(&self) -> u32 {
        self.completed_moves
    }

    /// Energise the coils. Calling it again changes nothing.
    pub fn enable(&mut self) -> Result<()> {
        self.lines.enable.assert()?;
        self.enabled = true;
        debug!("driver enabled");
        Ok(())
    }

    /// Remove coil current.
    ///
    /// Does not stop the step output; call `stop` first.
    pub fn disable(&mut self) -> Result<()> {
        self.lines.enable.deassert()?;
        self.enabled = false;
        debug!("driver disabled");
        Ok(())
    }

    /// Put the driver chip into low-power sleep.
    pub fn sleep(&mut self) -> Result<()> {
        self.lines.sleep.assert()?;
        self.asleep = true;
        Ok(())
    }

    /// Wake the driver chip.
    pub fn wake(&mut self) -> Result<()> {
        self.lines.sleep.deassert()?;
        self.asleep = false;
        Ok(())
    }

    /// Change the microstep resolution.
    ///
    /// # Errors
    ///
    /// `MotionActive` while the step output is live.
    pub fn set_microsteps(&mut self, microsteps: Microsteps) -> Result<()> {
        if !self.motion.is_idle() {
            return Err(Precondition::MotionActive.into());
        }
        self.lines.select_microsteps(microsteps)?;
        self.microsteps = microsteps;
        Ok(())
    }

    /// Start pulsing forward until `stop`.
    ///
    /// Idempotent while already running forward.
    ///
    /// # Errors
    ///
    /// `DirectionReversal` while running backward, `MotionActive` during a
    /// bounded move.
    pub fn forward(&mut self) -> Result<()> {
        self.run(Direction::Forward)
    }

    /// Start pulsing backward until `stop`.
    ///
    /// Idempotent while already running backward.
    ///
    /// # Errors
    ///
    /// `DirectionReversal` while running forward, `MotionActive` during a
    /// bounded move.
    pub fn backward(&mut self) -> Result<()> {
        self.run(Direction::Backward)
    }

    /// Move forward by exactly `steps` pulses, stopping in hardware.
    ///
    /// # Errors
    ///
    /// `ZeroLengthMove` for zero, `StepCountTooLarge` beyond
    /// [`MAX_BOUNDED_STEPS`], `MotionActive` while any move is running.
    pub fn forward_by(&mut self, steps: u32) -> Result<()> {
        self.move_by(Direction::Forward, steps)
    }

    /// Move backward by exactly `steps` pulses, stopping in hardware.
    ///
    /// # Errors
    ///
    /// Same as [`forward_by`](Self::forward_by).
    pub fn backward_by(&mut self, steps: u32) -> Result<()> {
        self.move_by(Direction::Backward, steps)
    }

    /// Disable the step output immediately.
    ///
    /// A bounded move is abandoned and its counter disarmed and zeroed.
    /// No-op while idle. A pulse already on the wire may or may not complete.
    pub fn stop(&mut self) -> Result<()> {
        match self.motion {
            MotionState::Idle => return Ok(()),
            MotionState::RunningContinuous(_) => {
                self.pulse
                    .set_enabled(false)
                    .map_err(|_| DriverError::PulseError)?;
            }
            MotionState::RunningBounded { .. } => {
                self.pulse
                    .set_enabled(false)
                    .map_err(|_| DriverError::PulseError)?;
                self.disarm_counter()?;
            }
        }
        debug!("stopped from {}", self.state().name());
        self.motion = MotionState::Idle;
        Ok(())
    }

    /// Service the counter wrap interrupt.
    ///
    /// Called from the shared wrap interrupt handler. Stops the step output,
    /// disables and zeroes the counter and acknowledges the interrupt. Only
    /// register writes happen here.
    pub fn on_wrap(&mut self) -> Result<()> {
        match self.motion {
            MotionState::RunningBounded { target, .. } => {
                self.pulse
                    .set_enabled(false)
                    .map_err(|_| DriverError::PulseError)?;
                self.disarm_counter()?;
                self.motion = MotionState::Idle;
                self.completed_moves = self.completed_moves.wrapping_add(1);
                trace!("bounded move of {} steps complete", target);
            }
            _ => {
                self.counter
                    .clear_wrap()
                    .map_err(|_| DriverError::CounterError)?;
                warn!("spurious wrap on counter {}", self.counter.id().0);
            }
        }
        Ok(())
    }

    fn run(&mut self, direction: Direction) -> Result<()> {
        match self.motion {
            MotionState::RunningContinuous(current) if current == direction => return Ok(()),
            MotionState::RunningContinuous(_) => {
                return Err(Precondition::DirectionReversal.into());
            }
            MotionState::RunningBounded { .. } => return Err(Precondition::MotionActive.into()),
            MotionState::Idle => {}
        }

        self.set_direction(direction)?;
        self.pulse
            .set_enabled(true)
            .map_err(|_| DriverError::PulseError)?;
        self.motion = MotionState::RunningContinuous(direction);
        debug!("running continuous {}", direction);
        Ok(())
    }

    fn move_by(&mut self, direction: Direction, steps: u32) -> Result<()> {
        if steps == 0 {
            return Err(Precondition::ZeroLengthMove.into());
        }
        if steps > MAX_BOUNDED_STEPS {
            return Err(Precondition::StepCountTooLarge(steps).into());
        }
        if !self.motion.is_idle() {
            return Err(Precondition::MotionActive.into());
        }

        self.set_direction(direction)?;
        self.counter.reset().map_err(|_| DriverError::CounterError)?;
        self.counter
            .arm(steps)
            .map_err(|_| DriverError::CounterError)?;
        self.counter
            .set_enabled(true)
            .map_err(|_| DriverError::CounterError)?;
        if self.pulse.set_enabled(true).is_err() {
            // Leave no armed counter behind an idle driver
            self.disarm_counter()?;
            return Err(DriverError::PulseError.into());
        }
        self.motion = MotionState::RunningBounded {
            direction,
            target: steps,
        };
        debug!("bounded move {} x{}", direction, steps);
        Ok(())
    }

    fn set_direction(&mut self, direction: Direction) -> Result<()> {
        self.lines.direction.set(direction == Direction::Forward)?;
        Ok(())
    }

    fn disarm_counter(&mut self) -> Result<()> {
        self.counter
            .set_enabled(false)
            .map_err(|_| DriverError::CounterError)?;
        self.counter.reset().map_err(|_| DriverError::CounterError)?;
        self.counter
            .clear_wrap()
            .map_err(|_| DriverError::CounterError)?;
        Ok(())
    }
}
