//! Driver motion state.
//!
//! The wrap interrupt can end a bounded move behind the caller's back, so
//! motion state is tracked at runtime rather than in the type.

/// Direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Plunger/stage moves forward (direction line asserted).
    Forward,
    /// Plunger/stage moves backward (direction line released).
    Backward,
}

/// What the step output is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionState {
    /// Step output disabled.
    #[default]
    Idle,
    /// Pulsing until `stop()`.
    RunningContinuous(Direction),
    /// Pulsing until the counter wraps after `target` pulses.
    RunningBounded {
        /// Direction of the move.
        direction: Direction,
        /// Pulses requested.
        target: u32,
    },
}

impl MotionState {
    /// Whether the step output is disabled.
    #[inline]
    pub fn is_idle(self) -> bool {
        self == MotionState::Idle
    }
}

/// Observable driver state: motion state folded with the enable line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverState {
    /// Coils not energised and no pulses.
    Disabled,
    /// Enabled, no pulses.
    Idle,
    /// Continuous move in progress.
    RunningContinuous,
    /// Bounded move in progress.
    RunningBounded,
}

impl DriverState {
    /// Fold motion and enable state together.
    ///
    /// Live pulses take precedence: disabling does not stop them.
    pub fn from_parts(motion: MotionState, enabled: bool) -> Self {
        match motion {
            MotionState::RunningContinuous(_) => DriverState::RunningContinuous,
            MotionState::RunningBounded { .. } => DriverState::RunningBounded,
            MotionState::Idle if enabled => DriverState::Idle,
            MotionState::Idle => DriverState::Disabled,
        }
    }

    /// Get the state name as a static string.
    pub fn name(self) -> &'static str {
        match self {
            DriverState::Disabled => "Disabled",
            DriverState::Idle => "Idle",
            DriverState::RunningContinuous => "RunningContinuous",
            DriverState::RunningBounded => "RunningBounded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_folding() {
        assert_eq!(DriverState::from_parts(MotionState::Idle, false), DriverState::Disabled);
        assert_eq!(DriverState::from_parts(MotionState::Idle, true), DriverState::Idle);
        assert_eq!(
            DriverState::from_parts(MotionState::RunningContinuous(Direction::Forward), false),
            DriverState::RunningContinuous
        );
    }
}
