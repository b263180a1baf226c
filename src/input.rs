//! Edge input bindings.
//!
//! Every button line shares one edge interrupt. The handler passes the line
//! and the event bits to [`EdgeDispatcher`], which looks up the bound
//! [`Action`]. Actions only touch the local driver and the coordination
//! flags, so they are safe to perform inside the interrupt.

use embedded_hal::digital::OutputPin;
use heapless::Vec;
use serde::Deserialize;

use crate::config::SystemConfig;
use crate::error::{ConfigError, Result};
use crate::motor::{AxisSlot, DriverTable, PulseCounter, StepPulse, StepperDriver};
use crate::protocol::CoordinationFlags;

/// Maximum number of bindings.
pub const MAX_BINDINGS: usize = 16;

/// Event bit for a falling edge in the edge interrupt status.
pub const EVENT_EDGE_FALL: u32 = 0x4;
/// Event bit for a rising edge in the edge interrupt status.
pub const EVENT_EDGE_RISE: u32 = 0x8;

/// Steps moved by the bench jog buttons.
pub const JOG_STEPS: u32 = 15;

/// Signal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
}

impl Edge {
    /// Edges present in an event mask, falling first.
    pub fn from_events(events: u32) -> impl Iterator<Item = Edge> {
        [
            (EVENT_EDGE_FALL, Edge::Falling),
            (EVENT_EDGE_RISE, Edge::Rising),
        ]
        .into_iter()
        .filter(move |(bit, _)| events & bit != 0)
        .map(|(_, edge)| edge)
    }
}

/// What an input edge does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Bounded forward move.
    ForwardBy(u32),
    /// Bounded backward move.
    BackwardBy(u32),
    /// Continuous forward motion.
    Forward,
    /// Continuous backward motion.
    Backward,
    /// Stop the local driver.
    Stop,
    /// Request a sequence start on the master board.
    StartSequence,
    /// Drive the status indicator.
    Indicator(bool),
}

/// Result of performing an action that the caller must apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    /// Nothing left to do.
    None,
    /// Set the status indicator.
    Indicator(bool),
}

impl Action {
    /// Perform the action on the driver in `slot` and the board flags.
    ///
    /// Motion actions are dropped on boards without a local driver.
    pub fn perform<P, PWM, CNT, const N: usize>(
        self,
        table: &DriverTable<StepperDriver<P, PWM, CNT>, N>,
        slot: Option<AxisSlot>,
        flags: &CoordinationFlags,
    ) -> Result<Effect>
    where
        P: OutputPin,
        PWM: StepPulse,
        CNT: PulseCounter,
    {
        let motion = match self {
            Action::StartSequence => {
                flags.request_start();
                return Ok(Effect::None);
            }
            Action::Indicator(on) => return Ok(Effect::Indicator(on)),
            motion => motion,
        };

        let Some(slot) = slot else {
            warn!("motion input ignored, no local driver");
            return Ok(Effect::None);
        };
        table.with(slot, |driver| match motion {
            Action::ForwardBy(steps) => driver.forward_by(steps),
            Action::BackwardBy(steps) => driver.backward_by(steps),
            Action::Forward => driver.forward(),
            Action::Backward => driver.backward(),
            _ => driver.stop(),
        })??;
        Ok(Effect::None)
    }
}

/// One (line, edge) to action binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Binding {
    /// Input line number.
    pub line: u8,
    /// Edge that triggers the action.
    pub edge: Edge,
    /// Action to perform.
    pub action: Action,
}

impl Binding {
    /// Create a binding.
    pub const fn new(line: u8, edge: Edge, action: Action) -> Self {
        Self { line, edge, action }
    }
}

/// Lookup from (line, edge) to action.
#[derive(Debug, Clone, Default)]
pub struct EdgeDispatcher {
    bindings: Vec<Binding, MAX_BINDINGS>,
}

impl EdgeDispatcher {
    /// Dispatcher with no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bench wiring: line 0 jogs forward, line 1 jogs backward, line 13
    /// mirrors its level on the indicator.
    pub fn bench_defaults() -> Self {
        let mut bindings = Vec::new();
        for binding in [
            Binding::new(0, Edge::Rising, Action::ForwardBy(JOG_STEPS)),
            Binding::new(1, Edge::Rising, Action::BackwardBy(JOG_STEPS)),
            Binding::new(13, Edge::Rising, Action::Indicator(true)),
            Binding::new(13, Edge::Falling, Action::Indicator(false)),
        ] {
            let _ = bindings.push(binding);
        }
        Self { bindings }
    }

    /// Bindings from configuration, or the bench defaults when none are
    /// configured.
    pub fn from_config(config: &SystemConfig) -> Self {
        if config.inputs.is_empty() {
            Self::bench_defaults()
        } else {
            Self {
                bindings: config.inputs.clone(),
            }
        }
    }

    /// Bind `action` to `line` and `edge`, replacing an existing binding.
    pub fn bind(&mut self, line: u8, edge: Edge, action: Action) -> Result<()> {
        if let Some(existing) = self
            .bindings
            .iter_mut()
            .find(|b| b.line == line && b.edge == edge)
        {
            existing.action = action;
            return Ok(());
        }
        self.bindings
            .push(Binding::new(line, edge, action))
            .map_err(|_| ConfigError::RegistryFull)?;
        Ok(())
    }

    /// Action bound to `line` and `edge`.
    pub fn dispatch(&self, line: u8, edge: Edge) -> Option<Action> {
        self.bindings
            .iter()
            .find(|b| b.line == line && b.edge == edge)
            .map(|b| b.action)
    }

    /// Actions for every edge in an interrupt event mask.
    pub fn dispatch_events(&self, line: u8, events: u32) -> Vec<Action, 2> {
        let mut actions = Vec::new();
        for edge in Edge::from_events(events) {
            if let Some(action) = self.dispatch(line, edge) {
                let _ = actions.push(action);
            }
        }
        actions
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
