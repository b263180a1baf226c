//! Simulated time.

use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;

use crate::motor::{DriverTable, WrapTarget};

use super::pwm::SimPwm;

/// Granularity at which a delay hands time to its hook.
pub const TICK_NS: u64 = 100_000;

/// Shared virtual clock. Clones read the same time.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_ns: Rc<Cell<u64>>,
}

impl SimClock {
    /// Clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nanoseconds since creation.
    pub fn now_ns(&self) -> u64 {
        self.now_ns.get()
    }

    fn advance(&self, ns: u64) {
        self.now_ns.set(self.now_ns.get() + ns);
    }
}

/// Delay that advances a [`SimClock`] instead of sleeping.
///
/// An optional hook sees every tick of at most [`TICK_NS`], which is where
/// simulated peripherals and their interrupt handlers run.
pub struct SimDelay {
    clock: SimClock,
    hook: Option<Box<dyn FnMut(u64)>>,
}

impl SimDelay {
    /// Delay with a fresh clock and no hook.
    pub fn new() -> Self {
        Self {
            clock: SimClock::new(),
            hook: None,
        }
    }

    /// Delay calling `hook` with each elapsed tick.
    pub fn with_hook(hook: impl FnMut(u64) + 'static) -> Self {
        Self {
            clock: SimClock::new(),
            hook: Some(Box::new(hook)),
        }
    }

    /// Delay that runs `pwm` and services its wrap interrupts on `table`.
    pub fn servicing<D, const N: usize>(pwm: SimPwm, table: Rc<DriverTable<D, N>>) -> Self
    where
        D: WrapTarget + 'static,
    {
        Self::with_hook(move |ns| {
            let mask = pwm.advance(ns);
            if mask != 0 {
                let _ = table.on_wrap_mask(mask);
            }
        })
    }

    /// Handle on this delay's clock.
    pub fn clock(&self) -> SimClock {
        self.clock.clone()
    }
}

impl Default for SimDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        let mut remaining = u64::from(ns);
        while remaining > 0 {
            let tick = remaining.min(TICK_NS);
            self.clock.advance(tick);
            if let Some(hook) = self.hook.as_mut() {
                hook(tick);
            }
            remaining -= tick;
        }
    }
}
