//! Simulated PWM block: step outputs and edge counters on shared slices.
//!
//! Time only moves when [`SimPwm::advance`] is called. A step output enabled
//! at time zero produces its k-th rising edge at `k / f` seconds. Each edge
//! on a slice's output is seen by every counter wired to that slice; a
//! counter at its wrap value rolls over to zero and raises its bit in the
//! shared interrupt status.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use crate::config::units::Hertz;
use crate::motor::{CounterId, PulseCounter, StepPulse};

/// Number of slices in the block.
pub const SLICES: usize = 8;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

#[derive(Debug, Default, Clone, Copy)]
struct Slice {
    frequency: u32,
    pulsing: bool,
    elapsed_ns: u64,
    emitted: u64,
    edges: u64,
    writes: u32,
    counting: bool,
    source: Option<u8>,
    wrap: u32,
    count: u32,
}

#[derive(Debug, Default)]
struct Block {
    slices: [Slice; SLICES],
    irq: u32,
}

impl Block {
    fn count_edges(&mut self, source: usize, edges: u64) {
        for id in 0..SLICES {
            let counter = &mut self.slices[id];
            if !counter.counting || counter.source != Some(source as u8) {
                continue;
            }
            for _ in 0..edges {
                if counter.count >= counter.wrap {
                    counter.count = 0;
                    self.irq |= CounterId(id as u8).mask();
                } else {
                    counter.count += 1;
                }
            }
        }
    }
}

/// Handle on the simulated PWM block. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimPwm {
    block: Rc<RefCell<Block>>,
}

impl SimPwm {
    /// All slices off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Step output on `slice`.
    pub fn step_output(&self, slice: u8) -> SimPulse {
        SimPulse {
            block: Rc::clone(&self.block),
            slice: slice as usize,
        }
    }

    /// Edge counter on `slice`, fed by the output of `source`.
    pub fn edge_counter(&self, slice: u8, source: u8) -> SimCounter {
        self.block.borrow_mut().slices[slice as usize].source = Some(source);
        SimCounter {
            block: Rc::clone(&self.block),
            slice: slice as usize,
        }
    }

    /// Let `ns` nanoseconds pass. Returns the pending wrap interrupt mask.
    pub fn advance(&self, ns: u64) -> u32 {
        let mut block = self.block.borrow_mut();
        for id in 0..SLICES {
            let slice = &mut block.slices[id];
            if !slice.pulsing || slice.frequency == 0 {
                continue;
            }
            slice.elapsed_ns += ns;
            let due = slice.elapsed_ns * u64::from(slice.frequency) / NANOS_PER_SECOND;
            let new_edges = due - slice.emitted;
            slice.emitted = due;
            slice.edges += new_edges;
            if new_edges > 0 {
                block.count_edges(id, new_edges);
            }
        }
        block.irq
    }

    /// Pending wrap interrupt mask.
    pub fn irq_status(&self) -> u32 {
        self.block.borrow().irq
    }

    /// Whether the step output on `slice` is running.
    pub fn is_pulsing(&self, slice: u8) -> bool {
        self.block.borrow().slices[slice as usize].pulsing
    }

    /// Whether the counter on `slice` is counting.
    pub fn is_counting(&self, slice: u8) -> bool {
        self.block.borrow().slices[slice as usize].counting
    }

    /// Programmed frequency of `slice`.
    pub fn frequency(&self, slice: u8) -> Hertz {
        Hertz(self.block.borrow().slices[slice as usize].frequency)
    }

    /// Wrap value of the counter on `slice`.
    pub fn wrap_value(&self, slice: u8) -> u32 {
        self.block.borrow().slices[slice as usize].wrap
    }

    /// Rising edges emitted by `slice` since creation.
    pub fn edges(&self, slice: u8) -> u64 {
        self.block.borrow().slices[slice as usize].edges
    }

    /// Register writes made to `slice`.
    pub fn writes(&self, slice: u8) -> u32 {
        self.block.borrow().slices[slice as usize].writes
    }
}

/// Step output on one slice.
#[derive(Debug)]
pub struct SimPulse {
    block: Rc<RefCell<Block>>,
    slice: usize,
}

impl StepPulse for SimPulse {
    type Error = Infallible;

    fn set_frequency(&mut self, frequency: Hertz) -> Result<(), Self::Error> {
        let mut block = self.block.borrow_mut();
        let slice = &mut block.slices[self.slice];
        slice.frequency = frequency.0;
        slice.writes += 1;
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), Self::Error> {
        let mut block = self.block.borrow_mut();
        let slice = &mut block.slices[self.slice];
        if enabled && !slice.pulsing {
            slice.elapsed_ns = 0;
            slice.emitted = 0;
        }
        slice.pulsing = enabled;
        slice.writes += 1;
        Ok(())
    }
}

/// Edge counter on one slice.
#[derive(Debug)]
pub struct SimCounter {
    block: Rc<RefCell<Block>>,
    slice: usize,
}

impl PulseCounter for SimCounter {
    type Error = Infallible;

    fn id(&self) -> CounterId {
        CounterId(self.slice as u8)
    }

    fn arm(&mut self, pulses: u32) -> Result<(), Self::Error> {
        let mut block = self.block.borrow_mut();
        let slice = &mut block.slices[self.slice];
        slice.wrap = pulses.saturating_sub(1);
        slice.writes += 1;
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), Self::Error> {
        let mut block = self.block.borrow_mut();
        let slice = &mut block.slices[self.slice];
        slice.counting = enabled;
        slice.writes += 1;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        let mut block = self.block.borrow_mut();
        let slice = &mut block.slices[self.slice];
        slice.count = 0;
        slice.writes += 1;
        Ok(())
    }

    fn clear_wrap(&mut self) -> Result<(), Self::Error> {
        let mut block = self.block.borrow_mut();
        block.irq &= !self.id().mask();
        Ok(())
    }

    fn count(&self) -> u32 {
        self.block.borrow().slices[self.slice].count
    }
}
