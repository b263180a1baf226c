//! Driver table shared between the main loop and the wrap interrupt.
//!
//! All counters share one wrap interrupt. The handler reads the pending mask
//! and hands it to [`DriverTable::on_wrap_mask`], which resolves each set bit
//! to the driver owning that counter. Drivers live in a fixed arena behind a
//! critical-section mutex, addressed by [`AxisSlot`].

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::OutputPin;
use heapless::Vec;

use crate::error::{DriverError, Error, Result};

use super::driver::StepperDriver;
use super::peripheral::{CounterId, PulseCounter, StepPulse};

/// Something the wrap interrupt can service.
pub trait WrapTarget {
    /// Counter whose wrap this target handles.
    fn counter_id(&self) -> CounterId;

    /// Handle the wrap.
    fn on_wrap(&mut self) -> Result<()>;
}

impl<P, PWM, CNT> WrapTarget for StepperDriver<P, PWM, CNT>
where
    P: OutputPin,
    PWM: StepPulse,
    CNT: PulseCounter,
{
    fn counter_id(&self) -> CounterId {
        StepperDriver::counter_id(self)
    }

    fn on_wrap(&mut self) -> Result<()> {
        StepperDriver::on_wrap(self)
    }
}

/// Index of a driver in a [`DriverTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisSlot(usize);

impl AxisSlot {
    /// Raw arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Fixed-capacity arena of drivers reachable from interrupt context.
///
/// ```rust,ignore
/// static AXES: DriverTable<Plunger, 2> = DriverTable::new();
///
/// #[interrupt]
/// fn PWM_IRQ_WRAP() {
///     let pending = pwm_irq_status();
///     let serviced = AXES.on_wrap_mask(pending).unwrap_or(0);
///     // Acknowledge wraps no driver owns, or the interrupt fires again
///     pwm_irq_clear(pending & !serviced);
/// }
/// ```
pub struct DriverTable<D, const N: usize> {
    slots: Mutex<RefCell<Vec<D, N>>>,
}

impl<D, const N: usize> DriverTable<D, N> {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new(Vec::new())),
        }
    }
}

impl<D, const N: usize> Default for DriverTable<D, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: WrapTarget, const N: usize> DriverTable<D, N> {
    /// Add a driver.
    ///
    /// # Errors
    ///
    /// `TableFull` when all `N` slots are used, `DuplicateCounter` when another
    /// driver already owns the same counter, `InvalidCounter` when the counter
    /// has no bit in the wrap status mask.
    pub fn insert(&self, driver: D) -> Result<AxisSlot> {
        let id = driver.counter_id();
        if id.mask() == 0 {
            return Err(Error::Driver(DriverError::InvalidCounter(id.0)));
        }
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            if slots.iter().any(|d| d.counter_id() == id) {
                return Err(Error::Driver(DriverError::DuplicateCounter(id.0)));
            }
            let index = slots.len();
            slots
                .push(driver)
                .map_err(|_| Error::Driver(DriverError::TableFull))?;
            Ok(AxisSlot(index))
        })
    }

    /// Run `f` on the driver in `slot` with interrupts masked.
    ///
    /// Keep `f` short: the wrap interrupt waits for it.
    pub fn with<R>(&self, slot: AxisSlot, f: impl FnOnce(&mut D) -> R) -> Result<R> {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            let driver = slots
                .get_mut(slot.0)
                .ok_or(Error::Driver(DriverError::UnknownSlot(slot.0)))?;
            Ok(f(driver))
        })
    }

    /// Service a wrap on one counter. Returns whether a driver owned it.
    pub fn on_wrap(&self, counter: CounterId) -> Result<bool> {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            match slots.iter_mut().find(|d| d.counter_id() == counter) {
                Some(driver) => driver.on_wrap().map(|_| true),
                None => Ok(false),
            }
        })
    }

    /// Service every counter whose bit is set in `mask`.
    ///
    /// Every matching driver is serviced even if one fails; the first error is
    /// returned. On success returns the mask of serviced counters.
    pub fn on_wrap_mask(&self, mask: u32) -> Result<u32> {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            let mut serviced = 0;
            let mut first_error = None;
            for driver in slots.iter_mut() {
                let bit = driver.counter_id().mask();
                if mask & bit == 0 {
                    continue;
                }
                match driver.on_wrap() {
                    Ok(()) => serviced |= bit,
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
            match first_error {
                Some(e) => Err(e),
                None => Ok(serviced),
            }
        })
    }

    /// Number of drivers in the table.
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.slots.borrow_ref(cs).len())
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
