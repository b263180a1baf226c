//! Step pulse and pulse counter peripherals.
//!
//! embedded-hal has no trait for a gated fixed-frequency pulse train or for an
//! edge counter with a wrap interrupt, so the driver is generic over these two.
//! On the RP2040 both are PWM slices: one free-running at 50% duty on the STEP
//! pin, the other clocked by rising edges on its channel B input, which is
//! wired to the STEP pin.

use core::fmt::Debug;

use crate::config::units::Hertz;

/// Identifier of a pulse counter channel, unique per wrap interrupt source.
///
/// Used as the bit index in the shared wrap interrupt status mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CounterId(pub u8);

impl CounterId {
    /// Bit in the wrap interrupt status mask.
    #[inline]
    pub fn mask(self) -> u32 {
        1u32.checked_shl(u32::from(self.0)).unwrap_or(0)
    }
}

/// Fixed-frequency 50% duty step output.
pub trait StepPulse {
    /// Peripheral error.
    type Error: Debug;

    /// Program the output frequency. Takes effect on the next enable.
    fn set_frequency(&mut self, frequency: Hertz) -> Result<(), Self::Error>;

    /// Start or stop the pulse train atomically.
    fn set_enabled(&mut self, enabled: bool) -> Result<(), Self::Error>;
}

/// Edge counter fed from the step output.
pub trait PulseCounter {
    /// Peripheral error.
    type Error: Debug;

    /// Identifier of this counter's wrap interrupt source.
    fn id(&self) -> CounterId;

    /// Configure the counter to raise its wrap interrupt on the `pulses`-th
    /// rising edge (wrap value `pulses - 1`).
    fn arm(&mut self, pulses: u32) -> Result<(), Self::Error>;

    /// Start or stop counting edges.
    fn set_enabled(&mut self, enabled: bool) -> Result<(), Self::Error>;

    /// Zero the count.
    fn reset(&mut self) -> Result<(), Self::Error>;

    /// Acknowledge the wrap interrupt.
    fn clear_wrap(&mut self) -> Result<(), Self::Error>;

    /// Edges counted since the last reset.
    fn count(&self) -> u32;
}
