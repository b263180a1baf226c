//! Local paste applicator used between Z drop and Z rise.

use embedded_hal::digital::OutputPin;

use crate::error::Result;
use crate::motor::{AxisSlot, DriverTable, PulseCounter, StepPulse, StepperDriver};

/// Actuator that pushes paste out at each point.
pub trait PasteApplicator {
    /// Whether a sequence may start. Checked once before the first command.
    fn is_ready(&mut self) -> bool;

    /// Start applying `steps` plunger steps. Must not block.
    fn begin_apply(&mut self, steps: u32) -> Result<()>;

    /// Whether the last application finished.
    fn is_applied(&mut self) -> bool;

    /// Nominal time `steps` plunger steps take.
    fn apply_duration_ns(&mut self, _steps: u32) -> u64 {
        0
    }

    /// Stop an application in progress. No-op when nothing runs.
    fn abort(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Board without a local applicator. Every application finishes at once.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoApplicator;

impl PasteApplicator for NoApplicator {
    fn is_ready(&mut self) -> bool {
        true
    }

    fn begin_apply(&mut self, _steps: u32) -> Result<()> {
        Ok(())
    }

    fn is_applied(&mut self) -> bool {
        true
    }
}

/// Plunger driver living in a [`DriverTable`], finished by the wrap
/// interrupt.
pub struct TableApplicator<'t, P, PWM, CNT, const N: usize>
where
    P: OutputPin,
    PWM: StepPulse,
    CNT: PulseCounter,
{
    table: &'t DriverTable<StepperDriver<P, PWM, CNT>, N>,
    slot: AxisSlot,
    started_after: Option<u32>,
}

impl<'t, P, PWM, CNT, const N: usize> TableApplicator<'t, P, PWM, CNT, N>
where
    P: OutputPin,
    PWM: StepPulse,
    CNT: PulseCounter,
{
    /// Applicator driving the plunger in `slot`.
    pub fn new(table: &'t DriverTable<StepperDriver<P, PWM, CNT>, N>, slot: AxisSlot) -> Self {
        Self {
            table,
            slot,
            started_after: None,
        }
    }
}

impl<P, PWM, CNT, const N: usize> PasteApplicator for TableApplicator<'_, P, PWM, CNT, N>
where
    P: OutputPin,
    PWM: StepPulse,
    CNT: PulseCounter,
{
    fn is_ready(&mut self) -> bool {
        self.table
            .with(self.slot, |d| d.is_enabled() && d.motion().is_idle())
            .unwrap_or(false)
    }

    fn begin_apply(&mut self, steps: u32) -> Result<()> {
        let before = self.table.with(self.slot, |d| {
            let before = d.completed_moves();
            d.forward_by(steps).map(|_| before)
        })??;
        self.started_after = Some(before);
        Ok(())
    }

    fn is_applied(&mut self) -> bool {
        let Some(before) = self.started_after else {
            return true;
        };
        self.table
            .with(self.slot, |d| {
                d.motion().is_idle() && d.completed_moves() != before
            })
            .unwrap_or(false)
    }

    fn apply_duration_ns(&mut self, steps: u32) -> u64 {
        self.table
            .with(self.slot, |d| {
                u64::from(steps).saturating_mul(d.step_frequency().period_ns())
            })
            .unwrap_or(u64::MAX)
    }

    fn abort(&mut self) -> Result<()> {
        if let Some(before) = self.started_after.take() {
            self.table.with(self.slot, |d| {
                if d.completed_moves() == before {
                    d.stop()
                } else {
                    Ok(())
                }
            })??;
        }
        Ok(())
    }
}
