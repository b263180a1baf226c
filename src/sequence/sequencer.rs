//! Master-side dispense sequencing loop.
//!
//! For every point: move X-Y, drop Z, apply paste, raise Z. Then return X-Y
//! to the origin and hand mastership to the next board. Each remote move is
//! confirmed by polling before the next command goes out.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::units::Point;
use crate::config::{SequenceConfig, SystemConfig};
use crate::error::{Result, SequenceError};
use crate::protocol::{BusMaster, Command, CoordinationFlags};

use super::applicator::PasteApplicator;

/// Remote axis commanded by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// X-Y stage.
    Xy,
    /// Z stage.
    Z,
}

/// Last target sent to a remote axis and whether it was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRecord<T> {
    /// Last commanded target.
    pub target: Option<T>,
    /// Whether the axis reported in position for `target`.
    pub confirmed: bool,
}

impl<T: Copy> AxisRecord<T> {
    const fn new() -> Self {
        Self {
            target: None,
            confirmed: false,
        }
    }

    /// Position the axis is known to be at.
    pub fn known_position(&self) -> Option<T> {
        if self.confirmed {
            self.target
        } else {
            None
        }
    }
}

/// What one completed sequence did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceReport {
    /// Points fully processed.
    pub points: u32,
    /// X-Y commands sent, return to origin included.
    pub xy_commands: u32,
    /// Z commands sent.
    pub z_commands: u32,
    /// Status polls needed after the command replies.
    pub polls: u32,
    /// Applications performed.
    pub applies: u32,
    /// Plunger steps requested in total.
    pub steps_applied: u32,
}

/// Dispense sequencing loop for the board holding mastership.
pub struct Sequencer<'f> {
    flags: &'f CoordinationFlags,
    xy_address: u8,
    z_address: u8,
    next_board: Option<u8>,
    xy: AxisRecord<Point>,
    z: AxisRecord<i32>,
    in_flight: Option<Axis>,
    paused: bool,
}

impl<'f> Sequencer<'f> {
    /// Sequencer for stages at `xy_address` and `z_address`, handing over to
    /// `next_board`.
    pub fn new(
        flags: &'f CoordinationFlags,
        xy_address: u8,
        z_address: u8,
        next_board: Option<u8>,
    ) -> Self {
        Self {
            flags,
            xy_address,
            z_address,
            next_board,
            xy: AxisRecord::new(),
            z: AxisRecord::new(),
            in_flight: None,
            paused: false,
        }
    }

    /// Sequencer using the addresses in `config`.
    pub fn from_config(flags: &'f CoordinationFlags, config: &SystemConfig) -> Self {
        Self::new(
            flags,
            config.bus.xy_address,
            config.bus.z_address,
            config.board.next_board,
        )
    }

    /// X-Y stage record.
    pub fn xy(&self) -> &AxisRecord<Point> {
        &self.xy
    }

    /// Z stage record.
    pub fn z(&self) -> &AxisRecord<i32> {
        &self.z
    }

    /// Whether the last run stopped on an error.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Run `sequence` if a start request is pending. The request is consumed.
    pub fn run_pending<I2C, D, A>(
        &mut self,
        bus: &mut BusMaster<I2C, D>,
        sequence: &SequenceConfig,
        applicator: &mut A,
    ) -> Result<Option<SequenceReport>>
    where
        I2C: I2c,
        D: DelayNs,
        A: PasteApplicator,
    {
        if !self.flags.is_master() || !self.flags.claim_start() {
            return Ok(None);
        }
        self.run(bus, sequence, applicator).map(Some)
    }

    /// Run one full sequence and hand mastership on.
    ///
    /// # Errors
    ///
    /// `NotMaster`, `NoNextBoard`, `BoardNotReady` and `ApplicatorNotReady`
    /// before anything is sent. Any bus, protocol or apply failure afterwards
    /// pauses the sequence: a running application is stopped, the start
    /// request is dropped and the axis that was being moved is left
    /// unconfirmed.
    pub fn run<I2C, D, A>(
        &mut self,
        bus: &mut BusMaster<I2C, D>,
        sequence: &SequenceConfig,
        applicator: &mut A,
    ) -> Result<SequenceReport>
    where
        I2C: I2c,
        D: DelayNs,
        A: PasteApplicator,
    {
        if !self.flags.is_master() {
            return Err(SequenceError::NotMaster.into());
        }
        let next = self.next_board.ok_or(SequenceError::NoNextBoard)?;
        if !self.flags.is_ready() {
            return Err(SequenceError::BoardNotReady.into());
        }
        if !applicator.is_ready() {
            return Err(SequenceError::ApplicatorNotReady.into());
        }

        self.paused = false;
        info!("sequence start, {} points", sequence.len());
        match self.execute(bus, sequence, applicator, next) {
            Ok(report) => {
                info!("sequence done, {} points", report.points);
                Ok(report)
            }
            Err(e) => {
                self.pause(applicator);
                Err(e)
            }
        }
    }

    fn execute<I2C, D, A>(
        &mut self,
        bus: &mut BusMaster<I2C, D>,
        sequence: &SequenceConfig,
        applicator: &mut A,
        next: u8,
    ) -> Result<SequenceReport>
    where
        I2C: I2c,
        D: DelayNs,
        A: PasteApplicator,
    {
        let mut report = SequenceReport::default();
        for point in &sequence.points {
            self.move_xy(bus, *point, &mut report)?;
            self.move_z(bus, sequence.z_drop, &mut report)?;
            self.apply(bus, applicator, sequence.apply_steps, &mut report)?;
            self.move_z(bus, sequence.z_rise, &mut report)?;
            report.points += 1;
        }
        self.move_xy(bus, sequence.origin, &mut report)?;
        bus.hand_over(self.flags, next)?;
        Ok(report)
    }

    fn move_xy<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut BusMaster<I2C, D>,
        point: Point,
        report: &mut SequenceReport,
    ) -> Result<()> {
        self.ensure_master()?;
        self.xy.target = Some(point);
        self.xy.confirmed = false;
        self.in_flight = Some(Axis::Xy);

        report.xy_commands += 1;
        report.polls += bus.command_and_wait(self.xy_address, &Command::MoveXy(point))?;

        self.xy.confirmed = true;
        self.in_flight = None;
        debug!("xy at ({}, {})", point.x, point.y);
        Ok(())
    }

    fn move_z<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut BusMaster<I2C, D>,
        z: i32,
        report: &mut SequenceReport,
    ) -> Result<()> {
        self.ensure_master()?;
        self.z.target = Some(z);
        self.z.confirmed = false;
        self.in_flight = Some(Axis::Z);

        report.z_commands += 1;
        report.polls += bus.command_and_wait(self.z_address, &Command::MoveZ(z))?;

        self.z.confirmed = true;
        self.in_flight = None;
        debug!("z at {}", z);
        Ok(())
    }

    fn apply<I2C: I2c, D: DelayNs, A: PasteApplicator>(
        &mut self,
        bus: &mut BusMaster<I2C, D>,
        applicator: &mut A,
        steps: u32,
        report: &mut SequenceReport,
    ) -> Result<()> {
        applicator.begin_apply(steps)?;
        // Nominal run time plus the poll bound as margin
        let poll = bus.poll_policy();
        let interval_ms = poll.interval_ms.max(1);
        let run_ms = applicator.apply_duration_ns(steps) / 1_000_000;
        let limit = u64::from(poll.max_polls).saturating_add(run_ms / u64::from(interval_ms) + 1);
        let mut waited = 0u64;
        while !applicator.is_applied() {
            if waited >= limit {
                error!("apply of {} steps not finished", steps);
                return Err(SequenceError::ApplyTimeout.into());
            }
            bus.delay().delay_ms(interval_ms);
            waited += 1;
        }
        report.applies += 1;
        report.steps_applied += steps;
        Ok(())
    }

    fn ensure_master(&self) -> Result<()> {
        if self.flags.is_master() {
            Ok(())
        } else {
            Err(SequenceError::NotMaster.into())
        }
    }

    fn pause<A: PasteApplicator>(&mut self, applicator: &mut A) {
        if applicator.abort().is_err() {
            error!("applicator did not stop");
        }
        self.flags.clear_start();
        self.paused = true;
        match self.in_flight.take() {
            Some(Axis::Xy) => self.xy.confirmed = false,
            Some(Axis::Z) => self.z.confirmed = false,
            None => {}
        }
        warn!("sequence paused");
    }
}
