//! Simulated two-wire bus with slave boards behind it.
//!
//! Each stage board runs a real [`SlaveEndpoint`] on top of a simulated axis
//! that arrives at its target after a configurable number of status reads.
//! The bus records every decoded frame and the largest number of boards that
//! held mastership at the same time.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::config::Role;
use crate::error::ProtocolError;
use crate::protocol::{Command, CoordinationFlags, NoAxis, PositionTarget, SlaveEndpoint, Target};

/// Bus failure reported to the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimBusError(pub ErrorKind);

impl i2c::Error for SimBusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Axis that reaches its target after a fixed number of status reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimAxis {
    position: Option<Target>,
    target: Option<Target>,
    moving: bool,
    remaining: u32,
    travel_reads: u32,
    moves: u32,
}

impl SimAxis {
    /// Axis taking `travel_reads` status reads per move.
    pub fn new(travel_reads: u32) -> Self {
        Self {
            travel_reads,
            ..Self::default()
        }
    }

    /// Last position reached.
    pub fn position(&self) -> Option<Target> {
        self.position
    }

    /// Moves started.
    pub fn moves(&self) -> u32 {
        self.moves
    }

    fn arrived(&self) -> bool {
        !self.moving && self.position == self.target
    }

    fn tick(&mut self) -> bool {
        if !self.moving {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.position = self.target;
            self.moving = false;
        }
        !self.moving
    }
}

impl PositionTarget for SimAxis {
    fn begin_move(&mut self, target: Target) -> Result<(), ProtocolError> {
        self.target = Some(target);
        self.moving = true;
        self.remaining = self.travel_reads;
        self.moves += 1;
        Ok(())
    }
}

struct SimBoard {
    address: u8,
    flags: Rc<CoordinationFlags>,
    axis: Option<SimAxis>,
    fail_next: u32,
    fail_kind: ErrorKind,
    forced_status: Option<u8>,
}

impl SimBoard {
    fn receive(&mut self, bytes: &[u8]) {
        let endpoint = SlaveEndpoint::new(&self.flags);
        let _ = match self.axis.as_mut() {
            Some(axis) => endpoint.on_receive(bytes, axis),
            None => endpoint.on_receive(bytes, &mut NoAxis),
        };
    }

    fn respond(&mut self) -> u8 {
        if let Some(axis) = self.axis.as_mut() {
            if axis.tick() {
                self.flags.set_in_position(true);
            }
        }
        self.forced_status
            .unwrap_or_else(|| SlaveEndpoint::new(&self.flags).response())
    }
}

#[derive(Default)]
struct BusState {
    boards: Vec<SimBoard>,
    log: Vec<(u8, Command)>,
    watched: Vec<Rc<CoordinationFlags>>,
    max_masters: usize,
    early_reports: u32,
}

impl BusState {
    fn board(&mut self, address: u8) -> Option<&mut SimBoard> {
        self.boards.iter_mut().find(|b| b.address == address)
    }

    fn observe(&mut self) {
        let masters = self
            .watched
            .iter()
            .chain(self.boards.iter().map(|b| &b.flags))
            .filter(|f| f.is_master())
            .count();
        self.max_masters = self.max_masters.max(masters);
    }

    fn transfer(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), SimBusError> {
        let nack = SimBusError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        let index = self
            .boards
            .iter()
            .position(|b| b.address == address)
            .ok_or(nack)?;

        let board = &mut self.boards[index];
        if board.fail_next > 0 {
            board.fail_next -= 1;
            return Err(SimBusError(board.fail_kind));
        }

        for op in operations.iter_mut() {
            let board = &mut self.boards[index];
            match op {
                Operation::Write(bytes) => {
                    board.receive(bytes);
                    if let Ok(command) = Command::decode(bytes) {
                        self.log.push((address, command));
                    }
                }
                Operation::Read(buf) => {
                    let status = board.respond();
                    let arrived = board.axis.map_or(true, |a| a.arrived());
                    if status == 1 && !arrived {
                        self.early_reports += 1;
                    }
                    buf.fill(0);
                    if let Some(first) = buf.first_mut() {
                        *first = status;
                    }
                }
            }
        }
        self.observe();
        Ok(())
    }
}

/// Simulated bus. Clones share the same boards and log.
#[derive(Clone, Default)]
pub struct SimBus {
    state: Rc<RefCell<BusState>>,
}

impl SimBus {
    /// Bus with nothing attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a stage board that arrives after `travel_reads` status reads.
    pub fn add_stage(&self, address: u8, travel_reads: u32) -> Rc<CoordinationFlags> {
        self.attach(address, Some(SimAxis::new(travel_reads)))
    }

    /// Attach a board without an axis, such as the next dispenser.
    pub fn add_peer(&self, address: u8) -> Rc<CoordinationFlags> {
        self.attach(address, None)
    }

    fn attach(&self, address: u8, axis: Option<SimAxis>) -> Rc<CoordinationFlags> {
        let flags = Rc::new(CoordinationFlags::new(Role::Slave));
        let mut state = self.state.borrow_mut();
        state.boards.push(SimBoard {
            address,
            flags: Rc::clone(&flags),
            axis,
            fail_next: 0,
            fail_kind: ErrorKind::Other,
            forced_status: None,
        });
        state.observe();
        flags
    }

    /// Include the master's own flags in the mastership count.
    pub fn watch(&self, flags: Rc<CoordinationFlags>) {
        let mut state = self.state.borrow_mut();
        state.watched.push(flags);
        state.observe();
    }

    /// Fail the next `count` transfers to `address` with `kind`.
    pub fn fail_next(&self, address: u8, count: u32, kind: ErrorKind) {
        if let Some(board) = self.state.borrow_mut().board(address) {
            board.fail_next = count;
            board.fail_kind = kind;
        }
    }

    /// Make `address` answer every read with `status`, or restore normal
    /// replies with `None`.
    pub fn force_status(&self, address: u8, status: Option<u8>) {
        if let Some(board) = self.state.borrow_mut().board(address) {
            board.forced_status = status;
        }
    }

    /// Every decoded frame, in order.
    pub fn log(&self) -> Vec<(u8, Command)> {
        self.state.borrow().log.clone()
    }

    /// Frames sent to `address`, in order.
    pub fn commands_to(&self, address: u8) -> Vec<Command> {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, c)| *c)
            .collect()
    }

    /// Position reached by the stage at `address`.
    pub fn position(&self, address: u8) -> Option<Target> {
        self.state
            .borrow_mut()
            .board(address)
            .and_then(|b| b.axis)
            .and_then(|a| a.position())
    }

    /// Most boards seen holding mastership at once.
    pub fn max_masters(&self) -> usize {
        self.state.borrow().max_masters
    }

    /// "In position" replies sent before the axis had arrived.
    pub fn early_reports(&self) -> u32 {
        self.state.borrow().early_reports
    }
}

impl ErrorType for SimBus {
    type Error = SimBusError;
}

impl I2c for SimBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.state.borrow_mut().transfer(address, operations)
    }
}
