//! Bus slave side of the coordination protocol.
//!
//! [`SlaveEndpoint::on_receive`] runs in the bus receive interrupt: it decodes
//! the frame, records the new target and returns. Motion happens elsewhere;
//! whoever drives the axis reports arrival through
//! [`CoordinationFlags::set_in_position`].

use crate::config::units::Point;
use crate::error::ProtocolError;

use super::frame::{Command, Status, STATUS_FAULT};
use super::role::CoordinationFlags;

/// Target carried by a position command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Target {
    /// X-Y stage target.
    Planar(Point),
    /// Z stage target.
    Vertical(i32),
}

/// Axis that accepts position targets from the bus.
///
/// `begin_move` is called from interrupt context and must not block.
pub trait PositionTarget {
    /// Start moving toward `target`.
    fn begin_move(&mut self, target: Target) -> Result<(), ProtocolError>;
}

/// Board without a positioning axis. Rejects every position command.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAxis;

impl PositionTarget for NoAxis {
    fn begin_move(&mut self, target: Target) -> Result<(), ProtocolError> {
        let header = match target {
            Target::Planar(_) => Command::MoveXy(Point::ORIGIN).header(),
            Target::Vertical(_) => Command::MoveZ(0).header(),
        };
        Err(ProtocolError::UnsupportedCommand(header as u8))
    }
}

/// Receive side of a slave board.
#[derive(Debug, Clone, Copy)]
pub struct SlaveEndpoint<'a> {
    flags: &'a CoordinationFlags,
}

impl<'a> SlaveEndpoint<'a> {
    /// Endpoint sharing `flags` with the rest of the board.
    pub fn new(flags: &'a CoordinationFlags) -> Self {
        Self { flags }
    }

    /// Handle one received frame.
    ///
    /// A position command clears the in-position flag before the axis is
    /// told, so a status read can never report the previous target as
    /// reached. A handover sets the local master flag.
    pub fn on_receive<T: PositionTarget>(
        &self,
        bytes: &[u8],
        axis: &mut T,
    ) -> Result<Command, ProtocolError> {
        let command = match Command::decode(bytes) {
            Ok(command) => command,
            Err(e) => {
                self.flags.set_fault(true);
                warn!("dropped malformed frame");
                return Err(e);
            }
        };

        let target = match command {
            Command::MoveXy(point) => Some(Target::Planar(point)),
            Command::MoveZ(z) => Some(Target::Vertical(z)),
            Command::Handover => {
                if self.flags.accept_handover() {
                    warn!("handover received while already master");
                } else {
                    info!("took bus mastership");
                }
                None
            }
            Command::StatusRequest => None,
        };

        if let Some(target) = target {
            self.flags.set_in_position(false);
            if let Err(e) = axis.begin_move(target) {
                self.flags.set_fault(true);
                return Err(e);
            }
            self.flags.set_fault(false);
            trace!("new target {}", target);
        }
        Ok(command)
    }

    /// Byte to send when the master reads.
    pub fn response(&self) -> u8 {
        if self.flags.is_faulted() {
            STATUS_FAULT
        } else {
            Status::from(self.flags.is_in_position()).to_byte()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Role;

    #[derive(Default)]
    struct RecordingAxis {
        last: Option<Target>,
    }

    impl PositionTarget for RecordingAxis {
        fn begin_move(&mut self, target: Target) -> Result<(), ProtocolError> {
            self.last = Some(target);
            Ok(())
        }
    }

    #[test]
    fn test_move_clears_in_position() {
        let flags = CoordinationFlags::new(Role::Slave);
        flags.set_in_position(true);
        let endpoint = SlaveEndpoint::new(&flags);
        let mut axis = RecordingAxis::default();

        let frame = Command::MoveXy(Point::new(3, 4)).encode();
        endpoint.on_receive(frame.as_bytes(), &mut axis).unwrap();

        assert_eq!(axis.last, Some(Target::Planar(Point::new(3, 4))));
        assert_eq!(endpoint.response(), 0);
        flags.set_in_position(true);
        assert_eq!(endpoint.response(), 1);
    }

    #[test]
    fn test_status_request_changes_nothing() {
        let flags = CoordinationFlags::new(Role::Slave);
        flags.set_in_position(true);
        let endpoint = SlaveEndpoint::new(&flags);
        let mut axis = RecordingAxis::default();

        assert_eq!(endpoint.on_receive(&[0x04], &mut axis), Ok(Command::StatusRequest));
        assert_eq!(axis.last, None);
        assert_eq!(endpoint.response(), 1);
    }

    #[test]
    fn test_handover_sets_master() {
        let flags = CoordinationFlags::new(Role::Slave);
        let endpoint = SlaveEndpoint::new(&flags);
        endpoint.on_receive(&[0x03], &mut NoAxis).unwrap();
        assert!(flags.is_master());
    }

    #[test]
    fn test_unsupported_move_reports_fault() {
        let flags = CoordinationFlags::new(Role::Slave);
        let endpoint = SlaveEndpoint::new(&flags);

        let frame = Command::MoveZ(10).encode();
        assert_eq!(
            endpoint.on_receive(frame.as_bytes(), &mut NoAxis),
            Err(ProtocolError::UnsupportedCommand(0x02))
        );
        assert_eq!(endpoint.response(), STATUS_FAULT);
    }

    #[test]
    fn test_malformed_frame() {
        let flags = CoordinationFlags::new(Role::Slave);
        let endpoint = SlaveEndpoint::new(&flags);
        assert_eq!(
            endpoint.on_receive(&[0x01, 0, 0], &mut NoAxis),
            Err(ProtocolError::Truncated { header: 0x01, expected: 9, actual: 3 })
        );
        assert_eq!(endpoint.response(), STATUS_FAULT);
    }
}
