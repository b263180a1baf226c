//! Wire format.
//!
//! Every frame starts with a one-byte header; the header fixes the frame
//! length. Positions are little-endian `i32`.
//!
//! | header | name            | payload        | length |
//! |--------|-----------------|----------------|--------|
//! | `0x01` | XY move         | x: i32, y: i32 | 9      |
//! | `0x02` | Z move          | z: i32         | 5      |
//! | `0x03` | handover        | -              | 1      |
//! | `0x04` | status request  | -              | 1      |
//!
//! Replies are a single status byte: `0` not in position, `1` in position,
//! anything else is a fault.

use crate::config::units::Point;
use crate::error::ProtocolError;

/// Longest frame on the wire.
pub const MAX_FRAME_LEN: usize = 9;

/// Status byte: axis still moving.
pub const STATUS_NOT_IN_POSITION: u8 = 0;
/// Status byte: axis reached its last target.
pub const STATUS_IN_POSITION: u8 = 1;
/// Status byte sent by a slave that could not act on its last command.
pub const STATUS_FAULT: u8 = 0xFF;

/// Frame header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Header {
    /// Move the X-Y stage.
    MoveXy = 0x01,
    /// Move the Z stage.
    MoveZ = 0x02,
    /// Transfer bus mastership to the addressed board.
    Handover = 0x03,
    /// Ask for the in-position status.
    StatusRequest = 0x04,
}

impl Header {
    /// Parse a header byte.
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0x01 => Ok(Header::MoveXy),
            0x02 => Ok(Header::MoveZ),
            0x03 => Ok(Header::Handover),
            0x04 => Ok(Header::StatusRequest),
            other => Err(ProtocolError::UnknownHeader(other)),
        }
    }

    /// Total frame length for this header, header byte included.
    pub const fn frame_len(self) -> usize {
        match self {
            Header::MoveXy => 9,
            Header::MoveZ => 5,
            Header::Handover | Header::StatusRequest => 1,
        }
    }
}

/// A decoded command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Move the X-Y stage to a point.
    MoveXy(Point),
    /// Move the Z stage to a position.
    MoveZ(i32),
    /// Take over bus mastership.
    Handover,
    /// Report in-position status.
    StatusRequest,
}

/// Encoded frame, stack allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    /// Bytes to put on the wire.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Command {
    /// Header byte of this command.
    pub fn header(&self) -> Header {
        match self {
            Command::MoveXy(_) => Header::MoveXy,
            Command::MoveZ(_) => Header::MoveZ,
            Command::Handover => Header::Handover,
            Command::StatusRequest => Header::StatusRequest,
        }
    }

    /// Encode to a frame.
    pub fn encode(&self) -> Frame {
        let header = self.header();
        let mut bytes = [0u8; MAX_FRAME_LEN];
        bytes[0] = header as u8;
        match self {
            Command::MoveXy(p) => {
                bytes[1..5].copy_from_slice(&p.x.to_le_bytes());
                bytes[5..9].copy_from_slice(&p.y.to_le_bytes());
            }
            Command::MoveZ(z) => bytes[1..5].copy_from_slice(&z.to_le_bytes()),
            Command::Handover | Command::StatusRequest => {}
        }
        Frame {
            bytes,
            len: header.frame_len(),
        }
    }

    /// Decode a received frame. Bytes past the header's frame length are
    /// ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let first = *bytes.first().ok_or(ProtocolError::Empty)?;
        let header = Header::from_byte(first)?;
        let expected = header.frame_len();
        if bytes.len() < expected {
            return Err(ProtocolError::Truncated {
                header: first,
                expected,
                actual: bytes.len(),
            });
        }

        Ok(match header {
            Header::MoveXy => Command::MoveXy(Point::new(read_i32(&bytes[1..5]), read_i32(&bytes[5..9]))),
            Header::MoveZ => Command::MoveZ(read_i32(&bytes[1..5])),
            Header::Handover => Command::Handover,
            Header::StatusRequest => Command::StatusRequest,
        })
    }
}

fn read_i32(bytes: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    i32::from_le_bytes(raw)
}

/// In-position status reported by a slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// Still moving toward the last target.
    NotInPosition,
    /// Reached the last target.
    InPosition,
}

impl Status {
    /// Interpret a status byte from `address`.
    pub fn from_byte(address: u8, byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            STATUS_NOT_IN_POSITION => Ok(Status::NotInPosition),
            STATUS_IN_POSITION => Ok(Status::InPosition),
            status => Err(ProtocolError::UnexpectedStatus { address, status }),
        }
    }

    /// Status byte for the wire.
    pub const fn to_byte(self) -> u8 {
        match self {
            Status::NotInPosition => STATUS_NOT_IN_POSITION,
            Status::InPosition => STATUS_IN_POSITION,
        }
    }
}

impl From<bool> for Status {
    fn from(in_position: bool) -> Self {
        if in_position {
            Status::InPosition
        } else {
            Status::NotInPosition
        }
    }
}
