//! Error types for paste-dispenser.
//!
//! Provides unified error handling across configuration, the actuator driver,
//! the bus transport, the coordination protocol and the sequencing loop.

use core::fmt;

use embedded_hal::i2c::ErrorKind;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all paste-dispenser operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Actuator driver error
    Driver(DriverError),
    /// Bus transfer failed after all retries
    Bus(BusError),
    /// Peer answered with something the protocol does not allow
    Protocol(ProtocolError),
    /// Sequencing loop could not start or had to pause
    Sequence(SequenceError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// A required builder field was not supplied
    MissingField(&'static str),
    /// Invalid microstep value (the driver supports 1, 2, 4, 8 and 16)
    InvalidMicrosteps(u16),
    /// Step frequency cannot be produced by the PWM clock divider
    InvalidStepFrequency {
        /// Requested frequency in Hz
        requested: u32,
        /// Lowest reachable frequency in Hz
        min: u32,
        /// Highest reachable frequency in Hz
        max: u32,
    },
    /// Bus address is outside the 7-bit range or reserved
    InvalidAddress(u8),
    /// Two roles on the bus share one address
    DuplicateAddress(u8),
    /// Driver name not found in configuration
    DriverNotFound(heapless::String<32>),
    /// Sequence name not found in configuration
    SequenceNotFound(heapless::String<32>),
    /// Sequence has no points
    EmptySequence(heapless::String<32>),
    /// Sequence holds more points than fit
    TooManyPoints(usize),
    /// Bounded move length outside what the pulse counter can count
    InvalidApplySteps(u32),
    /// Retry or poll bound of zero
    InvalidBound(&'static str),
    /// Name longer than 32 bytes
    NameTooLong,
    /// Registry or binding table has no free entry
    RegistryFull,
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// A caller broke an actuator driver precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Precondition {
    /// Bounded move of zero steps requested
    ZeroLengthMove,
    /// Continuous motion in one direction is live and the other was requested
    DirectionReversal,
    /// A new move was requested while another is still running
    MotionActive,
    /// Bounded move exceeds the pulse counter range
    StepCountTooLarge(u32),
}

/// Actuator driver errors.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverError {
    /// Requested operation is not allowed in the current driver state
    PreconditionViolation(Precondition),
    /// GPIO pin operation failed
    PinError,
    /// Step pulse peripheral operation failed
    PulseError,
    /// Pulse counter peripheral operation failed
    CounterError,
    /// Driver table has no free slot
    TableFull,
    /// Another driver in the table already uses this pulse counter
    DuplicateCounter(u8),
    /// Slot does not refer to a driver in the table
    UnknownSlot(usize),
    /// Counter has no bit in the shared wrap status mask
    InvalidCounter(u8),
}

/// A bus transfer failed on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError {
    /// Address of the device that did not complete the transfer
    pub address: u8,
    /// Failure reported by the last attempt
    pub kind: ErrorKind,
    /// Number of attempts made
    pub attempts: u32,
}

/// Coordination protocol errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Status byte other than "not in position" or "in position"
    UnexpectedStatus {
        /// Responding device
        address: u8,
        /// Raw status byte
        status: u8,
    },
    /// Device never reported "in position" within the poll bound
    Timeout {
        /// Polled device
        address: u8,
        /// Polls made
        polls: u32,
    },
    /// Frame begins with an unknown header byte
    UnknownHeader(u8),
    /// Frame is shorter than its header requires
    Truncated {
        /// Header byte
        header: u8,
        /// Required frame length
        expected: usize,
        /// Received frame length
        actual: usize,
    },
    /// Frame is valid but this board cannot act on it
    UnsupportedCommand(u8),
    /// Received an empty frame
    Empty,
}

/// Sequencing errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceError {
    /// Sequencing attempted without holding bus mastership
    NotMaster,
    /// Board has not flagged itself ready
    BoardNotReady,
    /// Local applicator driver is not enabled
    ApplicatorNotReady,
    /// Local bounded move did not finish within the poll bound
    ApplyTimeout,
    /// No handover target configured
    NoNextBoard,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Driver(e) => write!(f, "Driver error: {}", e),
            Error::Bus(e) => write!(f, "Bus error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Sequence(e) => write!(f, "Sequence error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::MissingField(field) => write!(f, "{} is required", field),
            ConfigError::InvalidMicrosteps(v) => {
                write!(f, "Invalid microsteps: {}. Valid values: 1, 2, 4, 8, 16", v)
            }
            ConfigError::InvalidStepFrequency { requested, min, max } => {
                write!(f, "Step frequency {} Hz outside reachable range [{}, {}] Hz", requested, min, max)
            }
            ConfigError::InvalidAddress(a) => write!(f, "Invalid bus address: {:#04x}", a),
            ConfigError::DuplicateAddress(a) => write!(f, "Duplicate bus address: {:#04x}", a),
            ConfigError::DriverNotFound(name) => write!(f, "Driver '{}' not found", name),
            ConfigError::SequenceNotFound(name) => write!(f, "Sequence '{}' not found", name),
            ConfigError::EmptySequence(name) => write!(f, "Sequence '{}' has no points", name),
            ConfigError::TooManyPoints(n) => {
                write!(f, "Sequence has {} points, at most 32 fit", n)
            }
            ConfigError::InvalidApplySteps(v) => {
                write!(f, "Invalid apply steps: {}. Must be 1-65536", v)
            }
            ConfigError::InvalidBound(field) => write!(f, "{} must be at least 1", field),
            ConfigError::NameTooLong => write!(f, "Name longer than 32 bytes"),
            ConfigError::RegistryFull => write!(f, "No free entry left"),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::ZeroLengthMove => write!(f, "bounded move of zero steps"),
            Precondition::DirectionReversal => {
                write!(f, "direction reversal while pulses are live; stop first")
            }
            Precondition::MotionActive => write!(f, "another move is still running"),
            Precondition::StepCountTooLarge(n) => {
                write!(f, "bounded move of {} steps exceeds the counter range", n)
            }
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::PreconditionViolation(p) => write!(f, "Precondition violated: {}", p),
            DriverError::PinError => write!(f, "GPIO pin operation failed"),
            DriverError::PulseError => write!(f, "Step pulse peripheral operation failed"),
            DriverError::CounterError => write!(f, "Pulse counter peripheral operation failed"),
            DriverError::TableFull => write!(f, "Driver table is full"),
            DriverError::DuplicateCounter(id) => {
                write!(f, "Pulse counter {} already owned by another driver", id)
            }
            DriverError::UnknownSlot(slot) => write!(f, "No driver in slot {}", slot),
            DriverError::InvalidCounter(id) => {
                write!(f, "Pulse counter {} outside the wrap status mask", id)
            }
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transfer to {:#04x} failed after {} attempt(s): {}",
            self.address, self.attempts, self.kind
        )
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnexpectedStatus { address, status } => {
                write!(f, "Device {:#04x} answered unexpected status {}", address, status)
            }
            ProtocolError::Timeout { address, polls } => {
                write!(f, "Device {:#04x} not in position after {} polls", address, polls)
            }
            ProtocolError::UnknownHeader(h) => write!(f, "Unknown header byte {:#04x}", h),
            ProtocolError::Truncated { header, expected, actual } => write!(
                f,
                "Frame {:#04x} truncated: expected {} bytes, got {}",
                header, expected, actual
            ),
            ProtocolError::UnsupportedCommand(h) => {
                write!(f, "Command {:#04x} not supported by this board", h)
            }
            ProtocolError::Empty => write!(f, "Empty frame"),
        }
    }
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::NotMaster => write!(f, "board does not hold bus mastership"),
            SequenceError::BoardNotReady => write!(f, "board is not ready"),
            SequenceError::ApplicatorNotReady => write!(f, "applicator driver is not enabled"),
            SequenceError::ApplyTimeout => write!(f, "paste application did not finish in time"),
            SequenceError::NoNextBoard => write!(f, "no handover target configured"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        Error::Driver(e)
    }
}

impl From<Precondition> for Error {
    fn from(p: Precondition) -> Self {
        Error::Driver(DriverError::PreconditionViolation(p))
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Error::Bus(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<SequenceError> for Error {
    fn from(e: SequenceError) -> Self {
        Error::Sequence(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for DriverError {}

#[cfg(feature = "std")]
impl std::error::Error for BusError {}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {}

#[cfg(feature = "std")]
impl std::error::Error for SequenceError {}
