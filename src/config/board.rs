//! Board identity and bus configuration.

use heapless::String;
use serde::Deserialize;

/// Coordination role a board starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Holds bus mastership and runs the sequence.
    Master,
    /// Waits for commands or a handover.
    #[default]
    Slave,
}

/// This board's identity on the bus.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// Own 7-bit bus address.
    pub address: u8,

    /// Role at boot.
    #[serde(default)]
    pub role: Role,

    /// Board that receives mastership after this board's sequence.
    #[serde(default)]
    pub next_board: Option<u8>,

    /// Name of the local driver used to apply paste, if any.
    #[serde(default)]
    pub applicator: Option<String<32>>,

    /// System clock feeding the PWM block.
    #[serde(default = "default_system_clock")]
    pub system_clock_hz: u32,
}

/// System clock of the reference board.
pub const DEFAULT_SYSTEM_CLOCK_HZ: u32 = 125_000_000;

fn default_system_clock() -> u32 {
    DEFAULT_SYSTEM_CLOCK_HZ
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            address: 0x10,
            role: Role::Slave,
            next_board: None,
            applicator: None,
            system_clock_hz: default_system_clock(),
        }
    }
}

/// Bounded retry with a fixed backoff for individual bus transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per transfer, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u32,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u32 {
    2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Bound on "in position" status polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollPolicy {
    /// Status polls before giving up.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    /// Delay between polls.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u32,
}

fn default_max_polls() -> u32 {
    500
}

fn default_interval_ms() -> u32 {
    10
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_polls: default_max_polls(),
            interval_ms: default_interval_ms(),
        }
    }
}

/// Addresses of the remote axes and transfer policies.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// X-Y stage board.
    pub xy_address: u8,
    /// Z stage board.
    pub z_address: u8,
    /// Transfer retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Position poll policy.
    #[serde(default)]
    pub poll: PollPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            xy_address: 0x20,
            z_address: 0x30,
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
        }
    }
}
