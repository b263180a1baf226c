//! # paste-dispenser
//!
//! Stepper actuator driver and master/slave coordination protocol for a
//! multi-board paste dispenser, with embedded-hal 1.0 support.
//!
//! ## Features
//!
//! - **Hardware-counted bounded moves**: the step output feeds an edge
//!   counter whose wrap interrupt ends the move, so step counts are exact
//! - **embedded-hal 1.0**: `OutputPin` for control lines, `I2c` for the bus,
//!   `DelayNs` for polling
//! - **Single master at a time**: mastership moves between boards with an
//!   explicit handover; the sender releases before the receiver takes over
//! - **Bounded retries**: every bus transfer is retried with backoff and every
//!   wait for a stage is bounded
//! - **Configuration-driven**: boards, drivers, sequences and input bindings
//!   in TOML
//! - **no_std compatible**: core library works without the standard library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use paste_dispenser::{BusMaster, CoordinationFlags, Sequencer, SystemConfig};
//!
//! static FLAGS: CoordinationFlags = CoordinationFlags::new(Role::Master);
//!
//! let config: SystemConfig = paste_dispenser::load_config("board_a.toml")?;
//! let mut bus = BusMaster::from_config(i2c, delay, &config.bus);
//! let mut sequencer = Sequencer::from_config(&FLAGS, &config);
//! FLAGS.set_ready(true);
//!
//! loop {
//!     if let Some(report) = sequencer.run_pending(&mut bus, sequence, &mut applicator)? {
//!         defmt::info!("{} points dispensed", report.points);
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): file loading, TOML parsing and the host simulation
//! - `alloc`: heap allocation for no_std targets with an allocator
//! - `defmt`: defmt logging for embedded targets
//! - `single-core`: atomics through critical sections on cores without CAS

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Must come first so the logging macros are visible everywhere
#[macro_use]
mod fmt;

// Core modules
pub mod config;
pub mod error;
pub mod input;
pub mod motor;
pub mod protocol;
pub mod sequence;

// Host simulation (std only)
#[cfg(feature = "std")]
pub mod sim;

// Re-exports for ergonomic API
pub use config::{validate_config, BoardConfig, BusConfig, DriverConfig, Role, SequenceConfig, SystemConfig};
pub use error::{Error, Result};
pub use input::{Action, Edge, EdgeDispatcher};
pub use motor::{AxisSlot, Direction, DriverState, DriverTable, StepperDriver, StepperDriverBuilder};
pub use protocol::{BusMaster, Command, CoordinationFlags, SlaveEndpoint, Status};
pub use sequence::{PasteApplicator, SequenceRegistry, SequenceReport, Sequencer};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Hertz, Microsteps, Point};
