//! Configuration validation.

use crate::error::{ConfigError, Error, Result};
use crate::motor::MAX_BOUNDED_STEPS;

use super::timing::PwmDivider;
use super::SystemConfig;

/// Validate a system configuration.
///
/// Checks:
/// - Bus addresses are 7-bit, unreserved, and the two axes do not collide
/// - Handover target differs from this board
/// - Every driver's step frequency is reachable by the PWM divider
/// - The applicator names a configured driver
/// - Sequences are non-empty with a countable apply length
/// - Retry and poll bounds are at least one
pub fn validate_config(config: &SystemConfig) -> Result<()> {
    validate_address(config.board.address)?;
    validate_address(config.bus.xy_address)?;
    validate_address(config.bus.z_address)?;

    if config.bus.xy_address == config.bus.z_address {
        return Err(Error::Config(ConfigError::DuplicateAddress(config.bus.z_address)));
    }

    if let Some(next) = config.board.next_board {
        validate_address(next)?;
        if next == config.board.address {
            return Err(Error::Config(ConfigError::DuplicateAddress(next)));
        }
    }

    if config.bus.retry.max_attempts == 0 {
        return Err(Error::Config(ConfigError::InvalidBound("bus.retry.max_attempts")));
    }

    if config.bus.poll.max_polls == 0 {
        return Err(Error::Config(ConfigError::InvalidBound("bus.poll.max_polls")));
    }

    for (_, driver) in config.drivers.iter() {
        PwmDivider::for_step_frequency(config.board.system_clock_hz, driver.step_frequency)?;
    }

    if let Some(ref name) = config.board.applicator {
        if config.driver(name.as_str()).is_none() {
            return Err(Error::Config(ConfigError::DriverNotFound(name.clone())));
        }
    }

    for (name, seq) in config.sequences.iter() {
        validate_sequence(name, seq)?;
    }

    Ok(())
}

/// 7-bit addresses 0x00-0x07 and 0x78-0x7F are reserved by the bus.
fn validate_address(address: u8) -> Result<()> {
    if (0x08..=0x77).contains(&address) {
        Ok(())
    } else {
        Err(Error::Config(ConfigError::InvalidAddress(address)))
    }
}

fn validate_sequence(name: &heapless::String<32>, seq: &super::SequenceConfig) -> Result<()> {
    if seq.is_empty() {
        return Err(Error::Config(ConfigError::EmptySequence(name.clone())));
    }

    if seq.apply_steps == 0 || seq.apply_steps > MAX_BOUNDED_STEPS {
        return Err(Error::Config(ConfigError::InvalidApplySteps(seq.apply_steps)));
    }

    Ok(())
}
