//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::SystemConfig;

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
///
/// # Example
///
/// ```rust,ignore
/// use paste_dispenser::load_config;
///
/// let config = load_config("board.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SystemConfig> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        let msg = heapless::String::try_from(e.to_string().as_str()).unwrap_or_default();
        Error::Config(ConfigError::IoError(msg))
    })?;

    parse_config(&content)
}

/// Parse configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<SystemConfig> {
    let config: SystemConfig = toml::from_str(content).map_err(|e| {
        let msg = truncated(e.message());
        Error::Config(ConfigError::ParseError(msg))
    })?;

    super::validation::validate_config(&config)?;

    Ok(config)
}

fn truncated(message: &str) -> heapless::String<128> {
    let mut out = heapless::String::new();
    for c in message.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
