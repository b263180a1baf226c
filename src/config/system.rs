//! System configuration - root configuration structure.

use heapless::{FnvIndexMap, String, Vec};
use serde::Deserialize;

use crate::input::{Binding, MAX_BINDINGS};

use super::board::{BoardConfig, BusConfig};
use super::driver::DriverConfig;
use super::sequence::SequenceConfig;

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemConfig {
    /// This board's bus identity and role.
    #[serde(default)]
    pub board: BoardConfig,

    /// Remote axis addresses and transfer policies.
    #[serde(default)]
    pub bus: BusConfig,

    /// Named local actuator drivers.
    #[serde(default)]
    pub drivers: FnvIndexMap<String<32>, DriverConfig, 4>,

    /// Named dispense sequences.
    #[serde(default)]
    pub sequences: FnvIndexMap<String<32>, SequenceConfig, 8>,

    /// Edge input bindings.
    #[serde(default)]
    pub inputs: Vec<Binding, MAX_BINDINGS>,
}

impl SystemConfig {
    /// Get a driver configuration by name.
    pub fn driver(&self, name: &str) -> Option<&DriverConfig> {
        self.drivers
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v)
    }

    /// Get a sequence configuration by name.
    pub fn sequence(&self, name: &str) -> Option<&SequenceConfig> {
        self.sequences
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v)
    }

    /// Driver configuration of the board's paste applicator, if one is named.
    pub fn applicator(&self) -> Option<&DriverConfig> {
        self.board
            .applicator
            .as_ref()
            .and_then(|name| self.driver(name.as_str()))
    }

    /// List all driver names.
    pub fn driver_names(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(|s| s.as_str())
    }

    /// List all sequence names.
    pub fn sequence_names(&self) -> impl Iterator<Item = &str> {
        self.sequences.keys().map(|s| s.as_str())
    }
}
