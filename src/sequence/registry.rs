//! Sequence registry for named sequence lookup.

use heapless::{FnvIndexMap, String};

use crate::config::{SequenceConfig, SystemConfig};
use crate::error::{ConfigError, Result};

/// Maximum number of sequences in the registry.
pub const MAX_SEQUENCES: usize = 8;

/// Registry for named dispense sequences.
#[derive(Debug, Default)]
pub struct SequenceRegistry {
    sequences: FnvIndexMap<String<32>, SequenceConfig, MAX_SEQUENCES>,
}

impl SequenceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            sequences: FnvIndexMap::new(),
        }
    }

    /// Load every sequence from a SystemConfig.
    pub fn from_config(config: &SystemConfig) -> Self {
        let mut registry = Self::new();
        for (name, sequence) in &config.sequences {
            let _ = registry.register(name.as_str(), sequence.clone());
        }
        registry
    }

    /// Register a sequence under `name`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// `NameTooLong` for names over 32 bytes, `RegistryFull` when no entry
    /// is free.
    pub fn register(&mut self, name: &str, sequence: SequenceConfig) -> Result<()> {
        let key = String::try_from(name).map_err(|_| ConfigError::NameTooLong)?;
        self.sequences
            .insert(key, sequence)
            .map_err(|_| ConfigError::RegistryFull)?;
        Ok(())
    }

    /// Get a sequence by name.
    pub fn get(&self, name: &str) -> Option<&SequenceConfig> {
        let key = String::try_from(name).ok()?;
        self.sequences.get(&key)
    }

    /// Get a sequence by name or fail with `SequenceNotFound`.
    pub fn require(&self, name: &str) -> Result<&SequenceConfig> {
        self.get(name).ok_or_else(|| {
            ConfigError::SequenceNotFound(String::try_from(name).unwrap_or_default()).into()
        })
    }

    /// Check if a sequence exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a sequence by name.
    pub fn remove(&mut self, name: &str) -> Option<SequenceConfig> {
        let key = String::try_from(name).ok()?;
        self.sequences.remove(&key)
    }

    /// Number of registered sequences.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Iterator over sequence names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sequences.keys().map(|s| s.as_str())
    }
}
