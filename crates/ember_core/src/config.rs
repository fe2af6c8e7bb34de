//! # World Configuration
//!
//! Sizing hints applied once when a [`World`](crate::World) is built.
//! Every field has a default, so a partial TOML table is valid.
//!
//! ```toml
//! entity_capacity = 100000
//! event_capacity = 256
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Pre-allocation hints for a World.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Entity slots reserved up front.
    pub entity_capacity: usize,
    /// Archetypes reserved up front.
    pub archetype_capacity: usize,
    /// Initial buffer size of event channels created through the World.
    pub event_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 1024,
            archetype_capacity: 64,
            event_capacity: 64,
        }
    }
}

impl WorldConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// [`EcsError::Config`] if the text is not valid TOML or a field has
    /// the wrong type.
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        toml::from_str(text).map_err(|e| EcsError::Config(e.to_string()))
    }

    /// Renders the config as TOML text.
    ///
    /// # Errors
    ///
    /// [`EcsError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> EcsResult<String> {
        toml::to_string(self).map_err(|e| EcsError::Config(e.to_string()))
    }
}
