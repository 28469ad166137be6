//! # ECS Configuration
//!
//! Capacities reserved at construction. Loaded once at startup, usually from
//! a TOML file next to the rest of the engine configuration:
//!
//! ```toml
//! initial_table_capacity = 256
//! initial_entity_capacity = 128
//! scratch_pool_size = 4
//! bucket_capacity = 16
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Pre-allocation settings for an [`Ecs`](crate::Ecs).
///
/// None of these are hard limits; storage still grows geometrically past
/// them. They only decide how much is reserved before the first frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcsConfig {
    /// Dense slots reserved per component table (including reserved slot 0).
    pub initial_table_capacity: usize,
    /// Entity slots reserved in the registry and in every sparse array.
    pub initial_entity_capacity: usize,
    /// Scratch bitsets pre-allocated for query mask construction.
    pub scratch_pool_size: usize,
    /// Entity ids reserved in each newly created archetype bucket.
    pub bucket_capacity: usize,
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            initial_table_capacity: 256,
            initial_entity_capacity: 128,
            scratch_pool_size: 4,
            bucket_capacity: 16,
        }
    }
}

impl EcsConfig {
    /// Small reservations for tests and tools.
    #[must_use]
    pub const fn minimal() -> Self {
        Self {
            initial_table_capacity: 2,
            initial_entity_capacity: 2,
            scratch_pool_size: 0,
            bucket_capacity: 1,
        }
    }

    /// Parses and validates a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the document does not parse or
    /// fails [`validate`](Self::validate).
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every capacity that must be non-zero is.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] naming the offending key.
    pub fn validate(&self) -> EcsResult<()> {
        let required = [
            ("initial_table_capacity", self.initial_table_capacity),
            ("initial_entity_capacity", self.initial_entity_capacity),
            ("bucket_capacity", self.bucket_capacity),
        ];
        for (key, value) in required {
            if value == 0 {
                return Err(EcsError::InvalidConfig(format!("{key} must be greater than zero")));
            }
        }
        Ok(())
    }
}
