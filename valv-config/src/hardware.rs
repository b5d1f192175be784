//! Hardware registration configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Hardware memory-registration parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct HardwareConfig {
    /// Whether superblocks attempt registration at construction. When
    /// disabled they run software-only.
    #[serde(default = "default_register_memory")]
    pub register_memory: bool,

    /// Region provider backend (verbs, sim, or none).
    #[serde(default = "default_provider")]
    #[validate(custom(function = validation::validate_provider))]
    pub provider: String,
}

fn default_register_memory() -> bool {
    true
}

fn default_provider() -> String {
    "sim".into()
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            register_memory: default_register_memory(),
            provider: default_provider(),
        }
    }
}
