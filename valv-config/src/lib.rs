//! # Valv Configuration System
//!
//! Hierarchical configuration for the Valv allocator following the
//! project's principles of determinism and safety.
//!
//! ## Features
//! - **Unified Configuration**: Single source of truth for superblock
//!   geometry and hardware registration
//! - **Validation**: Runtime validation of critical parameters before any
//!   memory is carved up
//! - **Environment Awareness**: `VALV_*` variables override file settings

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod hardware;
mod memory;
mod validation;

pub use error::ConfigError;
pub use hardware::HardwareConfig;
pub use memory::MemoryConfig;
pub use memory::SuperblockConfig;

/// Top-level configuration container for all Valv components.
#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct ValvConfig {
    /// Superblock geometry.
    #[validate(nested)]
    pub memory: MemoryConfig,

    /// Hardware registration parameters.
    #[validate(nested)]
    pub hardware: HardwareConfig,
}

impl ValvConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/valv.yaml` - base settings. If missing, defaults are
    ///    used.
    /// 3. `VALV_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Start with defaults.
        let mut figment = Figment::from(Serialized::defaults(ValvConfig::default()));

        if Path::new("config/valv.yaml").exists() {
            figment = figment.merge(Yaml::file("config/valv.yaml"));
        }

        figment
            .merge(Env::prefixed("VALV_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }

    /// Load configuration from a specific path for testing/validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(
                path.to_string_lossy().to_string(),
            )));
        }

        Figment::new()
            .merge(Serialized::defaults(ValvConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("VALV_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_validation() {
        let config = ValvConfig::default();
        config.validate().expect("Default config should validate");
    }

    #[test]
    fn environment_override() {
        // Override a field via environment variable.
        std::env::set_var("VALV_MEMORY__SUPERBLOCK__MIN_OBJECT_SIZE", "128");
        let config = ValvConfig::load().unwrap();
        assert_eq!(config.memory.superblock.min_object_size, 128);
        std::env::remove_var("VALV_MEMORY__SUPERBLOCK__MIN_OBJECT_SIZE");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ValvConfig::load_from_path("config/does-not-exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
