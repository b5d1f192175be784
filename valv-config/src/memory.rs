//! Memory geometry configuration.
//!
//! Sizes the superblocks the allocator carves into fixed-size slots. The
//! owning heap reads these to decide how much caller memory to hand each
//! superblock.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Memory allocation configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct MemoryConfig {
    /// Superblock geometry shared by every size class.
    #[validate(nested)]
    pub superblock: SuperblockConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            superblock: SuperblockConfig::default(),
        }
    }
}

/// Superblock geometry.
///
/// `superblock_bytes` is slot capacity only; callers add the padded header
/// on top when sizing the backing buffer.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct SuperblockConfig {
    /// Slot capacity of one superblock (bytes, power of two).
    #[serde(default = "default_superblock_bytes")]
    #[validate(range(min = 65536, max = 67108864))]
    #[validate(custom(function = validation::validate_power_of_two))]
    pub superblock_bytes: usize,

    /// Smallest object class served (bytes, multiple of the slot
    /// alignment).
    #[serde(default = "default_min_object_size")]
    #[validate(range(min = 16, max = 65536))]
    #[validate(custom(function = validation::validate_alignment_multiple))]
    pub min_object_size: usize,
}

fn default_superblock_bytes() -> usize {
    1048576
}

fn default_min_object_size() -> usize {
    64
}

impl Default for SuperblockConfig {
    fn default() -> Self {
        Self {
            superblock_bytes: default_superblock_bytes(),
            min_object_size: default_min_object_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        MemoryConfig::default().validate().expect("default memory config");
    }

    #[test]
    fn non_power_of_two_superblock_is_rejected() {
        let config = SuperblockConfig {
            superblock_bytes: 1048577,
            ..SuperblockConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unaligned_object_class_is_rejected() {
        let config = SuperblockConfig {
            min_object_size: 60,
            ..SuperblockConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
