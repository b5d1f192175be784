//! Custom validation functions for configuration.
//!
//! Provides shared validation logic used across multiple configuration
//! modules.

use validator::ValidationError;

/// Slot alignment every object class must respect.
const ALIGNMENT: usize = 16;

/// Validate that a given value is a power of two.
pub fn validate_power_of_two(value: usize) -> Result<(), ValidationError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_power_of_two"))
    }
}

/// Validate that an object size is a multiple of the slot alignment.
pub fn validate_alignment_multiple(value: usize) -> Result<(), ValidationError> {
    if value % ALIGNMENT == 0 {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_alignment_multiple"))
    }
}

/// Validate a hardware provider mode.
pub fn validate_provider(mode: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^(verbs|sim|none)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(mode) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_provider_mode"))
    }
}
