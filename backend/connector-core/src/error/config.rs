use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("Validation Error: {reason} {location}")]
    Validation {
        reason: String,
        location: ErrorLocation,
    },
}
