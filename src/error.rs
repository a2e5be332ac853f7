//! Error types and handling for the `EnergyDSS` core

use thiserror::Error;

use crate::source::FailureReason;

/// Main error type for the `EnergyDSS` core
#[derive(Error, Debug)]
pub enum DssError {
    /// A single data source failed; contained by the degradation coordinator
    #[error("Source '{slot}' failed: {reason}")]
    SourceFailure { slot: String, reason: FailureReason },

    /// The point has no raster coverage (e.g. offshore)
    #[error("No raster coverage at ({latitude:.4}, {longitude:.4})")]
    NoCoverage { latitude: f64, longitude: f64 },

    /// Region metrics could not be found for the given name
    #[error("Region not found: {name}")]
    RegionNotFound { name: String },

    /// No known place matches the given name
    #[error("Place not found: {name}")]
    PlaceNotFound { name: String },

    /// Device location could not be acquired
    #[error("Location unavailable: {message}")]
    LocationUnavailable { message: String },

    /// Answer not valid for the current wizard state
    #[error("Invalid wizard transition: {message}")]
    InvalidWizardTransition { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl DssError {
    /// Create a new source failure
    pub fn source_failure<S: Into<String>>(slot: S, reason: FailureReason) -> Self {
        Self::SourceFailure {
            slot: slot.into(),
            reason,
        }
    }

    /// Create a new region-not-found error
    pub fn region_not_found<S: Into<String>>(name: S) -> Self {
        Self::RegionNotFound { name: name.into() }
    }

    /// Create a new place-not-found error
    pub fn place_not_found<S: Into<String>>(name: S) -> Self {
        Self::PlaceNotFound { name: name.into() }
    }

    /// Create a new location-unavailable error
    pub fn location_unavailable<S: Into<String>>(message: S) -> Self {
        Self::LocationUnavailable {
            message: message.into(),
        }
    }

    /// Create a new invalid wizard transition error
    pub fn invalid_transition<S: Into<String>>(message: S) -> Self {
        Self::InvalidWizardTransition {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether re-issuing the same request could succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DssError::SourceFailure { .. } | DssError::LocationUnavailable { .. }
        )
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            DssError::SourceFailure { slot, .. } => {
                format!("Data for '{slot}' is temporarily unavailable.")
            }
            DssError::NoCoverage { .. } => {
                "No energy data is available at this location (likely offshore or outside the mapped area)."
                    .to_string()
            }
            DssError::RegionNotFound { name } => {
                format!("No statistics found for region '{name}'.")
            }
            DssError::PlaceNotFound { name } => {
                format!("No known place named '{name}'.")
            }
            DssError::LocationUnavailable { .. } => {
                "Your location could not be determined. Please check location permissions."
                    .to_string()
            }
            DssError::InvalidWizardTransition { .. } => {
                "That option is not available at this step. Please restart the wizard.".to_string()
            }
            DssError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            DssError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            DssError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let region_err = DssError::region_not_found("Jubaland");
        assert!(matches!(region_err, DssError::RegionNotFound { .. }));

        let location_err = DssError::location_unavailable("permission denied");
        assert!(matches!(location_err, DssError::LocationUnavailable { .. }));

        let validation_err = DssError::validation("latitude out of range");
        assert!(matches!(validation_err, DssError::Validation { .. }));
    }

    #[test]
    fn test_user_messages() {
        let coverage_err = DssError::NoCoverage {
            latitude: 1.0,
            longitude: 50.0,
        };
        assert!(coverage_err.user_message().contains("offshore"));

        let region_err = DssError::region_not_found("Atlantis");
        assert!(region_err.user_message().contains("Atlantis"));

        let validation_err = DssError::validation("test input");
        assert!(validation_err.user_message().contains("test input"));
    }

    #[test]
    fn test_hard_failures_are_not_retryable() {
        assert!(
            !DssError::NoCoverage {
                latitude: 0.0,
                longitude: 0.0
            }
            .is_retryable()
        );
        assert!(!DssError::region_not_found("x").is_retryable());
        assert!(DssError::source_failure("pixel-metrics", FailureReason::Timeout).is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let dss_err: DssError = io_err.into();
        assert!(matches!(dss_err, DssError::Io { .. }));
    }
}
