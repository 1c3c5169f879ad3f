//! Error types and handling for the location subsystem

use thiserror::Error;

/// Main error type for location acquisition, caching and persistence
///
/// Every variant except [`LocationError::ManualLocationNotSet`] is recovered
/// inside `LocationService::get_current_position` by the fallback chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    /// The OS refused location permission
    #[error("Location permission denied")]
    PermissionDenied,

    /// Location services are switched off on the device
    #[error("Location services are disabled")]
    ServiceDisabled,

    /// The provider did not produce a fix in time
    #[error("Location provider timed out after {seconds}s")]
    ProviderTimeout { seconds: u64 },

    /// The provider failed to produce a fix
    #[error("Location provider error: {message}")]
    Provider { message: String },

    /// Manual mode is on but no coordinates were ever configured
    #[error("Manual location mode is enabled but no coordinates are set")]
    ManualLocationNotSet,

    /// Key-value store read or write failed
    #[error("Store error: {message}")]
    Store { message: String },

    /// Coordinates outside of [-90, 90] / [-180, 180]
    #[error("Invalid coordinates: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl LocationError {
    /// Create a new provider error
    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the fallback chain can absorb this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ManualLocationNotSet | Self::Config { .. })
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            LocationError::PermissionDenied => {
                "Location permission was denied. Set your location manually in settings."
                    .to_string()
            }
            LocationError::ServiceDisabled => {
                "Location services are turned off. Enable them or set your location manually."
                    .to_string()
            }
            LocationError::ProviderTimeout { .. } | LocationError::Provider { .. } => {
                "Unable to determine your current location right now.".to_string()
            }
            LocationError::ManualLocationNotSet => {
                "Manual location is enabled but no location has been chosen yet.".to_string()
            }
            LocationError::Store { .. } => {
                "Saved location data could not be accessed.".to_string()
            }
            LocationError::InvalidCoordinates { latitude, longitude } => {
                format!("Invalid coordinates: {latitude}, {longitude}")
            }
            LocationError::Config { message } => format!("Configuration error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let provider_err = LocationError::provider("gps unavailable");
        assert!(matches!(provider_err, LocationError::Provider { .. }));

        let store_err = LocationError::store("disk full");
        assert!(matches!(store_err, LocationError::Store { .. }));

        let config_err = LocationError::config("bad timeout");
        assert!(matches!(config_err, LocationError::Config { .. }));
    }

    #[test]
    fn test_recoverability() {
        assert!(LocationError::PermissionDenied.is_recoverable());
        assert!(LocationError::ProviderTimeout { seconds: 20 }.is_recoverable());
        assert!(LocationError::store("x").is_recoverable());
        assert!(!LocationError::ManualLocationNotSet.is_recoverable());
    }

    #[test]
    fn test_user_messages() {
        assert!(
            LocationError::ServiceDisabled
                .user_message()
                .contains("turned off")
        );
        assert!(
            LocationError::ManualLocationNotSet
                .user_message()
                .contains("no location")
        );
        let invalid = LocationError::InvalidCoordinates {
            latitude: 91.0,
            longitude: 0.0,
        };
        assert!(invalid.user_message().contains("91"));
    }

    #[test]
    fn test_display_includes_timeout() {
        let err = LocationError::ProviderTimeout { seconds: 20 };
        assert_eq!(err.to_string(), "Location provider timed out after 20s");
    }
}
