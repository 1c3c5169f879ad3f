//! Position model for a single geographic fix

use chrono::{DateTime, Utc};
use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};

use crate::error::LocationError;

/// Latitude of the Kaaba, used when no other source is available
pub const DEFAULT_LATITUDE: f64 = 21.422_487;
/// Longitude of the Kaaba, used when no other source is available
pub const DEFAULT_LONGITUDE: f64 = 39.826_206;

/// An immutable position fix
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Position {
    /// Latitude in decimal degrees, [-90, 90]
    pub latitude: f64,
    /// Longitude in decimal degrees, [-180, 180]
    pub longitude: f64,
    /// Horizontal accuracy in meters (lower is better)
    pub accuracy: f64,
    /// When the fix was taken
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Create a new position fix
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: accuracy.max(0.0),
            timestamp,
        }
    }

    /// Synthesize a position from user-entered coordinates
    #[must_use]
    pub fn manual(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, 0.0, Utc::now())
    }

    /// The static last-resort position (Mecca)
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(DEFAULT_LATITUDE, DEFAULT_LONGITUDE, 0.0, Utc::now())
    }

    /// Check coordinate ranges
    pub fn validate_coordinates(latitude: f64, longitude: f64) -> crate::Result<()> {
        if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
            Ok(())
        } else {
            Err(LocationError::InvalidCoordinates {
                latitude,
                longitude,
            })
        }
    }

    /// Great-circle distance to another fix in meters
    #[must_use]
    pub fn distance_meters(&self, other: &Position) -> f64 {
        let from = HaversineLocation {
            latitude: self.latitude,
            longitude: self.longitude,
        };
        let to = HaversineLocation {
            latitude: other.latitude,
            longitude: other.longitude,
        };
        distance(from, to, Units::Kilometers) * 1000.0
    }

    /// Whether this is exactly the static default coordinate
    #[must_use]
    pub fn is_default_location(&self) -> bool {
        self.latitude == DEFAULT_LATITUDE && self.longitude == DEFAULT_LONGITUDE
    }

    /// Format position as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}
