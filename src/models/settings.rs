//! Typed manual-location settings and their persistence keys

use serde::{Deserialize, Serialize};

use super::Position;

/// Persistence key for the manual latitude
pub const MANUAL_LATITUDE_KEY: &str = "manual_latitude";
/// Persistence key for the manual longitude
pub const MANUAL_LONGITUDE_KEY: &str = "manual_longitude";
/// Persistence key for the manual location name
pub const LOCATION_NAME_KEY: &str = "location_name";
/// Persistence key for the manual-mode flag
pub const USE_MANUAL_LOCATION_KEY: &str = "use_manual_location";
/// Persistence key for the last-known position snapshot
pub const LAST_KNOWN_POSITION_KEY: &str = "last_known_position";

/// Manual-location settings as held in memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationSettings {
    /// Whether the manual location overrides the device
    pub use_manual: bool,
    /// Manually configured latitude
    pub latitude: Option<f64>,
    /// Manually configured longitude
    pub longitude: Option<f64>,
    /// Display name of the manual location
    pub name: Option<String>,
}

impl LocationSettings {
    /// Manual coordinates, if both halves were ever configured
    #[must_use]
    pub fn manual_coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Manual coordinates as a synthesized position
    #[must_use]
    pub fn manual_position(&self) -> Option<Position> {
        self.manual_coordinates()
            .map(|(lat, lon)| Position::manual(lat, lon))
    }
}
