//! Settings repository
//!
//! Holds the typed [`LocationSettings`] in an in-process read cache and
//! mirrors every change into a [`KeyValueStore`]. The read cache is updated
//! before the store write is awaited, so reads in the same process see a change
//! immediately even while the write is still in flight. Store failures are
//! logged and swallowed.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::models::settings::{
    LAST_KNOWN_POSITION_KEY, LOCATION_NAME_KEY, MANUAL_LATITUDE_KEY, MANUAL_LONGITUDE_KEY,
    USE_MANUAL_LOCATION_KEY,
};
use crate::models::{LocationSettings, Position};
use crate::store::KeyValueStore;
use crate::Result;

/// Typed settings cache over a key-value store
pub struct SettingsRepository {
    store: Arc<dyn KeyValueStore>,
    cached: RwLock<LocationSettings>,
}

impl std::fmt::Debug for SettingsRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsRepository")
            .field("cached", &self.current())
            .finish_non_exhaustive()
    }
}

impl SettingsRepository {
    /// Load persisted settings into a fresh read cache
    ///
    /// Unreadable keys are treated as unset.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let settings = LocationSettings {
            use_manual: read_or_default(store.get_bool(USE_MANUAL_LOCATION_KEY).await)
                .unwrap_or(false),
            latitude: read_or_default(store.get_double(MANUAL_LATITUDE_KEY).await),
            longitude: read_or_default(store.get_double(MANUAL_LONGITUDE_KEY).await),
            name: read_or_default(store.get_string(LOCATION_NAME_KEY).await),
        };
        debug!(?settings, "Loaded location settings");

        Self {
            store,
            cached: RwLock::new(settings),
        }
    }

    /// Snapshot of the cached settings
    #[must_use]
    pub fn current(&self) -> LocationSettings {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether manual mode is enabled
    #[must_use]
    pub fn use_manual(&self) -> bool {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .use_manual
    }

    /// Store manual coordinates and an optional display name
    pub async fn set_manual_location(
        &self,
        latitude: f64,
        longitude: f64,
        name: Option<String>,
    ) -> Result<()> {
        Position::validate_coordinates(latitude, longitude)?;

        {
            let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
            cached.latitude = Some(latitude);
            cached.longitude = Some(longitude);
            if name.is_some() {
                cached.name.clone_from(&name);
            }
        }
        info!(latitude, longitude, ?name, "Manual location updated");

        log_write(
            MANUAL_LATITUDE_KEY,
            self.store.set_double(MANUAL_LATITUDE_KEY, latitude).await,
        );
        log_write(
            MANUAL_LONGITUDE_KEY,
            self.store.set_double(MANUAL_LONGITUDE_KEY, longitude).await,
        );
        if let Some(name) = name {
            log_write(
                LOCATION_NAME_KEY,
                self.store.set_string(LOCATION_NAME_KEY, name).await,
            );
        }
        Ok(())
    }

    /// Switch manual mode on or off
    pub async fn set_use_manual_location(&self, use_manual: bool) {
        self.cached
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .use_manual = use_manual;
        info!(use_manual, "Manual location mode changed");

        log_write(
            USE_MANUAL_LOCATION_KEY,
            self.store.set_bool(USE_MANUAL_LOCATION_KEY, use_manual).await,
        );
    }

    /// The persisted last-known position, if any
    ///
    /// A snapshot that no longer parses is removed and reported as absent.
    pub async fn last_known_position(&self) -> Option<Position> {
        let raw = match self.store.get_string(LAST_KNOWN_POSITION_KEY).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read last known position");
                return None;
            }
        };

        match serde_json::from_str::<Position>(&raw) {
            Ok(position) => Some(position),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable last known position");
                log_write(
                    LAST_KNOWN_POSITION_KEY,
                    self.store.remove(LAST_KNOWN_POSITION_KEY).await,
                );
                None
            }
        }
    }

    /// Overwrite the persisted last-known position
    pub async fn save_last_known_position(&self, position: &Position) {
        match serde_json::to_string(position) {
            Ok(json) => log_write(
                LAST_KNOWN_POSITION_KEY,
                self.store.set_string(LAST_KNOWN_POSITION_KEY, json).await,
            ),
            Err(e) => warn!(error = %e, "Failed to encode last known position"),
        }
    }
}

fn read_or_default<T>(result: Result<Option<T>>) -> Option<T> {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to read setting, treating as unset");
        None
    })
}

fn log_write(key: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!(key, error = %e, "Failed to persist setting");
    }
}
