//! Adaptive location acquisition and caching
//!
//! This library decides where the user currently is for prayer-time, Qibla
//! and nearby-mosque features while keeping GPS calls to a minimum. It
//! combines a manual-location override, an accuracy- and movement-aware
//! cache, deduplicated provider fetches and a fallback chain that always ends
//! in a usable coordinate.

pub mod cache;
pub mod config;
pub mod error;
pub mod location_service;
pub mod logging;
pub mod models;
pub mod permission;
pub mod provider;
pub mod settings;
pub mod store;

// Re-export core types for public API
pub use cache::{AdaptiveLocationCache, CacheStatistics, DEVICE_LOCATION_KEY};
pub use config::LocationConfig;
pub use error::LocationError;
pub use location_service::{LocationService, LocationStatistics};
pub use models::{LocationSettings, Position};
pub use permission::{PermissionCoordinator, PermissionPrompter, PermissionState};
pub use provider::{PositionProvider, ProviderPermission};
pub use settings::SettingsRepository;
pub use store::{FjallStore, KeyValueStore, MemoryStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, LocationError>;
