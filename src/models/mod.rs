//! Data models for the location subsystem
//!
//! This module contains the plain data types organized by concern:
//! - Position: a single geographic fix and distance helpers
//! - Settings: manual-location settings and their persistence keys

pub mod position;
pub mod settings;

// Re-export all public types for convenient access
pub use position::{DEFAULT_LATITUDE, DEFAULT_LONGITUDE, Position};
pub use settings::LocationSettings;
