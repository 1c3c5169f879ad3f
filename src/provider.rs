//! Boundary to the platform location API

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::models::Position;

/// Location permission as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderPermission {
    Granted,
    /// Denied, but the platform will show the prompt again
    Denied,
    /// Denied and the platform will not prompt any more
    DeniedForever,
}

impl ProviderPermission {
    #[must_use]
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }
}

/// Source of single position fixes
///
/// Implemented per platform. All calls may suspend; none are CPU bound.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Current permission status without prompting
    async fn check_permission(&self) -> Result<ProviderPermission>;

    /// Prompt the user for location permission
    async fn request_permission(&self) -> Result<ProviderPermission>;

    /// Whether device location services are switched on
    async fn is_service_enabled(&self) -> Result<bool>;

    /// Acquire one fix, giving up after `timeout`
    async fn get_current_position(&self, timeout: Duration) -> Result<Position>;
}
