//! One-shot permission acquisition
//!
//! [`PermissionCoordinator`] walks the user through the explanation screen,
//! the notification prompt and the location prompt, once per process. Any
//! denial of location (or of the explanation) switches the app to manual
//! location mode so nothing ever blocks on a missing permission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::provider::{PositionProvider, ProviderPermission};
use crate::settings::SettingsRepository;

/// UI side of the permission flow
#[async_trait]
pub trait PermissionPrompter: Send + Sync {
    /// Explain why location is needed; `true` when the user accepts
    async fn show_explanation(&self) -> anyhow::Result<bool>;

    /// Explain again after a denial; `true` when the user wants to retry
    async fn show_rationale(&self) -> anyhow::Result<bool>;

    /// Ask for notification permission; `true` when granted
    async fn request_notification_permission(&self) -> anyhow::Result<bool>;
}

/// Progress of the permission flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionState {
    NotStarted,
    ExplanationShown,
    NotificationRequested,
    Completed,
    Denied,
}

impl PermissionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Denied)
    }
}

/// Drives the permission flow exactly once and publishes its transitions
pub struct PermissionCoordinator {
    prompter: Arc<dyn PermissionPrompter>,
    provider: Arc<dyn PositionProvider>,
    settings: Arc<SettingsRepository>,
    state: RwLock<PermissionState>,
    started: AtomicBool,
    events: broadcast::Sender<PermissionState>,
}

impl std::fmt::Debug for PermissionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCoordinator")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PermissionCoordinator {
    pub fn new(
        prompter: Arc<dyn PermissionPrompter>,
        provider: Arc<dyn PositionProvider>,
        settings: Arc<SettingsRepository>,
    ) -> Self {
        // every transition fits in the buffer, so no subscriber can lag
        let (events, _) = broadcast::channel(8);
        Self {
            prompter,
            provider,
            settings,
            state: RwLock::new(PermissionState::NotStarted),
            started: AtomicBool::new(false),
            events,
        }
    }

    #[must_use]
    pub fn state(&self) -> PermissionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stream of transitions from now on, ending after the terminal state
    pub fn subscribe(&self) -> BoxStream<'static, PermissionState> {
        transitions(self.events.subscribe())
    }

    /// Start the flow in the background and stream its transitions
    ///
    /// Only the first call runs the flow; later calls return an empty stream.
    pub fn start(self: &Arc<Self>) -> BoxStream<'static, PermissionState> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Permission flow already started");
            return stream::empty().boxed();
        }

        let receiver = self.events.subscribe();
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.run().await;
        });
        transitions(receiver)
    }

    async fn run(&self) {
        info!("Starting permission flow");

        self.transition(PermissionState::ExplanationShown);
        if !accepted("explanation", self.prompter.show_explanation().await) {
            self.deny().await;
            return;
        }

        self.transition(PermissionState::NotificationRequested);
        // notification denial does not stop the flow
        if !accepted(
            "notification permission",
            self.prompter.request_notification_permission().await,
        ) {
            info!("Notification permission not granted, continuing");
        }

        if self.acquire_location_permission().await {
            self.transition(PermissionState::Completed);
            info!("Permission flow completed");
        } else {
            self.deny().await;
        }
    }

    async fn acquire_location_permission(&self) -> bool {
        match self.provider.check_permission().await {
            Ok(ProviderPermission::Granted) => return true,
            Ok(ProviderPermission::DeniedForever) => {
                info!("Location permission permanently denied");
                return false;
            }
            Ok(ProviderPermission::Denied) => {}
            Err(e) => {
                warn!(error = %e, "Failed to check location permission");
                return false;
            }
        }

        match self.request_location_permission().await {
            Some(ProviderPermission::Granted) => true,
            Some(ProviderPermission::Denied) => {
                let retry = accepted("rationale", self.prompter.show_rationale().await);
                retry
                    && self.request_location_permission().await == Some(ProviderPermission::Granted)
            }
            Some(ProviderPermission::DeniedForever) | None => false,
        }
    }

    async fn request_location_permission(&self) -> Option<ProviderPermission> {
        match self.provider.request_permission().await {
            Ok(permission) => {
                debug!(?permission, "Location permission requested");
                Some(permission)
            }
            Err(e) => {
                warn!(error = %e, "Location permission request failed");
                None
            }
        }
    }

    async fn deny(&self) {
        warn!("Location permission denied, switching to manual location");
        // manual mode is in place before listeners observe the denial
        self.settings.set_use_manual_location(true).await;
        self.transition(PermissionState::Denied);
    }

    fn transition(&self, next: PermissionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
        debug!(state = ?next, "Permission state changed");
        // no receivers is fine
        let _ = self.events.send(next);
    }
}

/// Prompt errors count as a refusal
fn accepted(step: &str, result: anyhow::Result<bool>) -> bool {
    result.unwrap_or_else(|e| {
        warn!(step, error = %e, "Permission prompt failed, treating as declined");
        false
    })
}

fn transitions(
    receiver: broadcast::Receiver<PermissionState>,
) -> BoxStream<'static, PermissionState> {
    stream::unfold(Some(receiver), |receiver| async move {
        let mut receiver = receiver?;
        loop {
            match receiver.recv().await {
                Ok(state) if state.is_terminal() => return Some((state, None)),
                Ok(state) => return Some((state, Some(receiver))),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Permission listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
