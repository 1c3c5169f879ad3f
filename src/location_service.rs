//! Location Service Module
//!
//! Single entry point for "where is the user right now". Answers, in order:
//! the manual override, the adaptive cache, a deduplicated provider fetch, and
//! finally the fallback chain (last-known position, manual coordinates, Mecca).
//! Apart from a missing manual location, callers always get a coordinate.
//!
//! Two background timers run next to foreground requests: the cache sweep,
//! which evicts expired fixes and optionally re-warms the device location, and
//! the change detector, which polls the provider and overwrites the cache when
//! the user has moved. Neither notifies waiting callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{AdaptiveLocationCache, DEVICE_LOCATION_KEY};
use crate::config::{AcquisitionConfig, LocationConfig};
use crate::models::Position;
use crate::permission::{PermissionCoordinator, PermissionPrompter};
use crate::provider::{PositionProvider, ProviderPermission};
use crate::settings::SettingsRepository;
use crate::store::{FjallStore, KeyValueStore};
use crate::{LocationError, Result};

type SharedFetch = Shared<BoxFuture<'static, Result<Position>>>;

/// The in-flight device fetch that concurrent callers join
struct PendingFetch {
    id: u64,
    fetch: SharedFetch,
}

/// Cache and mode information for diagnostics screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationStatistics {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub is_manual_location: bool,
}

struct ServiceInner {
    provider: Arc<dyn PositionProvider>,
    cache: Arc<AdaptiveLocationCache>,
    settings: Arc<SettingsRepository>,
    acquisition: AcquisitionConfig,
    sweep_interval: Duration,
    pending: Mutex<Option<PendingFetch>>,
    next_fetch_id: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    coordinator: OnceLock<Arc<PermissionCoordinator>>,
}

/// Location façade used by prayer-time, Qibla and mosque-search features
///
/// Cheap to clone; clones share cache, settings and background tasks.
#[derive(Clone)]
pub struct LocationService {
    inner: Arc<ServiceInner>,
}

impl std::fmt::Debug for LocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationService")
            .field("settings", &self.inner.settings)
            .field("fetch_in_flight", &self.has_pending_fetch())
            .finish_non_exhaustive()
    }
}

impl LocationService {
    /// Build the service, loading persisted settings from `store`
    pub async fn new(
        provider: Arc<dyn PositionProvider>,
        store: Arc<dyn KeyValueStore>,
        config: &LocationConfig,
    ) -> Self {
        let settings = Arc::new(SettingsRepository::load(store).await);
        let history_size = usize::try_from(config.cache.history_size).unwrap_or(usize::MAX);
        let cache = Arc::new(AdaptiveLocationCache::new(history_size));
        Self::with_parts(provider, cache, settings, config)
    }

    /// Build the service on the on-disk store named by `config.storage`
    pub async fn open(
        provider: Arc<dyn PositionProvider>,
        config: &LocationConfig,
    ) -> Result<Self> {
        let store = FjallStore::open(&config.storage.location)?;
        info!(location = %config.storage.location, "Opened location store");
        Ok(Self::new(provider, Arc::new(store), config).await)
    }

    /// Build the service from already constructed parts
    pub fn with_parts(
        provider: Arc<dyn PositionProvider>,
        cache: Arc<AdaptiveLocationCache>,
        settings: Arc<SettingsRepository>,
        config: &LocationConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                provider,
                cache,
                settings,
                acquisition: config.acquisition.clone(),
                sweep_interval: config.cache.sweep_interval(),
                pending: Mutex::new(None),
                next_fetch_id: AtomicU64::new(0),
                tasks: Mutex::new(Vec::new()),
                coordinator: OnceLock::new(),
            }),
        }
    }

    /// The service's single permission coordinator
    ///
    /// Created on first call with `prompter`; later calls return the same
    /// coordinator and ignore their prompter, so the flow runs at most once.
    pub fn permission_coordinator(
        &self,
        prompter: Arc<dyn PermissionPrompter>,
    ) -> Arc<PermissionCoordinator> {
        let coordinator = self.inner.coordinator.get_or_init(|| {
            debug!("Creating permission coordinator");
            Arc::new(PermissionCoordinator::new(
                prompter,
                Arc::clone(&self.inner.provider),
                Arc::clone(&self.inner.settings),
            ))
        });
        Arc::clone(coordinator)
    }

    #[must_use]
    pub fn cache(&self) -> Arc<AdaptiveLocationCache> {
        Arc::clone(&self.inner.cache)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<SettingsRepository> {
        Arc::clone(&self.inner.settings)
    }

    /// The user's current position
    ///
    /// Only fails with [`LocationError::ManualLocationNotSet`], when manual mode
    /// is on and no coordinates were ever configured. Every other failure
    /// degrades to the fallback chain.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_current_position(&self) -> Result<Position> {
        if let Some(manual) = self.manual_override()? {
            return Ok(manual);
        }

        if let Some(cached) = self.inner.cache.get(DEVICE_LOCATION_KEY).await {
            debug!("Serving device location from cache");
            return Ok(cached);
        }

        Ok(ServiceInner::fetch_with_fallback(&self.inner).await)
    }

    /// Drop the cached device location and fetch a new one
    ///
    /// A fetch already in flight is joined rather than restarted, so the result
    /// may come from a provider call that began before the invalidation.
    pub async fn refresh_cache(&self) -> Result<Position> {
        self.inner.cache.invalidate(DEVICE_LOCATION_KEY).await;

        if let Some(manual) = self.manual_override()? {
            return Ok(manual);
        }

        Ok(ServiceInner::fetch_with_fallback(&self.inner).await)
    }

    /// Store manual coordinates; they also become the last-known position
    pub async fn set_manual_location(
        &self,
        latitude: f64,
        longitude: f64,
        name: Option<String>,
    ) -> Result<()> {
        self.inner
            .settings
            .set_manual_location(latitude, longitude, name)
            .await?;
        self.inner
            .settings
            .save_last_known_position(&Position::manual(latitude, longitude))
            .await;
        Ok(())
    }

    pub async fn set_use_manual_location(&self, use_manual: bool) {
        self.inner.settings.set_use_manual_location(use_manual).await;
    }

    pub async fn cache_statistics(&self) -> LocationStatistics {
        let cache = self.inner.cache.statistics().await;
        LocationStatistics {
            total_entries: cache.total_entries,
            valid_entries: cache.valid_entries,
            expired_entries: cache.expired_entries,
            is_manual_location: self.inner.settings.use_manual(),
        }
    }

    /// Whether a device fetch is currently in flight
    #[must_use]
    pub fn has_pending_fetch(&self) -> bool {
        self.inner.has_pending_fetch()
    }

    /// Spawn the cache sweep and the change detector
    ///
    /// Calling this again while they run does nothing.
    pub fn start_background_tasks(&self) {
        let mut tasks = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            debug!("Background tasks already running");
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        tasks.push(tokio::spawn(sweep_loop(
            weak.clone(),
            self.inner.sweep_interval,
        )));
        tasks.push(tokio::spawn(change_detector_loop(
            weak,
            self.inner.acquisition.change_detection_interval(),
        )));
        info!(
            sweep_interval_secs = self.inner.sweep_interval.as_secs(),
            change_detection_interval_secs =
                self.inner.acquisition.change_detection_interval().as_secs(),
            "Started location background tasks"
        );
    }

    /// Stop the background tasks
    pub fn dispose(&self) {
        self.inner.abort_tasks();
        info!("Location service disposed");
    }

    fn manual_override(&self) -> Result<Option<Position>> {
        let settings = self.inner.settings.current();
        if !settings.use_manual {
            return Ok(None);
        }
        match settings.manual_position() {
            Some(position) => {
                debug!("Serving manual location");
                Ok(Some(position))
            }
            None => {
                warn!("Manual location mode is on but no coordinates are set");
                Err(LocationError::ManualLocationNotSet)
            }
        }
    }
}

/// Clears the pending slot when the fetch that owns it ends
struct PendingSlotGuard {
    inner: Arc<ServiceInner>,
    id: u64,
}

impl Drop for PendingSlotGuard {
    fn drop(&mut self) {
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if pending.as_ref().is_some_and(|p| p.id == self.id) {
            *pending = None;
        }
    }
}

impl ServiceInner {
    async fn fetch_with_fallback(this: &Arc<Self>) -> Position {
        match Self::shared_fetch(this).await {
            Ok(position) => position,
            Err(e) => {
                warn!(error = %e, "Location fetch failed, using fallback");
                this.fallback().await
            }
        }
    }

    /// Join the in-flight fetch or start a new one
    fn shared_fetch(this: &Arc<Self>) -> SharedFetch {
        let mut pending = this.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(in_flight) = pending.as_ref() {
            debug!(fetch_id = in_flight.id, "Joining in-flight location fetch");
            return in_flight.fetch.clone();
        }

        let id = this.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let owner = Arc::clone(this);
        let fetch = async move {
            let slot = PendingSlotGuard {
                inner: Arc::clone(&owner),
                id,
            };
            let result = owner.acquire().await;
            if let Ok(position) = &result {
                owner.cache.put(DEVICE_LOCATION_KEY, position.clone()).await;
                owner.settings.save_last_known_position(position).await;
            }
            // cleared before any caller sees the result
            drop(slot);
            result
        }
        .boxed()
        .shared();

        *pending = Some(PendingFetch {
            id,
            fetch: fetch.clone(),
        });
        drop(pending);

        // driven to completion even if every caller goes away
        tokio::spawn(fetch.clone());
        debug!(fetch_id = id, "Started location fetch");
        fetch
    }

    /// Permission, service and provider checks, then one bounded provider call
    async fn acquire(&self) -> Result<Position> {
        self.ensure_permission().await?;

        if !self.provider.is_service_enabled().await? {
            return Err(LocationError::ServiceDisabled);
        }

        let hard_timeout = self.acquisition.hard_timeout();
        let request = self
            .provider
            .get_current_position(self.acquisition.acquisition_timeout());
        match tokio::time::timeout(hard_timeout, request).await {
            Ok(Ok(position)) => {
                info!(
                    latitude = position.latitude,
                    longitude = position.longitude,
                    accuracy = position.accuracy,
                    "Acquired device location"
                );
                Ok(position)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LocationError::ProviderTimeout {
                seconds: hard_timeout.as_secs(),
            }),
        }
    }

    async fn ensure_permission(&self) -> Result<()> {
        match self.provider.check_permission().await? {
            ProviderPermission::Granted => Ok(()),
            ProviderPermission::Denied if self.acquisition.request_permission_on_demand => {
                match self.provider.request_permission().await? {
                    ProviderPermission::Granted => Ok(()),
                    _ => Err(LocationError::PermissionDenied),
                }
            }
            ProviderPermission::Denied | ProviderPermission::DeniedForever => {
                Err(LocationError::PermissionDenied)
            }
        }
    }

    /// Last-known position, then manual coordinates, then Mecca
    async fn fallback(&self) -> Position {
        if let Some(last_known) = self.settings.last_known_position().await {
            info!("Using last known position");
            return last_known;
        }

        if let Some(manual) = self.settings.current().manual_position() {
            info!("Using manual coordinates as fallback");
            return manual;
        }

        warn!("No location available, using default location");
        Position::default_location()
    }

    fn has_pending_fetch(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// One uncached provider query with the short timeout; never fails
    async fn poll_quietly(&self) -> Option<Position> {
        if self.settings.use_manual() || self.has_pending_fetch() {
            return None;
        }

        match self.provider.check_permission().await {
            Ok(ProviderPermission::Granted) => {}
            Ok(permission) => {
                debug!(?permission, "Skipping background poll without permission");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "Background permission check failed");
                return None;
            }
        }

        match self.provider.is_service_enabled().await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                debug!(error = %e, "Background service check failed");
                return None;
            }
        }

        let timeout = self.acquisition.change_detection_timeout();
        match tokio::time::timeout(timeout, self.provider.get_current_position(timeout)).await {
            Ok(Ok(position)) => Some(position),
            Ok(Err(e)) => {
                debug!(error = %e, "Background location poll failed");
                None
            }
            Err(_) => {
                debug!("Background location poll timed out");
                None
            }
        }
    }

    async fn detect_change(&self) {
        let Some(position) = self.poll_quietly().await else {
            return;
        };

        if self
            .cache
            .has_significant_change(DEVICE_LOCATION_KEY, &position)
            .await
        {
            info!(
                latitude = position.latitude,
                longitude = position.longitude,
                "Significant location change detected"
            );
            self.cache.put(DEVICE_LOCATION_KEY, position.clone()).await;
            self.settings.save_last_known_position(&position).await;
        }
    }

    async fn refresh_expired_device_location(&self) {
        let Some(position) = self.poll_quietly().await else {
            return;
        };
        debug!("Re-warmed expired device location");
        self.cache.put(DEVICE_LOCATION_KEY, position.clone()).await;
        self.settings.save_last_known_position(&position).await;
    }

    fn abort_tasks(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Shortest background tick; a zero period would make tokio panic
const MIN_TICK_PERIOD: Duration = Duration::from_secs(1);

fn ticker(period: Duration) -> tokio::time::Interval {
    if period < MIN_TICK_PERIOD {
        warn!(?period, "Background interval too short, using 1 second");
    }
    let period = period.max(MIN_TICK_PERIOD);
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn sweep_loop(inner: Weak<ServiceInner>, period: Duration) {
    let mut interval = ticker(period);
    loop {
        interval.tick().await;
        let Some(service) = inner.upgrade() else {
            break;
        };

        let expired = service.cache.sweep().await;
        if service.acquisition.proactive_refresh
            && expired.iter().any(|key| key == DEVICE_LOCATION_KEY)
        {
            service.refresh_expired_device_location().await;
        }
    }
}

async fn change_detector_loop(inner: Weak<ServiceInner>, period: Duration) {
    let mut interval = ticker(period);
    loop {
        interval.tick().await;
        let Some(service) = inner.upgrade() else {
            break;
        };
        service.detect_change().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    /// Provider that returns one fixed fix after an optional delay
    struct FixedProvider {
        fix: Mutex<Position>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(latitude: f64, longitude: f64, delay: Duration) -> Self {
            Self {
                fix: Mutex::new(Position::new(latitude, longitude, 20.0, Utc::now())),
                delay,
                calls: AtomicUsize::new(0),
            }
        }

        fn move_to(&self, latitude: f64, longitude: f64) {
            *self.fix.lock().unwrap() = Position::new(latitude, longitude, 20.0, Utc::now());
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PositionProvider for FixedProvider {
        async fn check_permission(&self) -> Result<ProviderPermission> {
            Ok(ProviderPermission::Granted)
        }

        async fn request_permission(&self) -> Result<ProviderPermission> {
            Ok(ProviderPermission::Granted)
        }

        async fn is_service_enabled(&self) -> Result<bool> {
            Ok(true)
        }

        async fn get_current_position(&self, _timeout: Duration) -> Result<Position> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.fix.lock().unwrap().clone())
        }
    }

    async fn service(provider: Arc<FixedProvider>) -> LocationService {
        LocationService::new(
            provider,
            Arc::new(MemoryStore::new()),
            &LocationConfig::default(),
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_slot_cleared_after_timeout() {
        let provider = Arc::new(FixedProvider::new(10.0, 10.0, Duration::from_secs(60)));
        let service = service(provider.clone()).await;

        let position = service.get_current_position().await.unwrap();
        assert!(position.is_default_location());
        assert!(!service.has_pending_fetch());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_slot_cleared_after_success() {
        let provider = Arc::new(FixedProvider::new(10.0, 10.0, Duration::from_secs(1)));
        let service = service(provider.clone()).await;

        let position = service.get_current_position().await.unwrap();
        assert_eq!(position.latitude, 10.0);
        assert!(!service.has_pending_fetch());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_cache_joins_in_flight_fetch() {
        let provider = Arc::new(FixedProvider::new(10.0, 10.0, Duration::from_secs(2)));
        let service = service(provider.clone()).await;

        let background = tokio::spawn({
            let service = service.clone();
            async move { service.get_current_position().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(service.has_pending_fetch());

        let refreshed = service.refresh_cache().await.unwrap();
        let first = background.await.unwrap().unwrap();
        assert_eq!(refreshed, first);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_detector_warms_cache_on_movement() {
        let provider = Arc::new(FixedProvider::new(10.0, 10.0, Duration::ZERO));
        let service = service(provider.clone()).await;
        service.get_current_position().await.unwrap();

        service.start_background_tasks();
        provider.move_to(10.01, 10.0);
        tokio::time::sleep(Duration::from_secs(61)).await;

        let calls = provider.calls();
        assert!(calls >= 2);
        let position = service.get_current_position().await.unwrap();
        assert_eq!(position.latitude, 10.01);
        assert_eq!(provider.calls(), calls);
        service.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_detector_ignores_small_moves() {
        let provider = Arc::new(FixedProvider::new(10.0, 10.0, Duration::ZERO));
        let service = service(provider.clone()).await;
        let first = service.get_current_position().await.unwrap();

        service.start_background_tasks();
        provider.move_to(10.000_1, 10.0);
        tokio::time::sleep(Duration::from_secs(61)).await;

        let position = service.get_current_position().await.unwrap();
        assert_eq!(position, first);
        service.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_rewarms_expired_device_location() {
        let provider = Arc::new(FixedProvider::new(10.0, 10.0, Duration::ZERO));
        let mut config = LocationConfig::default();
        // keep the change detector out of the way
        config.acquisition.change_detection_interval_seconds = 3600;
        config.cache.sweep_interval_minutes = 20;
        let service =
            LocationService::new(provider.clone(), Arc::new(MemoryStore::new()), &config).await;

        service.get_current_position().await.unwrap();
        service.start_background_tasks();
        provider.move_to(10.5, 10.0);
        tokio::time::sleep(Duration::from_secs(20 * 60 + 1)).await;

        let stats = service.cache_statistics().await;
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(provider.calls(), 2);
        assert_eq!(service.get_current_position().await.unwrap().latitude, 10.5);
        service.dispose();
    }

    /// Provider whose background polls fail in scripted ways before succeeding
    ///
    /// Poll 0 fails the permission check, poll 1 fails the fix, poll 2 hangs
    /// past every timeout, later polls return `fix`.
    struct FlakyProvider {
        fix: Position,
        polls: AtomicUsize,
    }

    #[async_trait]
    impl PositionProvider for FlakyProvider {
        async fn check_permission(&self) -> Result<ProviderPermission> {
            if self.polls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(LocationError::provider("permission service unavailable"));
            }
            Ok(ProviderPermission::Granted)
        }

        async fn request_permission(&self) -> Result<ProviderPermission> {
            Ok(ProviderPermission::Granted)
        }

        async fn is_service_enabled(&self) -> Result<bool> {
            Ok(true)
        }

        async fn get_current_position(&self, _timeout: Duration) -> Result<Position> {
            match self.polls.load(Ordering::SeqCst) {
                2 => Err(LocationError::provider("no satellites")),
                3 => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(self.fix.clone())
                }
                _ => Ok(self.fix.clone()),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_detector_survives_failing_polls() {
        let provider = Arc::new(FlakyProvider {
            fix: Position::new(10.5, 10.0, 20.0, Utc::now()),
            polls: AtomicUsize::new(0),
        });
        let service = LocationService::new(
            provider.clone(),
            Arc::new(MemoryStore::new()),
            &LocationConfig::default(),
        )
        .await;
        let cache = service.cache();
        cache
            .put(DEVICE_LOCATION_KEY, Position::new(10.0, 10.0, 20.0, Utc::now()))
            .await;

        // ticks at 60s, 120s and 180s fail; the 180s poll times out at 190s
        service.start_background_tasks();
        tokio::time::sleep(Duration::from_secs(200)).await;

        assert_eq!(provider.polls.load(Ordering::SeqCst), 3);
        assert_eq!(service.get_current_position().await.unwrap().latitude, 10.0);
        assert!(!service.has_pending_fetch());
        assert!(
            service
                .inner
                .tasks
                .lock()
                .unwrap()
                .iter()
                .all(|task| !task.is_finished())
        );

        tokio::time::sleep(Duration::from_secs(41)).await;
        assert_eq!(service.get_current_position().await.unwrap().latitude, 10.5);
        service.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_intervals_do_not_kill_background_tasks() {
        let provider = Arc::new(FixedProvider::new(10.0, 10.0, Duration::ZERO));
        let mut config = LocationConfig::default();
        config.cache.sweep_interval_minutes = 0;
        config.acquisition.change_detection_interval_seconds = 0;
        let service = LocationService::with_parts(
            provider.clone(),
            Arc::new(AdaptiveLocationCache::default()),
            Arc::new(SettingsRepository::load(Arc::new(MemoryStore::new())).await),
            &config,
        );

        service.start_background_tasks();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let tasks = service.inner.tasks.lock().unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|task| !task.is_finished()));
        drop(tasks);
        assert!(provider.calls() >= 1);
        service.dispose();
    }

    #[tokio::test]
    async fn test_start_background_tasks_is_idempotent() {
        let provider = Arc::new(FixedProvider::new(0.0, 0.0, Duration::ZERO));
        let service = service(provider).await;

        service.start_background_tasks();
        service.start_background_tasks();
        assert_eq!(service.inner.tasks.lock().unwrap().len(), 2);

        service.dispose();
        assert!(service.inner.tasks.lock().unwrap().is_empty());
    }
}
