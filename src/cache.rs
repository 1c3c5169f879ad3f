//! Adaptive location cache
//!
//! Stores recent fixes per key with an expiry derived from the fix accuracy and
//! from how much the user has been moving. A stationary user with a good fix
//! keeps a fix for up to 15 minutes; a moving user with a poor one refreshes
//! every minute.
//!
//! Entries are immutable [`CachedLocation`] values behind an `Arc`; `put`
//! swaps the whole entry so a concurrent `get` never sees a half-written one.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::models::Position;

/// Cache key for the device's own location
pub const DEVICE_LOCATION_KEY: &str = "device_location";

/// Default number of fixes kept per key for movement scoring
pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// Shortest TTL handed out
pub const MIN_TTL: Duration = Duration::from_secs(60);
/// Longest TTL handed out
pub const MAX_TTL: Duration = Duration::from_secs(30 * 60);

/// Average inter-fix distance that counts as fully moving
const MOVEMENT_THRESHOLD_METERS: f64 = 100.0;
/// Score used until two fixes are known
const NEUTRAL_MOVEMENT_SCORE: f64 = 0.5;

/// Distance beyond which a new fix counts as a significant change
pub const SIGNIFICANT_DISTANCE_METERS: f64 = 100.0;
/// Accuracy delta beyond which a new fix counts as a significant change
pub const SIGNIFICANT_ACCURACY_DELTA_METERS: f64 = 50.0;

/// A cached fix with the expiry computed when it was stored
#[derive(Debug, Clone)]
pub struct CachedLocation {
    pub position: Position,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedLocation {
    /// Valid iff `now - cached_at < ttl`
    #[must_use]
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.cached_at) < self.ttl
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }
}

/// Bounded FIFO of recent fixes for one key
#[derive(Debug, Clone)]
pub struct MovementHistory {
    samples: VecDeque<Position>,
    max_samples: usize,
}

impl MovementHistory {
    #[must_use]
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Append a fix, dropping the oldest when full
    pub fn record(&mut self, position: Position) {
        self.samples.push_back(position);
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Oldest first
    pub fn samples(&self) -> impl Iterator<Item = &Position> {
        self.samples.iter()
    }

    #[must_use]
    pub fn movement_score(&self) -> f64 {
        movement_score(self.samples.iter())
    }
}

/// Average distance between consecutive fixes, normalized to [0, 1]
///
/// Returns 0.5 when fewer than two fixes are known.
pub fn movement_score<'a>(history: impl IntoIterator<Item = &'a Position>) -> f64 {
    let mut previous: Option<&Position> = None;
    let mut total = 0.0;
    let mut pairs = 0_u32;

    for position in history {
        if let Some(prev) = previous {
            total += prev.distance_meters(position);
            pairs += 1;
        }
        previous = Some(position);
    }

    if pairs == 0 {
        return NEUTRAL_MOVEMENT_SCORE;
    }

    let average = total / f64::from(pairs);
    (average / MOVEMENT_THRESHOLD_METERS).clamp(0.0, 1.0)
}

/// TTL for a fix of the given accuracy under the given movement score
#[must_use]
pub fn adaptive_ttl(accuracy_meters: f64, movement_score: f64) -> Duration {
    let base_minutes = if accuracy_meters < 50.0 {
        10.0
    } else if accuracy_meters < 100.0 {
        5.0
    } else if accuracy_meters < 500.0 {
        2.0
    } else {
        1.0
    };

    let factor = if movement_score > 0.7 {
        0.5
    } else if movement_score < 0.3 {
        1.5
    } else {
        1.0
    };

    Duration::from_secs_f64(base_minutes * factor * 60.0).clamp(MIN_TTL, MAX_TTL)
}

/// Entry counts for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

/// Per-key maps; callers use a handful of fixed keys, so `history` (bounded per
/// key) outlives evictions and keeps TTLs adaptive across expiry
#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Arc<CachedLocation>>,
    history: HashMap<String, MovementHistory>,
    last_access: HashMap<String, Instant>,
}

impl CacheState {
    fn evict(&mut self, key: &str) -> bool {
        self.last_access.remove(key);
        self.entries.remove(key).is_some()
    }
}

/// Keyed store of recent fixes with adaptive expiry
#[derive(Debug)]
pub struct AdaptiveLocationCache {
    state: RwLock<CacheState>,
    history_size: usize,
}

impl Default for AdaptiveLocationCache {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl AdaptiveLocationCache {
    /// Create a cache keeping `history_size` fixes per key
    #[must_use]
    pub fn new(history_size: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            history_size,
        }
    }

    /// Return the cached fix if still valid, evicting it otherwise
    #[tracing::instrument(name = "query_location_cache", level = "debug", skip(self))]
    pub async fn get(&self, key: &str) -> Option<Position> {
        let now = Instant::now();
        let mut state = self.state.write().await;

        let entry = state.entries.get(key).cloned();
        match entry {
            Some(entry) if entry.is_valid_at(now) => {
                state.last_access.insert(key.to_string(), now);
                debug!("Key found and still fresh");
                Some(entry.position.clone())
            }
            Some(_) => {
                debug!("Key found but expired");
                state.evict(key);
                None
            }
            None => {
                debug!("Key not found");
                None
            }
        }
    }

    /// Store a fix; its TTL comes from its accuracy and the key's movement so far
    #[tracing::instrument(name = "put_location_cache", level = "debug", skip(self, position))]
    pub async fn put(&self, key: &str, position: Position) -> Duration {
        let now = Instant::now();
        let mut state = self.state.write().await;

        let score = state
            .history
            .get(key)
            .map_or(NEUTRAL_MOVEMENT_SCORE, MovementHistory::movement_score);
        let ttl = adaptive_ttl(position.accuracy, score);

        let entry = Arc::new(CachedLocation {
            position: position.clone(),
            cached_at: now,
            ttl,
        });
        state.entries.insert(key.to_string(), entry);
        state
            .history
            .entry(key.to_string())
            .or_insert_with(|| MovementHistory::new(self.history_size))
            .record(position);
        state.last_access.insert(key.to_string(), now);

        debug!(
            accuracy = state.entries[key].position.accuracy,
            movement_score = score,
            ttl_secs = ttl.as_secs(),
            "Cached location"
        );
        ttl
    }

    /// Whether `new_position` differs enough from the stored fix to replace it
    ///
    /// Compares against the stored entry even when it has expired. With nothing
    /// stored every fix is significant.
    pub async fn has_significant_change(&self, key: &str, new_position: &Position) -> bool {
        let state = self.state.read().await;
        let Some(entry) = state.entries.get(key) else {
            return true;
        };

        let moved = entry.position.distance_meters(new_position);
        let accuracy_delta = (entry.position.accuracy - new_position.accuracy).abs();
        moved > SIGNIFICANT_DISTANCE_METERS || accuracy_delta > SIGNIFICANT_ACCURACY_DELTA_METERS
    }

    /// Current movement score for a key
    pub async fn movement_score(&self, key: &str) -> f64 {
        self.state
            .read()
            .await
            .history
            .get(key)
            .map_or(NEUTRAL_MOVEMENT_SCORE, MovementHistory::movement_score)
    }

    /// Snapshot of the stored entry, valid or not
    pub async fn entry(&self, key: &str) -> Option<Arc<CachedLocation>> {
        self.state.read().await.entries.get(key).cloned()
    }

    /// When a key was last read (hit) or written
    pub async fn last_accessed(&self, key: &str) -> Option<Instant> {
        self.state.read().await.last_access.get(key).copied()
    }

    /// Drop the entry and access record for one key; movement history is kept
    pub async fn invalidate(&self, key: &str) {
        if self.state.write().await.evict(key) {
            debug!(key, "Invalidated cached location");
        }
    }

    /// Drop every entry, history and access record
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.history.clear();
        state.last_access.clear();
        info!("Cleared location cache");
    }

    /// Evict every expired entry and return the evicted keys
    ///
    /// Run periodically by the owning service, which decides whether to
    /// refresh any of the returned keys.
    pub async fn sweep(&self) -> Vec<String> {
        let now = Instant::now();
        let mut state = self.state.write().await;

        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_valid_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.evict(key);
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "Swept expired locations");
        }
        expired
    }

    pub async fn statistics(&self) -> CacheStatistics {
        let now = Instant::now();
        let state = self.state.read().await;
        let valid_entries = state
            .entries
            .values()
            .filter(|entry| entry.is_valid_at(now))
            .count();

        CacheStatistics {
            total_entries: state.entries.len(),
            valid_entries,
            expired_entries: state.entries.len() - valid_entries,
        }
    }
}
