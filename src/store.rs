//! Durable key-value storage for settings and the last-known position
//!
//! [`KeyValueStore`] is the boundary the rest of the crate talks to. Two
//! implementations ship with the crate: [`FjallStore`] persists values on disk,
//! [`MemoryStore`] keeps them in process memory.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;
use fjall::Keyspace;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task;
use tracing::warn;

use crate::{LocationError, Result};

/// A value as written to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

/// Durable string/number/bool storage
///
/// Implementations serialize their own writes; callers do not lock around them.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a raw value
    async fn get(&self, key: &str) -> Result<Option<StoredValue>>;

    /// Write a raw value
    async fn set(&self, key: &str, value: StoredValue) -> Result<()>;

    /// Delete a key; missing keys are not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// Whether a key is present
    async fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key).await? {
            Some(StoredValue::Text(value)) => Ok(Some(value)),
            Some(other) => {
                warn!(key, ?other, "Stored value is not a string");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn get_double(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key).await? {
            Some(StoredValue::Number(value)) => Ok(Some(value)),
            Some(other) => {
                warn!(key, ?other, "Stored value is not a number");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key).await? {
            Some(StoredValue::Flag(value)) => Ok(Some(value)),
            Some(other) => {
                warn!(key, ?other, "Stored value is not a bool");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_string(&self, key: &str, value: String) -> Result<()> {
        self.set(key, StoredValue::Text(value)).await
    }

    async fn set_double(&self, key: &str, value: f64) -> Result<()> {
        self.set(key, StoredValue::Number(value)).await
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, StoredValue::Flag(value)).await
    }
}

/// In-process store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: StoredValue) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// On-disk store backed by a fjall keyspace
pub struct FjallStore {
    store: Keyspace,
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> anyhow::Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

fn store_error<E: std::fmt::Display>(err: E) -> LocationError {
    LocationError::store(err.to_string())
}

impl FjallStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open().map_err(store_error)?;
        let items = db
            .keyspace("location", fjall::KeyspaceCreateOptions::default)
            .map_err(store_error)?;
        Ok(FjallStore { store: items })
    }
}

impl Debug for FjallStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FjallStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for FjallStore {
    #[tracing::instrument(name = "query_store", level = "debug", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes = task::spawn_blocking(move || get_from_store(store, key_bytes))
            .await
            .map_err(store_error)?
            .map_err(store_error)?;

        match maybe_bytes {
            Some(bytes) => {
                let value: StoredValue = postcard::from_bytes(&bytes).map_err(store_error)?;
                Ok(Some(value))
            }
            None => {
                tracing::debug!("Key not found");
                Ok(None)
            }
        }
    }

    #[tracing::instrument(name = "put_store", level = "debug", skip(self))]
    async fn set(&self, key: &str, value: StoredValue) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let bytes = postcard::to_stdvec(&value).map_err(store_error)?;

        task::spawn_blocking(move || store.insert(key, bytes))
            .await
            .map_err(store_error)?
            .map_err(store_error)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key))
            .await
            .map_err(store_error)?
            .map_err(store_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_typed_access() {
        let store = MemoryStore::new();
        store.set_double("lat", 21.5).await.unwrap();
        store.set_bool("flag", true).await.unwrap();
        store.set_string("name", "Home".to_string()).await.unwrap();

        assert_eq!(store.get_double("lat").await.unwrap(), Some(21.5));
        assert_eq!(store.get_bool("flag").await.unwrap(), Some(true));
        assert_eq!(
            store.get_string("name").await.unwrap(),
            Some("Home".to_string())
        );
        assert!(store.contains_key("lat").await.unwrap());

        store.remove("lat").await.unwrap();
        assert!(!store.contains_key("lat").await.unwrap());
        assert_eq!(store.get_double("lat").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_type_mismatch_reads_as_absent() {
        let store = MemoryStore::new();
        store.set_string("lat", "not a number".to_string()).await.unwrap();
        assert_eq!(store.get_double("lat").await.unwrap(), None);
        assert_eq!(store.get_bool("lat").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fjall_store_round_trips_typed_values() {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path()).unwrap();

        store.set_double("manual_latitude", 48.85).await.unwrap();
        store.set_bool("use_manual_location", true).await.unwrap();
        store.set_string("location_name", "Paris".to_string()).await.unwrap();

        assert_eq!(store.get_double("manual_latitude").await.unwrap(), Some(48.85));
        assert_eq!(store.get_bool("use_manual_location").await.unwrap(), Some(true));
        assert_eq!(
            store.get_string("location_name").await.unwrap(),
            Some("Paris".to_string())
        );
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.remove("location_name").await.unwrap();
        assert!(!store.contains_key("location_name").await.unwrap());
    }
}
