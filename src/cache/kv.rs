//! JSON key-value cache over a storage backend.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::keys::CacheKey;
use super::traits::KeyValueStore;

/// Typed get/set/remove over a `KeyValueStore`.
///
/// A stored value that is not valid JSON, or does not fit the requested type,
/// is deleted and reported as absent.
#[derive(Clone)]
pub struct KeyValueCache {
  store: Arc<dyn KeyValueStore>,
}

impl KeyValueCache {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self { store }
  }

  pub fn get<T: DeserializeOwned>(&self, key: CacheKey) -> Result<Option<T>> {
    let raw = match self.store.get_raw(key.as_str())? {
      Some(raw) => raw,
      None => return Ok(None),
    };

    match serde_json::from_str::<T>(&raw) {
      Ok(value) => Ok(Some(value)),
      Err(e) => {
        warn!(key = %key, error = %e, "dropping corrupt cache entry");
        self.store.remove(key.as_str())?;
        Ok(None)
      }
    }
  }

  pub fn set<T: Serialize + ?Sized>(&self, key: CacheKey, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)
      .map_err(|e| eyre!("Failed to serialize cache value for {}: {}", key, e))?;
    self.store.set_raw(key.as_str(), &raw)?;
    debug!(key = %key, bytes = raw.len(), "cache write");
    Ok(())
  }

  pub fn remove(&self, key: CacheKey) -> Result<()> {
    self.store.remove(key.as_str())
  }

  /// Whether a key currently holds a value (without decoding it).
  pub fn contains(&self, key: CacheKey) -> Result<bool> {
    Ok(self.store.get_raw(key.as_str())?.is_some())
  }

  pub fn store(&self) -> &Arc<dyn KeyValueStore> {
    &self.store
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStorage;
  use serde::Deserialize;

  #[derive(Debug, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: u32,
  }

  fn cache() -> KeyValueCache {
    KeyValueCache::new(Arc::new(MemoryStorage::new()))
  }

  #[test]
  fn test_set_then_get() {
    let cache = cache();
    cache.set(CacheKey::Jobs, &vec![Item { id: 1 }]).unwrap();
    let items: Vec<Item> = cache.get(CacheKey::Jobs).unwrap().unwrap();
    assert_eq!(items, vec![Item { id: 1 }]);
  }

  #[test]
  fn test_missing_key_is_none() {
    let items: Option<Vec<Item>> = cache().get(CacheKey::Hotels).unwrap();
    assert!(items.is_none());
  }

  #[test]
  fn test_invalid_json_self_heals() {
    let cache = cache();
    cache.store().set_raw("cache_jobs", "{not json").unwrap();

    let items: Option<Vec<Item>> = cache.get(CacheKey::Jobs).unwrap();
    assert!(items.is_none());
    assert_eq!(cache.store().get_raw("cache_jobs").unwrap(), None);
  }

  #[test]
  fn test_shape_mismatch_self_heals() {
    let cache = cache();
    cache.store().set_raw("cache_jobs", r#"{"id": 1}"#).unwrap();

    let items: Option<Vec<Item>> = cache.get(CacheKey::Jobs).unwrap();
    assert!(items.is_none());
    assert!(!cache.contains(CacheKey::Jobs).unwrap());
  }
}
