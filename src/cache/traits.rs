//! Core traits and types for the caching system.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};

use crate::api::cache::LogoNormalizer;

/// Durable string-keyed storage for serialized JSON values.
///
/// Backends store and return opaque strings; (de)serialization and corruption
/// handling live in `KeyValueCache`.
pub trait KeyValueStore: Send + Sync {
  /// Raw stored value for a key.
  fn get_raw(&self, key: &str) -> Result<Option<String>>;

  /// Overwrite a key unconditionally.
  fn set_raw(&self, key: &str, value: &str) -> Result<()>;

  /// Delete a key. Deleting a missing key is not an error.
  fn remove(&self, key: &str) -> Result<()>;

  /// All keys currently stored.
  fn keys(&self) -> Result<Vec<String>>;
}

/// Trait for records held in cached collections.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Entity type name for logging (e.g., "job", "hotel")
  fn entity_type() -> &'static str;

  /// Rewrite fields that need normalizing before the record is cached.
  ///
  /// Runs on every network result and every live push so both paths produce
  /// identical records.
  fn normalize(&mut self, _logos: &LogoNormalizer, _timestamp: i64) {}
}

/// Normalize every record of a freshly received collection.
pub fn normalize_all<T: Cacheable>(mut items: Vec<T>, logos: &LogoNormalizer, timestamp: i64) -> Vec<T> {
  for item in &mut items {
    item.normalize(logos, timestamp);
  }
  items
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// Failure that was swallowed to produce this result, for a transient notice
  pub error: Option<String>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      error: None,
    }
  }

  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      error: None,
    }
  }

  /// Stale cached data served because a reload failed.
  pub fn offline(data: T, error: String) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      error: Some(error),
    }
  }

  /// Empty default served because nothing was cached and the fetch failed.
  pub fn unavailable(data: T, error: String) -> Self {
    Self {
      data,
      source: CacheSource::Unavailable,
      error: Some(error),
    }
  }

  pub fn unauthenticated(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Unauthenticated,
      error: Some("not signed in".to_string()),
    }
  }

  /// Whether the caller should send the user back to sign-in.
  pub fn requires_login(&self) -> bool {
    self.source == CacheSource::Unauthenticated
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      error: self.error,
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network, now cached
  Network,
  /// Served from a present, non-empty cache entry
  Cache,
  /// Reload failed, serving what was cached before
  Offline,
  /// Fetch failed with nothing cached, serving an empty default
  Unavailable,
  /// No credential, serving an empty default
  Unauthenticated,
}
