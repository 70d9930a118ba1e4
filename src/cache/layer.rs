//! Cache layer that orchestrates caching logic with network fetching.

use chrono::Utc;
use color_eyre::{eyre::Report, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::api::cache::LogoNormalizer;
use crate::auth::CredentialStore;
use crate::error::SyncError;

use super::keys::CacheKey;
use super::repository::EntityCache;
use super::traits::{normalize_all, CacheResult, Cacheable};

/// How a read treats an existing cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
  /// Serve a present, non-empty entry without touching the network
  CacheFirst,
  /// Always go to the network and overwrite the entry on success
  Force,
}

impl FetchMode {
  pub fn forced(force: bool) -> Self {
    if force {
      Self::Force
    } else {
      Self::CacheFirst
    }
  }
}

/// Cache-first fetch orchestration.
///
/// There is no TTL: an entry is served until a live push or a forced reload
/// replaces it. Concurrent reads of the same key are serialized so a cold
/// cache is fetched once; live pushes write without waiting (last writer wins).
#[derive(Clone)]
pub struct CacheLayer {
  cache: EntityCache,
  credentials: Arc<dyn CredentialStore>,
  logos: LogoNormalizer,
  in_flight: Arc<Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl CacheLayer {
  pub fn new(
    cache: EntityCache,
    credentials: Arc<dyn CredentialStore>,
    logos: LogoNormalizer,
  ) -> Self {
    Self {
      cache,
      credentials,
      logos,
      in_flight: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn cache(&self) -> &EntityCache {
    &self.cache
  }

  pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
    &self.credentials
  }

  pub fn logos(&self) -> &LogoNormalizer {
    &self.logos
  }

  /// Read a collection with the cache-first strategy.
  ///
  /// 1. Unless forced, return a present, non-empty cache entry immediately
  /// 2. Otherwise require a credential and call `fetcher` with it
  /// 3. Normalize and store the result, then return it
  /// 4. On failure, serve what was cached (if anything) or an empty list
  ///
  /// Never fails: swallowed errors are reported through `CacheResult::error`.
  pub async fn fetch_list<T, F, Fut>(
    &self,
    key: CacheKey,
    mode: FetchMode,
    fetcher: F,
  ) -> CacheResult<Vec<T>>
  where
    T: Cacheable,
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    if mode == FetchMode::CacheFirst {
      if let Some(cached) = self.cached_non_empty::<T>(key) {
        debug!(key = %key, count = cached.len(), "cache hit");
        return CacheResult::from_cache(cached);
      }
    }

    let lock = self.key_lock(key);
    let _guard = lock.lock().await;

    // Another reader may have filled the entry while we waited
    if mode == FetchMode::CacheFirst {
      if let Some(cached) = self.cached_non_empty::<T>(key) {
        debug!(key = %key, "cache filled by concurrent fetch");
        return CacheResult::from_cache(cached);
      }
    }

    debug!(key = %key, ?mode, entity = T::entity_type(), "fetching from network");
    match self.refresh(key, fetcher).await {
      Ok(data) => CacheResult::from_network(data),
      Err(e) if SyncError::is_auth(&e) => {
        warn!(key = %key, "no valid credential, skipping fetch");
        CacheResult::unauthenticated(Vec::new())
      }
      Err(e) => {
        warn!(key = %key, error = %e, "failed to load collection");
        match self.cached_non_empty::<T>(key) {
          Some(stale) => CacheResult::offline(stale, e.to_string()),
          None => CacheResult::unavailable(Vec::new(), e.to_string()),
        }
      }
    }
  }

  /// Fetch a mandatory single resource. Failures propagate.
  pub async fn fetch_required<T, F, Fut>(&self, fetcher: F) -> Result<T>
  where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let token = self.require_token().await?;
    fetcher(token).await
  }

  /// Current token or an auth error.
  pub async fn require_token(&self) -> Result<String> {
    self
      .credentials
      .token()
      .await?
      .ok_or_else(|| Report::new(SyncError::Auth))
  }

  /// Normalize and store a collection received from anywhere.
  pub fn store_list<T: Cacheable>(&self, key: CacheKey, items: Vec<T>) -> Result<Vec<T>> {
    let items = normalize_all(items, &self.logos, Utc::now().timestamp_millis());
    self.cache.kv().set(key, &items)?;
    Ok(items)
  }

  async fn refresh<T, F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<Vec<T>>
  where
    T: Cacheable,
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let token = self.require_token().await?;
    let data = fetcher(token).await?;
    let data = normalize_all(data, &self.logos, Utc::now().timestamp_millis());

    if let Err(e) = self.cache.kv().set(key, &data) {
      // The caller still gets the data; the next read fetches again
      warn!(key = %key, error = %e, "failed to write cache entry");
    }

    Ok(data)
  }

  fn cached_non_empty<T: Cacheable>(&self, key: CacheKey) -> Option<Vec<T>> {
    match self.cache.kv().get::<Vec<T>>(key) {
      Ok(Some(items)) if !items.is_empty() => Some(items),
      Ok(_) => None,
      Err(e) => {
        warn!(key = %key, error = %e, "cache read failed");
        None
      }
    }
  }

  fn key_lock(&self, key: CacheKey) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = match self.in_flight.lock() {
      Ok(locks) => locks,
      Err(poisoned) => poisoned.into_inner(),
    };
    locks.entry(key).or_default().clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::Job;
  use crate::auth::{Session, SessionStore};
  use crate::cache::storage::MemoryStorage;
  use crate::cache::CacheSource;
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  fn job(id: &str, fee: &str) -> Job {
    Job {
      id: id.into(),
      fee: Some(fee.to_string()),
      hotel_logo: Some("https://cdn.example.com/logo.png".to_string()),
      ..Default::default()
    }
  }

  fn layer(logged_in: bool) -> CacheLayer {
    let cache = EntityCache::new(Arc::new(MemoryStorage::new()));
    let sessions = SessionStore::new(cache.clone());
    if logged_in {
      sessions.set_session(&Session::new("token-1")).unwrap();
    }
    CacheLayer::new(
      cache,
      Arc::new(sessions),
      LogoNormalizer::new("http://api.test", "default.png"),
    )
  }

  #[tokio::test]
  async fn test_second_read_served_from_cache() {
    let layer = layer(true);
    let calls = AtomicUsize::new(0);

    let first = layer
      .fetch_list(CacheKey::Jobs, FetchMode::CacheFirst, |_| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![job("1", "100")])
      })
      .await;
    let second = layer
      .fetch_list(CacheKey::Jobs, FetchMode::CacheFirst, |_| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![job("9", "900")])
      })
      .await;

    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(
      serde_json::to_string(&first.data).unwrap(),
      serde_json::to_string(&second.data).unwrap()
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_force_bypasses_cache() {
    let layer = layer(true);
    layer.cache().set_jobs(&[job("1", "100")]).unwrap();

    let result = layer
      .fetch_list(CacheKey::Jobs, FetchMode::Force, |_| async {
        Ok(vec![job("2", "200")])
      })
      .await;

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(layer.cache().jobs().unwrap(), vec![job("2", "200")]);
  }

  #[tokio::test]
  async fn test_empty_list_is_a_miss() {
    let layer = layer(true);
    layer.cache().set_jobs(&[]).unwrap();

    let result = layer
      .fetch_list(CacheKey::Jobs, FetchMode::CacheFirst, |_| async {
        Ok(vec![job("1", "100")])
      })
      .await;

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.len(), 1);
  }

  #[tokio::test]
  async fn test_fetcher_receives_token() {
    let layer = layer(true);
    let result = layer
      .fetch_list(CacheKey::Jobs, FetchMode::CacheFirst, |token| async move {
        assert_eq!(token, "token-1");
        Ok(vec![job("1", "100")])
      })
      .await;
    assert_eq!(result.source, CacheSource::Network);
  }

  #[tokio::test]
  async fn test_missing_token_is_unauthenticated() {
    let layer = layer(false);
    let calls = AtomicUsize::new(0);

    let result = layer
      .fetch_list(CacheKey::Jobs, FetchMode::CacheFirst, |_| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![job("1", "100")])
      })
      .await;

    assert!(result.requires_login());
    assert!(result.data.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_transport_failure_returns_empty_default() {
    let layer = layer(true);
    let result: CacheResult<Vec<Job>> = layer
      .fetch_list(CacheKey::Jobs, FetchMode::CacheFirst, |_| async {
        Err(Report::new(SyncError::Transport("connection refused".to_string())))
      })
      .await;

    assert_eq!(result.source, CacheSource::Unavailable);
    assert!(result.data.is_empty());
    assert!(result.error.is_some());
    assert!(!layer.cache().kv().contains(CacheKey::Jobs).unwrap());
  }

  #[tokio::test]
  async fn test_failed_forced_reload_keeps_stale_data() {
    let layer = layer(true);
    layer.cache().set_jobs(&[job("1", "100")]).unwrap();

    let result: CacheResult<Vec<Job>> = layer
      .fetch_list(CacheKey::Jobs, FetchMode::Force, |_| async {
        Err(eyre!("boom"))
      })
      .await;

    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data, vec![job("1", "100")]);
  }

  #[tokio::test]
  async fn test_network_result_is_normalized() {
    let layer = layer(true);
    let result = layer
      .fetch_list(CacheKey::Jobs, FetchMode::CacheFirst, |_| async {
        Ok(vec![Job {
          id: "1".into(),
          hotel_logo: Some("logos/a.png".to_string()),
          ..Default::default()
        }])
      })
      .await;

    let logo = result.data[0].hotel_logo.clone().unwrap();
    assert!(logo.starts_with("http://api.test/logos/a.png?t="));
    assert_eq!(layer.cache().jobs().unwrap()[0].hotel_logo.as_deref(), Some(logo.as_str()));
  }

  #[tokio::test]
  async fn test_concurrent_cold_reads_fetch_once() {
    let layer = layer(true);
    let calls = Arc::new(AtomicUsize::new(0));

    let fetch = |calls: Arc<AtomicUsize>| {
      let layer = layer.clone();
      async move {
        layer
          .fetch_list(CacheKey::Jobs, FetchMode::CacheFirst, |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(vec![job("1", "100")])
          })
          .await
      }
    };

    let (a, b) = tokio::join!(fetch(calls.clone()), fetch(calls.clone()));

    assert_eq!(a.data, b.data);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_push_during_fetch_last_writer_wins() {
    let layer = layer(true);

    let fetch = layer.fetch_list(CacheKey::Jobs, FetchMode::CacheFirst, |_| async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok(vec![job("1", "100")])
    });
    let push = async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      layer.store_list(CacheKey::Jobs, vec![job("2", "200")]).unwrap();
      layer.cache().jobs().unwrap()
    };

    let (fetched, after_push) = tokio::join!(fetch, push);

    // The push lands while the fetch is in flight, then the fetch writes last
    assert_eq!(after_push, vec![job("2", "200")]);
    assert_eq!(fetched.data, vec![job("1", "100")]);
    assert_eq!(layer.cache().jobs().unwrap(), vec![job("1", "100")]);

    layer.store_list(CacheKey::Jobs, vec![job("3", "300")]).unwrap();
    assert_eq!(layer.cache().jobs().unwrap(), vec![job("3", "300")]);
  }

  #[tokio::test]
  async fn test_required_fetch_propagates() {
    let layer = layer(false);
    let err = layer
      .fetch_required(|_| async { Ok(1u32) })
      .await
      .unwrap_err();
    assert!(SyncError::is_auth(&err));
  }
}
