//! Session credential storage.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::cache::{CacheKey, EntityCache, LOGOUT_PURGE};

/// Source of the current bearer credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
  /// Current token, or `None` when signed out or the session expired.
  async fn token(&self) -> Result<Option<String>>;

  async fn is_logged_in(&self) -> Result<bool> {
    Ok(self.token().await?.is_some())
  }

  /// Drop the session and every cached collection.
  async fn clear(&self) -> Result<()>;
}

/// Persisted session blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub token: String,
  #[serde(default)]
  pub expires_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub user: Option<Value>,
}

impl Session {
  pub fn new(token: impl Into<String>) -> Self {
    Self {
      token: token.into(),
      expires_at: None,
      user: None,
    }
  }

  /// Session expiring `seconds` after `now`.
  pub fn with_lifetime(mut self, now: DateTime<Utc>, seconds: i64) -> Self {
    self.expires_at = Some(now + Duration::seconds(seconds));
    self
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|at| at <= now)
  }
}

/// Credential store that keeps the session in the entity cache's storage.
#[derive(Clone)]
pub struct SessionStore {
  cache: EntityCache,
}

impl SessionStore {
  pub fn new(cache: EntityCache) -> Self {
    Self { cache }
  }

  pub fn session(&self) -> Result<Option<Session>> {
    self.cache.kv().get(CacheKey::Session)
  }

  pub fn set_session(&self, session: &Session) -> Result<()> {
    self.cache.kv().set(CacheKey::Session, session)
  }
}

#[async_trait]
impl CredentialStore for SessionStore {
  async fn token(&self) -> Result<Option<String>> {
    Ok(
      self
        .session()?
        .filter(|s| !s.is_expired(Utc::now()))
        .map(|s| s.token)
        .filter(|t| !t.is_empty()),
    )
  }

  async fn clear(&self) -> Result<()> {
    self.cache.kv().remove(CacheKey::Session)?;
    self.cache.purge(LOGOUT_PURGE)?;
    info!("session cleared");
    Ok(())
  }
}
