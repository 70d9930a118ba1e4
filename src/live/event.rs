//! Messages pushed by the server over the live channel.

use color_eyre::{eyre::Report, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::api::types::{ApplicationCount, Hotel, Job};
use crate::cache::{CacheKey, CacheLayer, Cacheable};
use crate::error::SyncError;

/// Live events
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
  /// Handshake acknowledgement; no cache effect
  Connected { message: Option<String> },
  JobsUpdated(Vec<Job>),
  MostPopularJobsUpdated(Vec<Job>),
  HotelsUpdated(Vec<Hotel>),
  ApplicationCountsUpdated(Vec<ApplicationCount>),
}

impl LiveEvent {
  /// Parse one text frame.
  ///
  /// Returns `Ok(None)` for a well-formed message of a type this client does
  /// not handle, and a `SyncError::Decode` for anything that is not valid JSON
  /// or carries a malformed payload.
  pub fn parse(text: &str) -> Result<Option<Self>> {
    let value: Value = serde_json::from_str(text).map_err(|e| decode_error("live message", e))?;
    let kind = value
      .get("type")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string();
    let data = value.get("data").cloned().unwrap_or(Value::Null);

    let event = match kind.as_str() {
      "connected" => Self::Connected {
        message: value
          .get("message")
          .and_then(Value::as_str)
          .map(String::from),
      },
      "jobs_updated" => Self::JobsUpdated(payload(&kind, data)?),
      "most_popular_jobs_updated" => Self::MostPopularJobsUpdated(payload(&kind, data)?),
      "hotels_updated" => Self::HotelsUpdated(payload(&kind, data)?),
      "application_counts_updated" => Self::ApplicationCountsUpdated(payload(&kind, data)?),
      // Only cache-affecting types are modelled; anything else never reaches subscribers
      _ => return Ok(None),
    };
    Ok(Some(event))
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Connected { .. } => "connected",
      Self::JobsUpdated(_) => "jobs_updated",
      Self::MostPopularJobsUpdated(_) => "most_popular_jobs_updated",
      Self::HotelsUpdated(_) => "hotels_updated",
      Self::ApplicationCountsUpdated(_) => "application_counts_updated",
    }
  }

  /// Cache entry this event replaces.
  pub fn cache_key(&self) -> Option<CacheKey> {
    match self {
      Self::Connected { .. } => None,
      Self::JobsUpdated(_) => Some(CacheKey::Jobs),
      Self::MostPopularJobsUpdated(_) => Some(CacheKey::PopularJobs),
      Self::HotelsUpdated(_) => Some(CacheKey::Hotels),
      Self::ApplicationCountsUpdated(_) => Some(CacheKey::ApplicationCounts),
    }
  }

  /// Replace the matching cache entry wholesale, running the same
  /// post-processing as the pull path, and return the event carrying the
  /// stored data.
  pub fn apply(self, layer: &CacheLayer) -> Result<Self> {
    Ok(match self {
      Self::Connected { message } => {
        info!(message = message.as_deref().unwrap_or(""), "live channel handshake");
        Self::Connected { message }
      }
      Self::JobsUpdated(jobs) => Self::JobsUpdated(store(layer, CacheKey::Jobs, jobs)?),
      Self::MostPopularJobsUpdated(jobs) => {
        Self::MostPopularJobsUpdated(store(layer, CacheKey::PopularJobs, jobs)?)
      }
      Self::HotelsUpdated(hotels) => Self::HotelsUpdated(store(layer, CacheKey::Hotels, hotels)?),
      Self::ApplicationCountsUpdated(counts) => {
        Self::ApplicationCountsUpdated(store(layer, CacheKey::ApplicationCounts, counts)?)
      }
    })
  }
}

fn store<T: Cacheable>(layer: &CacheLayer, key: CacheKey, items: Vec<T>) -> Result<Vec<T>> {
  let stored = layer.store_list(key, items)?;
  info!(key = %key, count = stored.len(), "cache replaced from live update");
  Ok(stored)
}

/// A null or missing payload is an empty collection.
fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<Vec<T>> {
  if data.is_null() {
    return Ok(Vec::new());
  }
  serde_json::from_value(data).map_err(|e| decode_error(kind, e))
}

fn decode_error(what: &str, e: serde_json::Error) -> Report {
  Report::new(SyncError::Decode {
    what: what.to_string(),
    reason: e.to_string(),
  })
}
