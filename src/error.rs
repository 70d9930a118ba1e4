//! Error taxonomy for the sync layer.
//!
//! Everything fallible returns `color_eyre::Result`. A `SyncError` travels inside
//! the report so callers can classify a failure with
//! `report.downcast_ref::<SyncError>()`.

use color_eyre::eyre::Report;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
  /// No session token, or the session has expired.
  #[error("not signed in")]
  Auth,

  /// Network failure before a response was received.
  #[error("transport error: {0}")]
  Transport(String),

  /// The server answered with a non-2xx status.
  #[error("request to {url} failed with status {status}")]
  Status { url: String, status: u16 },

  /// The payload could not be decoded into the expected shape.
  #[error("failed to decode {what}: {reason}")]
  Decode { what: String, reason: String },

  /// Local storage failure.
  #[error("storage error: {0}")]
  Storage(String),

  /// Live channel failure. Always recovered by reconnecting.
  #[error("live channel error: {0}")]
  Channel(String),

  /// Input rejected before anything was sent.
  #[error("{0}")]
  Validation(String),
}

impl SyncError {
  /// Whether a report carries an authentication failure.
  pub fn is_auth(report: &Report) -> bool {
    matches!(report.downcast_ref::<SyncError>(), Some(SyncError::Auth))
      || matches!(
        report.downcast_ref::<SyncError>(),
        Some(SyncError::Status { status: 401, .. })
      )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_auth_classification() {
    assert!(SyncError::is_auth(&Report::new(SyncError::Auth)));
    assert!(SyncError::is_auth(&Report::new(SyncError::Status {
      url: "http://x/worker/jobs".to_string(),
      status: 401,
    })));
    assert!(!SyncError::is_auth(&Report::new(SyncError::Transport(
      "connection refused".to_string()
    ))));
  }
}
