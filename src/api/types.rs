//! Typed records exchanged with the worker API and held in the cache.
//!
//! The server is loose about types: ids and fees arrive as numbers or strings,
//! coordinates as numbers or numeric strings. Records are decoded leniently
//! here, at the boundary, and unknown fields are carried along in `extra` so a
//! cache round trip never drops data.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Lenient scalars
// ============================================================================

/// Record identifier. Numeric and string ids compare equal by their text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
  pub fn new(value: impl Into<String>) -> Self {
    Self(value.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Id {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

impl From<u64> for Id {
  fn from(value: u64) -> Self {
    Self(value.to_string())
  }
}

struct TextVisitor;

impl<'de> de::Visitor<'de> for TextVisitor {
  type Value = String;

  fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str("a string or a number")
  }

  fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
    Ok(v.to_string())
  }

  fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
    Ok(v)
  }

  fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
    Ok(v.to_string())
  }

  fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
    Ok(v.to_string())
  }

  fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
    if v.fract() == 0.0 && v.abs() < 1e15 {
      Ok(format!("{}", v as i64))
    } else {
      Ok(v.to_string())
    }
  }
}

impl<'de> Deserialize<'de> for Id {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    deserializer.deserialize_any(TextVisitor).map(Id)
  }
}

/// Optional id that may be null or absent.
fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Id>, D::Error> {
  Ok(opt_text(deserializer)?.map(Id))
}

/// Optional text that the server may send as a number.
fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
  let value = Option::<Value>::deserialize(deserializer)?;
  match value {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(Some(s)),
    Some(Value::Number(n)) => Ok(Some(number_text(&n))),
    Some(other) => Err(de::Error::custom(format!(
      "expected string or number, got {}",
      other
    ))),
  }
}

fn number_text(n: &serde_json::Number) -> String {
  match (n.as_i64(), n.as_u64()) {
    (Some(i), _) => i.to_string(),
    (None, Some(u)) => u.to_string(),
    _ => n.to_string(),
  }
}

/// Optional float that the server may send as a numeric string.
fn opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
  let value = Option::<Value>::deserialize(deserializer)?;
  match value {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Number(n)) => Ok(n.as_f64()),
    Some(Value::String(s)) => Ok(s.trim().parse::<f64>().ok()),
    Some(_) => Ok(None),
  }
}

/// Count from a number or numeric string; anything else reads as 0.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
  Ok(
    opt_f64(deserializer)?
      .filter(|n| n.is_finite() && *n > 0.0)
      .map(|n| n as u64)
      .unwrap_or(0),
  )
}

// ============================================================================
// Marketplace records
// ============================================================================

/// A job posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
  pub id: Id,
  #[serde(default, deserialize_with = "opt_id")]
  pub hotel_id: Option<Id>,
  #[serde(default)]
  pub hotel_name: Option<String>,
  #[serde(default)]
  pub position: Option<String>,
  /// Raw fee text; see `fee_amount`
  #[serde(default, deserialize_with = "opt_text")]
  pub fee: Option<String>,
  /// Job type, e.g. "Daily Worker"
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub location: Option<String>,
  #[serde(default)]
  pub start_time: Option<String>,
  #[serde(default)]
  pub end_time: Option<String>,
  #[serde(default)]
  pub job_date_start: Option<String>,
  #[serde(default)]
  pub job_date_end: Option<String>,
  #[serde(default)]
  pub hotel_logo: Option<String>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

impl Job {
  /// Numeric fee, or `None` when the fee is missing or unparsable.
  pub fn fee_amount(&self) -> Option<f64> {
    self
      .fee
      .as_deref()
      .and_then(|f| f.trim().parse::<f64>().ok())
      .filter(|f| f.is_finite())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hotel {
  pub id: Id,
  #[serde(default)]
  pub hotel_name: Option<String>,
  #[serde(default, deserialize_with = "opt_f64")]
  pub latitude: Option<f64>,
  #[serde(default, deserialize_with = "opt_f64")]
  pub longitude: Option<f64>,
  #[serde(default)]
  pub logo: Option<String>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

impl Hotel {
  pub fn coordinates(&self) -> Option<(f64, f64)> {
    Some((self.latitude?, self.longitude?))
  }
}

/// Application status. Statuses this client does not know are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApplicationStatus {
  #[default]
  Pending,
  Accepted,
  Completed,
  Rejected,
  Other(String),
}

impl From<String> for ApplicationStatus {
  fn from(value: String) -> Self {
    match value.as_str() {
      "pending" => Self::Pending,
      "accepted" => Self::Accepted,
      "completed" => Self::Completed,
      "rejected" => Self::Rejected,
      _ => Self::Other(value),
    }
  }
}

impl From<ApplicationStatus> for String {
  fn from(value: ApplicationStatus) -> Self {
    match value {
      ApplicationStatus::Pending => "pending".to_string(),
      ApplicationStatus::Accepted => "accepted".to_string(),
      ApplicationStatus::Completed => "completed".to_string(),
      ApplicationStatus::Rejected => "rejected".to_string(),
      ApplicationStatus::Other(s) => s,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
  pub job_id: Id,
  #[serde(default, deserialize_with = "opt_id")]
  pub application_id: Option<Id>,
  #[serde(default)]
  pub status: ApplicationStatus,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceKind {
  #[default]
  Checkin,
  Checkout,
}

impl AttendanceKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Checkin => "checkin",
      Self::Checkout => "checkout",
    }
  }
}

/// One check-in or check-out event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  #[serde(default, deserialize_with = "opt_id")]
  pub id: Option<Id>,
  pub job_id: Id,
  #[serde(default, deserialize_with = "opt_id")]
  pub application_id: Option<Id>,
  #[serde(rename = "type")]
  pub kind: AttendanceKind,
  /// Local timestamp, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD HH:MM:SS`
  pub created_at: String,
  #[serde(default)]
  pub position: Option<String>,
  #[serde(default)]
  pub hotel_name: Option<String>,
  #[serde(default)]
  pub job_date_start: Option<String>,
  #[serde(default)]
  pub job_date_end: Option<String>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

impl AttendanceRecord {
  /// Calendar date part of `created_at`.
  pub fn date(&self) -> &str {
    self.created_at.get(..10).unwrap_or(&self.created_at)
  }
}

/// Number of applicants for a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationCount {
  pub job_id: Id,
  #[serde(
    default,
    alias = "total",
    alias = "applications_count",
    deserialize_with = "lenient_count"
  )]
  pub count: u64,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skill {
  pub id: Id,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experience {
  #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
  pub id: Option<Id>,
  #[serde(default)]
  pub company_name: String,
  #[serde(default)]
  pub company_business: Option<String>,
  #[serde(default)]
  pub job_title: Option<String>,
  #[serde(default)]
  pub department: Option<String>,
  #[serde(default)]
  pub location: Option<String>,
  #[serde(default)]
  pub start_date: String,
  #[serde(default)]
  pub end_date: Option<String>,
  #[serde(default)]
  pub is_current: bool,
  #[serde(default)]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
  #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
  pub id: Option<Id>,
  #[serde(default)]
  pub level: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub instituted_name: String,
  #[serde(default)]
  pub start_date: String,
  #[serde(default)]
  pub end_date: Option<String>,
  #[serde(default)]
  pub is_current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  #[serde(default, deserialize_with = "opt_id")]
  pub id: Option<Id>,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub photo: Option<String>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
  pub token: String,
  /// Token lifetime in seconds, when the server reports one
  #[serde(default)]
  pub expires_in: Option<i64>,
  #[serde(default)]
  pub user: Option<Value>,
}

/// Check-in or check-out submission.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceSubmission {
  pub job_id: Id,
  pub application_id: Id,
  #[serde(rename = "type")]
  pub kind: AttendanceKind,
  pub latitude: f64,
  pub longitude: f64,
  /// Encoded photo as produced by the capture pipeline
  #[serde(skip_serializing_if = "Option::is_none")]
  pub photo: Option<String>,
}

/// Unwrap `{ "data": [...] }` envelopes; bare payloads pass through.
pub fn unwrap_data(value: Value) -> Value {
  match value {
    Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
    other => other,
  }
}
