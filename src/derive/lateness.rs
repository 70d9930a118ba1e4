//! Lateness against a job's scheduled start, and the per-second ticker that
//! keeps a live counter current.
//!
//! All computations take `now` explicitly and work in local wall-clock time,
//! which is how the server writes schedules and attendance timestamps.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Start time the server uses for "no schedule".
pub const PLACEHOLDER_TIME: &str = "00:00:00";

/// Refresh period of the live lateness counter.
pub const TICK: Duration = Duration::from_secs(1);

pub fn parse_time(value: &str) -> Option<NaiveTime> {
  let value = value.trim();
  NaiveTime::parse_from_str(value, "%H:%M:%S")
    .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
    .ok()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
  let value = value.trim();
  NaiveDate::parse_from_str(value.get(..10).unwrap_or(value), "%Y-%m-%d").ok()
}

/// Parse a server timestamp (`T` or space separated).
///
/// A timestamp carrying an offset or `Z` is converted to local wall-clock time.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
  let value = value.trim();
  NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
    .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
    .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
    .ok()
    .or_else(|| {
      chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Local).naive_local())
    })
}

/// Scheduled start on `date`, or `None` when the job has no real schedule.
pub fn scheduled_start(date: NaiveDate, start_time: Option<&str>) -> Option<NaiveDateTime> {
  let start_time = start_time.map(str::trim).filter(|t| !t.is_empty())?;
  if start_time == PLACEHOLDER_TIME {
    return None;
  }
  parse_time(start_time).map(|t| date.and_time(t))
}

/// Whole seconds past `start`, never negative.
pub fn lateness_seconds(start: Option<NaiveDateTime>, now: NaiveDateTime) -> i64 {
  match start {
    Some(start) => (now - start).num_seconds().max(0),
    None => 0,
  }
}

/// Whole minutes past `start`, never negative.
pub fn lateness_minutes(start: Option<NaiveDateTime>, now: NaiveDateTime) -> i64 {
  lateness_seconds(start, now) / 60
}

/// Live counter for a job that has not been checked in yet.
///
/// Only counts on the job's own day, and stops once a check-in exists.
pub fn pending_lateness_seconds(
  start_time: Option<&str>,
  date: NaiveDate,
  checked_in: bool,
  now: NaiveDateTime,
) -> i64 {
  if checked_in || date != now.date() {
    return 0;
  }
  lateness_seconds(scheduled_start(date, start_time), now)
}

/// Minutes between the scheduled start and an actual check-in timestamp.
pub fn checkin_lateness_minutes(start_time: Option<&str>, checkin_at: &str) -> i64 {
  let Some(checkin) = parse_timestamp(checkin_at) else {
    return 0;
  };
  lateness_minutes(scheduled_start(checkin.date(), start_time), checkin)
}

/// `HH:MM:SS` for a seconds count.
pub fn format_hms(seconds: i64) -> String {
  let seconds = seconds.max(0);
  format!(
    "{:02}:{:02}:{:02}",
    seconds / 3600,
    (seconds % 3600) / 60,
    seconds % 60
  )
}

/// Coarse relative age: "Just now", "5h", "3d".
pub fn time_ago(then: NaiveDateTime, now: NaiveDateTime) -> String {
  let hours = (now - then).num_hours();
  if hours < 1 {
    "Just now".to_string()
  } else if hours < 24 {
    format!("{}h", hours)
  } else {
    format!("{}d", hours / 24)
  }
}

/// Recomputes a value on a fixed period while a view is active.
///
/// The task stops on `stop()` or when the ticker is dropped, so leaving a view
/// never leaves a timer running.
pub struct LateTicker<T> {
  rx: watch::Receiver<T>,
  stop: Option<oneshot::Sender<()>>,
  handle: JoinHandle<()>,
}

impl<T: Clone + Send + Sync + 'static> LateTicker<T> {
  /// Tick every second.
  pub fn start<F>(compute: F) -> Self
  where
    F: FnMut() -> T + Send + 'static,
  {
    Self::start_with_period(TICK, compute)
  }

  pub fn start_with_period<F>(period: Duration, mut compute: F) -> Self
  where
    F: FnMut() -> T + Send + 'static,
  {
    let (tx, rx) = watch::channel(compute());
    let (stop_tx, mut stop_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
      let mut interval = tokio::time::interval(period);
      interval.tick().await;
      loop {
        tokio::select! {
          _ = &mut stop_rx => break,
          _ = interval.tick() => {
            if tx.send(compute()).is_err() {
              break;
            }
          }
        }
      }
      debug!("late ticker stopped");
    });

    Self {
      rx,
      stop: Some(stop_tx),
      handle,
    }
  }

  /// Latest computed value.
  pub fn current(&self) -> T {
    self.rx.borrow().clone()
  }

  /// Receiver notified on every tick.
  pub fn watch(&self) -> watch::Receiver<T> {
    self.rx.clone()
  }

  pub fn stop(&mut self) {
    if let Some(stop) = self.stop.take() {
      let _ = stop.send(());
    }
  }

  pub fn is_running(&self) -> bool {
    !self.handle.is_finished()
  }
}

impl<T> Drop for LateTicker<T> {
  fn drop(&mut self) {
    if let Some(stop) = self.stop.take() {
      let _ = stop.send(());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use std::sync::atomic::{AtomicI64, Ordering};
  use std::sync::Arc;

  fn at(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap()
  }

  fn day(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
  }

  #[test]
  fn test_before_start_is_zero() {
    let start = scheduled_start(day("2024-01-10"), Some("09:00:00"));
    assert_eq!(lateness_minutes(start, at("2024-01-10T08:59:59")), 0);
    assert_eq!(lateness_seconds(start, at("2024-01-10T08:59:59")), 0);
  }

  #[test]
  fn test_minutes_are_floored() {
    let start = scheduled_start(day("2024-01-10"), Some("09:00:00"));
    assert_eq!(lateness_minutes(start, at("2024-01-10T09:01:59")), 1);
    assert_eq!(lateness_seconds(start, at("2024-01-10T09:01:59")), 119);
  }

  #[test]
  fn test_placeholder_or_missing_start_is_never_late() {
    let now = at("2024-01-10T23:00:00");
    assert_eq!(lateness_minutes(scheduled_start(day("2024-01-10"), Some("00:00:00")), now), 0);
    assert_eq!(lateness_minutes(scheduled_start(day("2024-01-10"), None), now), 0);
    assert_eq!(lateness_minutes(scheduled_start(day("2024-01-10"), Some("")), now), 0);
  }

  #[test]
  fn test_pending_only_counts_today_and_before_checkin() {
    let now = at("2024-01-10T09:10:00");
    assert_eq!(pending_lateness_seconds(Some("09:00"), day("2024-01-10"), false, now), 600);
    assert_eq!(pending_lateness_seconds(Some("09:00"), day("2024-01-10"), true, now), 0);
    assert_eq!(pending_lateness_seconds(Some("09:00"), day("2024-01-09"), false, now), 0);
  }

  #[test]
  fn test_checkin_lateness() {
    assert_eq!(checkin_lateness_minutes(Some("08:00:00"), "2024-01-10 08:05:30"), 5);
    assert_eq!(checkin_lateness_minutes(Some("08:00:00"), "2024-01-10T07:55:00"), 0);
    assert_eq!(checkin_lateness_minutes(Some("08:00:00"), "garbage"), 0);
  }

  #[test]
  fn test_utc_timestamp_read_as_local_time() {
    let checkin = "2024-01-10T12:30:00.000000Z";
    let expected = chrono::Utc
      .with_ymd_and_hms(2024, 1, 10, 12, 30, 0)
      .unwrap()
      .with_timezone(&chrono::Local)
      .naive_local();
    assert_eq!(parse_timestamp(checkin), Some(expected));

    // Scheduled five minutes before the local check-in time
    let start = (expected - chrono::Duration::minutes(5))
      .format("%H:%M:%S")
      .to_string();
    assert_eq!(checkin_lateness_minutes(Some(&start), checkin), 5);
  }

  #[test]
  fn test_format_hms() {
    assert_eq!(format_hms(0), "00:00:00");
    assert_eq!(format_hms(3725), "01:02:05");
  }

  #[test]
  fn test_time_ago() {
    let now = at("2024-01-10T12:00:00");
    assert_eq!(time_ago(at("2024-01-10T11:30:00"), now), "Just now");
    assert_eq!(time_ago(at("2024-01-10T07:00:00"), now), "5h");
    assert_eq!(time_ago(at("2024-01-07T12:00:00"), now), "3d");
  }

  #[tokio::test]
  async fn test_ticker_recomputes_until_stopped() {
    let counter = Arc::new(AtomicI64::new(0));
    let c = counter.clone();
    let mut ticker = LateTicker::start_with_period(Duration::from_millis(10), move || {
      c.fetch_add(1, Ordering::SeqCst)
    });

    let mut rx = ticker.watch();
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
      .await
      .unwrap()
      .unwrap();
    assert!(ticker.current() >= 1);

    ticker.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!ticker.is_running());

    let frozen = counter.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), frozen);
  }

  #[tokio::test]
  async fn test_dropping_ticker_stops_task() {
    let counter = Arc::new(AtomicI64::new(0));
    let c = counter.clone();
    let ticker = LateTicker::start_with_period(Duration::from_millis(10), move || {
      c.fetch_add(1, Ordering::SeqCst)
    });
    drop(ticker);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let frozen = counter.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), frozen);
  }
}
