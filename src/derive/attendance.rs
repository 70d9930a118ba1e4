//! Folding flat attendance records into one group per job and day.

use std::collections::HashMap;

use crate::api::types::{AttendanceKind, AttendanceRecord, Id, Job};

use super::lateness;

/// Check-in/check-out pair for one job on one calendar day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceGroup {
  pub job_id: Id,
  /// `YYYY-MM-DD`
  pub date: String,
  pub position: Option<String>,
  pub hotel_name: Option<String>,
  pub job_date_start: Option<String>,
  pub job_date_end: Option<String>,
  /// Scheduled start taken from the cached job, when known
  pub start_time: Option<String>,
  pub checkin: Option<AttendanceRecord>,
  pub checkout: Option<AttendanceRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
  NotCheckedIn,
  /// Checked in without a checkout yet
  CheckedIn,
  Completed,
}

impl AttendanceStatus {
  pub fn label(&self) -> &'static str {
    match self {
      Self::NotCheckedIn => "Not checked in",
      Self::CheckedIn => "Checked in",
      Self::Completed => "Completed",
    }
  }
}

impl AttendanceGroup {
  pub fn status(&self) -> AttendanceStatus {
    match (&self.checkin, &self.checkout) {
      (None, _) => AttendanceStatus::NotCheckedIn,
      (Some(_), None) => AttendanceStatus::CheckedIn,
      (Some(_), Some(_)) => AttendanceStatus::Completed,
    }
  }

  pub fn in_progress(&self) -> bool {
    self.status() == AttendanceStatus::CheckedIn
  }

  /// Minutes between the scheduled start and the check-in, clamped at 0.
  pub fn late_minutes(&self) -> i64 {
    match &self.checkin {
      Some(checkin) => lateness::checkin_lateness_minutes(self.start_time.as_deref(), &checkin.created_at),
      None => 0,
    }
  }
}

/// Group records by `(job_id, date of created_at)` in first-seen order.
///
/// When a day has several records of the same kind the later one in the list
/// wins, so every group holds at most one check-in and one check-out.
pub fn group_attendance(records: &[AttendanceRecord], jobs: &[Job]) -> Vec<AttendanceGroup> {
  let mut groups: Vec<AttendanceGroup> = Vec::new();
  let mut index: HashMap<(Id, String), usize> = HashMap::new();

  for record in records {
    let date = record.date().to_string();
    let slot = *index
      .entry((record.job_id.clone(), date.clone()))
      .or_insert_with(|| {
        let start_time = jobs
          .iter()
          .find(|j| j.id == record.job_id)
          .and_then(|j| j.start_time.clone());
        groups.push(AttendanceGroup {
          job_id: record.job_id.clone(),
          date,
          position: record.position.clone(),
          hotel_name: record.hotel_name.clone(),
          job_date_start: record.job_date_start.clone(),
          job_date_end: record.job_date_end.clone(),
          start_time,
          checkin: None,
          checkout: None,
        });
        groups.len() - 1
      });

    let group = &mut groups[slot];
    match record.kind {
      AttendanceKind::Checkin => group.checkin = Some(record.clone()),
      AttendanceKind::Checkout => group.checkout = Some(record.clone()),
    }
  }

  groups
}

/// `HH:MM` portion of a server timestamp, or `-`.
pub fn clock_time(timestamp: Option<&str>) -> String {
  timestamp
    .and_then(|t| t.get(11..16))
    .map(String::from)
    .unwrap_or_else(|| "-".to_string())
}
