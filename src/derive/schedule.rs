//! Calendar view over accepted jobs: which jobs run on a day, their colours,
//! attendance state and the check-in window.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;

use crate::api::types::{
  Application, ApplicationStatus, AttendanceKind, AttendanceRecord, Id, Job,
};

use super::attendance::AttendanceStatus;
use super::lateness::{self, parse_date, parse_time, PLACEHOLDER_TIME};

pub const PALETTE: [&str; 6] = ["#2869FE", "#FF9800", "#4CAF50", "#9C27B0", "#E91E63", "#009688"];

/// Whether `job` runs on `date`; a missing end date means a one-day job.
pub fn runs_on(job: &Job, date: NaiveDate) -> bool {
  let Some(start) = job.job_date_start.as_deref().and_then(parse_date) else {
    return false;
  };
  let end = job
    .job_date_end
    .as_deref()
    .and_then(parse_date)
    .unwrap_or(start);
  start <= date && date <= end
}

pub fn jobs_on_date(jobs: &[Job], date: NaiveDate) -> Vec<Job> {
  jobs.iter().filter(|j| runs_on(j, date)).cloned().collect()
}

/// Stable colour per job, cycling through `PALETTE` in list order.
#[derive(Debug, Clone, Default)]
pub struct JobColors {
  colors: HashMap<Id, &'static str>,
}

impl JobColors {
  pub fn assign(jobs: &[Job]) -> Self {
    let mut colors = HashMap::new();
    for job in jobs {
      let next = PALETTE[colors.len() % PALETTE.len()];
      colors.entry(job.id.clone()).or_insert(next);
    }
    Self { colors }
  }

  pub fn color(&self, job_id: &Id) -> &'static str {
    self.colors.get(job_id).copied().unwrap_or(PALETTE[0])
  }
}

/// One job on the selected day, joined with the worker's application and
/// that day's attendance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
  pub job: Job,
  pub date: NaiveDate,
  pub application_id: Option<Id>,
  pub application_status: Option<ApplicationStatus>,
  pub checkin: Option<AttendanceRecord>,
  pub checkout: Option<AttendanceRecord>,
  /// Live lateness, see `refresh_lateness`
  pub late_seconds: i64,
}

impl ScheduleEntry {
  pub fn status(&self) -> AttendanceStatus {
    match (&self.checkin, &self.checkout) {
      (None, _) => AttendanceStatus::NotCheckedIn,
      (Some(_), None) => AttendanceStatus::CheckedIn,
      (Some(_), Some(_)) => AttendanceStatus::Completed,
    }
  }

  pub fn refresh_lateness(&mut self, now: NaiveDateTime) {
    self.late_seconds = lateness::pending_lateness_seconds(
      self.job.start_time.as_deref(),
      self.date,
      self.checkin.is_some(),
      now,
    );
  }

  /// "Late N min" or "On time".
  pub fn late_label(&self) -> String {
    let minutes = self.late_seconds / 60;
    if minutes > 0 {
      format!("Late {} min", minutes)
    } else {
      "On time".to_string()
    }
  }

  /// Check-in is open on the job's own day, for an accepted application,
  /// before any check-in, between start and end time.
  ///
  /// A placeholder start opens the window at midnight; a placeholder or
  /// missing end closes it at 23:59:59.
  pub fn can_check_in(&self, now: NaiveDateTime) -> bool {
    if self.checkin.is_some()
      || self.application_status != Some(ApplicationStatus::Accepted)
      || self.application_id.is_none()
      || self.date != now.date()
    {
      return false;
    }

    let start = window_bound(self.job.start_time.as_deref()).unwrap_or(NaiveTime::MIN);
    let end = window_bound(self.job.end_time.as_deref())
      .unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN));

    let now = now.time();
    start <= now && now <= end
  }
}

fn window_bound(value: Option<&str>) -> Option<NaiveTime> {
  value
    .map(str::trim)
    .filter(|v| !v.is_empty() && *v != PLACEHOLDER_TIME)
    .and_then(parse_time)
}

/// Entries for every job running on `date`.
pub fn schedule_for_date(
  date: NaiveDate,
  jobs: &[Job],
  applications: &[Application],
  attendances: &[AttendanceRecord],
  now: NaiveDateTime,
) -> Vec<ScheduleEntry> {
  let day = date.format("%Y-%m-%d").to_string();

  jobs
    .iter()
    .filter(|j| runs_on(j, date))
    .map(|job| {
      let application = applications.iter().find(|a| a.job_id == job.id);
      let of_kind = |kind: AttendanceKind| {
        attendances
          .iter()
          .find(|r| r.job_id == job.id && r.kind == kind && r.date() == day)
          .cloned()
      };

      let mut entry = ScheduleEntry {
        job: job.clone(),
        date,
        application_id: application.and_then(|a| a.application_id.clone()),
        application_status: application.map(|a| a.status.clone()),
        checkin: of_kind(AttendanceKind::Checkin),
        checkout: of_kind(AttendanceKind::Checkout),
        late_seconds: 0,
      };
      entry.refresh_lateness(now);
      entry
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::derive::lateness::parse_timestamp;

  fn job(id: u64, start: &str, end: Option<&str>) -> Job {
    Job {
      id: id.into(),
      job_date_start: Some(start.to_string()),
      job_date_end: end.map(String::from),
      start_time: Some("09:00:00".to_string()),
      end_time: Some("17:00:00".to_string()),
      ..Default::default()
    }
  }

  fn day(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
  }

  fn at(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap()
  }

  fn accepted(job_id: u64) -> Application {
    Application {
      job_id: job_id.into(),
      application_id: Some(Id::from(100 + job_id)),
      status: ApplicationStatus::Accepted,
      ..Default::default()
    }
  }

  #[test]
  fn test_date_range_is_inclusive() {
    let jobs = vec![
      job(1, "2024-01-10", Some("2024-01-12")),
      job(2, "2024-01-12", None),
      job(3, "2024-01-13", None),
    ];

    let ids: Vec<_> = jobs_on_date(&jobs, day("2024-01-12"))
      .into_iter()
      .map(|j| j.id.to_string())
      .collect();
    assert_eq!(ids, vec!["1", "2"]);
  }

  #[test]
  fn test_colors_cycle_and_default() {
    let jobs: Vec<Job> = (1..=7).map(|i| job(i, "2024-01-10", None)).collect();
    let colors = JobColors::assign(&jobs);
    assert_eq!(colors.color(&Id::from(1)), "#2869FE");
    assert_eq!(colors.color(&Id::from(2)), "#FF9800");
    assert_eq!(colors.color(&Id::from(7)), "#2869FE");
    assert_eq!(colors.color(&Id::from(99)), "#2869FE");
  }

  #[test]
  fn test_entry_joins_application_and_attendance() {
    let jobs = vec![job(5, "2024-01-10", None)];
    let records = vec![
      AttendanceRecord {
        job_id: 5u64.into(),
        kind: AttendanceKind::Checkin,
        created_at: "2024-01-10T09:02:00".to_string(),
        ..Default::default()
      },
      AttendanceRecord {
        job_id: 5u64.into(),
        kind: AttendanceKind::Checkout,
        created_at: "2024-01-09T17:00:00".to_string(),
        ..Default::default()
      },
    ];

    let entries = schedule_for_date(
      day("2024-01-10"),
      &jobs,
      &[accepted(5)],
      &records,
      at("2024-01-10T10:00:00"),
    );

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].application_id, Some(Id::from(105)));
    assert_eq!(entries[0].status(), AttendanceStatus::CheckedIn);
    assert_eq!(entries[0].late_seconds, 0);
  }

  #[test]
  fn test_pending_entry_is_late() {
    let jobs = vec![job(5, "2024-01-10", None)];
    let entries = schedule_for_date(
      day("2024-01-10"),
      &jobs,
      &[accepted(5)],
      &[],
      at("2024-01-10T09:15:30"),
    );
    assert_eq!(entries[0].late_seconds, 930);
    assert_eq!(entries[0].late_label(), "Late 15 min");
  }

  #[test]
  fn test_check_in_window() {
    let jobs = vec![job(5, "2024-01-10", None)];
    let entries = schedule_for_date(day("2024-01-10"), &jobs, &[accepted(5)], &[], at("2024-01-10T08:00:00"));
    let entry = &entries[0];

    assert!(!entry.can_check_in(at("2024-01-10T08:59:59")));
    assert!(entry.can_check_in(at("2024-01-10T09:00:00")));
    assert!(entry.can_check_in(at("2024-01-10T17:00:00")));
    assert!(!entry.can_check_in(at("2024-01-10T17:00:01")));
    assert!(!entry.can_check_in(at("2024-01-11T10:00:00")));
  }

  #[test]
  fn test_check_in_requires_accepted_application() {
    let jobs = vec![job(5, "2024-01-10", None)];
    let pending = Application {
      status: ApplicationStatus::Pending,
      ..accepted(5)
    };
    let entries = schedule_for_date(day("2024-01-10"), &jobs, &[pending], &[], at("2024-01-10T10:00:00"));
    assert!(!entries[0].can_check_in(at("2024-01-10T10:00:00")));
  }

  #[test]
  fn test_placeholder_times_open_whole_day() {
    let mut open = job(5, "2024-01-10", None);
    open.start_time = Some("00:00:00".to_string());
    open.end_time = None;
    let entries = schedule_for_date(day("2024-01-10"), &[open], &[accepted(5)], &[], at("2024-01-10T23:00:00"));

    assert!(entries[0].can_check_in(at("2024-01-10T00:00:00")));
    assert!(entries[0].can_check_in(at("2024-01-10T23:59:59")));
    assert_eq!(entries[0].late_seconds, 0);
  }
}
