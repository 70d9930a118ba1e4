//! Client-side joins across cached collections.
//!
//! Foreign keys that point at records not (yet) in the cache resolve to
//! `None`; callers treat that as "not cached yet", never as an error.

use serde::Serialize;
use std::collections::HashMap;

use crate::api::types::{Application, ApplicationCount, AttendanceRecord, Hotel, Id, Job};

/// An application joined with its job and that job's hotel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedApplication {
  #[serde(flatten)]
  pub application: Application,
  pub job: Option<Job>,
  pub hotel: Option<Hotel>,
}

pub fn resolve_applications(
  applications: &[Application],
  jobs: &[Job],
  hotels: &[Hotel],
) -> Vec<ResolvedApplication> {
  let jobs_by_id: HashMap<&Id, &Job> = jobs.iter().map(|j| (&j.id, j)).collect();
  let hotels_by_id: HashMap<&Id, &Hotel> = hotels.iter().map(|h| (&h.id, h)).collect();

  applications
    .iter()
    .map(|application| {
      let job = jobs_by_id.get(&application.job_id).copied();
      let hotel = job
        .and_then(|j| j.hotel_id.as_ref())
        .and_then(|id| hotels_by_id.get(id).copied());

      ResolvedApplication {
        application: application.clone(),
        job: job.cloned(),
        hotel: hotel.cloned(),
      }
    })
    .collect()
}

/// Hotel of a job by `hotel_id`.
pub fn hotel_for_job<'a>(job: &Job, hotels: &'a [Hotel]) -> Option<&'a Hotel> {
  let hotel_id = job.hotel_id.as_ref()?;
  hotels.iter().find(|h| &h.id == hotel_id)
}

/// Hotel of a job by `hotel_id`, falling back to a case-insensitive match on
/// the hotel name for jobs that only carry the name.
pub fn hotel_for_job_or_name<'a>(job: &Job, hotels: &'a [Hotel]) -> Option<&'a Hotel> {
  hotel_for_job(job, hotels).or_else(|| {
    let name = job.hotel_name.as_deref()?.trim().to_lowercase();
    hotels.iter().find(|h| {
      h.hotel_name
        .as_deref()
        .is_some_and(|n| n.trim().to_lowercase() == name)
    })
  })
}

pub fn job_for_attendance<'a>(record: &AttendanceRecord, jobs: &'a [Job]) -> Option<&'a Job> {
  jobs.iter().find(|j| j.id == record.job_id)
}

/// Applicant count for a job; 0 when no count is cached.
pub fn count_for_job(job_id: &Id, counts: &[ApplicationCount]) -> u64 {
  counts
    .iter()
    .find(|c| &c.job_id == job_id)
    .map(|c| c.count)
    .unwrap_or(0)
}
