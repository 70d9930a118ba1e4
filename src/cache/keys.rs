//! Catalogue of persisted keys.
//!
//! Key strings are part of the on-device format: renaming one orphans the old
//! entry, which is the only migration mechanism there is.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
  Jobs,
  Hotels,
  Applications,
  Attendances,
  PopularJobs,
  ApplicationCounts,
  WorkerSkills,
  WorkerExperiences,
  WorkerEducations,
  JobFilters,
  SelectedJob,
  Session,
}

impl CacheKey {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Jobs => "cache_jobs",
      Self::Hotels => "cache_hotels",
      Self::Applications => "cache_applications",
      Self::Attendances => "cache_attendances",
      Self::PopularJobs => "cache_popular_jobs",
      Self::ApplicationCounts => "cache_app_counts",
      Self::WorkerSkills => "cache_worker_skills",
      Self::WorkerExperiences => "cache_worker_experiences",
      Self::WorkerEducations => "cache_worker_educations",
      Self::JobFilters => "job_filters",
      Self::SelectedJob => "selected_job",
      Self::Session => "session",
    }
  }

  pub fn all() -> &'static [CacheKey] {
    &[
      Self::Jobs,
      Self::Hotels,
      Self::Applications,
      Self::Attendances,
      Self::PopularJobs,
      Self::ApplicationCounts,
      Self::WorkerSkills,
      Self::WorkerExperiences,
      Self::WorkerEducations,
      Self::JobFilters,
      Self::SelectedJob,
      Self::Session,
    ]
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Keys removed on logout, in addition to the session itself.
pub const LOGOUT_PURGE: &[CacheKey] = &[
  CacheKey::Jobs,
  CacheKey::Hotels,
  CacheKey::Applications,
  CacheKey::Attendances,
  CacheKey::PopularJobs,
  CacheKey::ApplicationCounts,
  CacheKey::WorkerSkills,
  CacheKey::WorkerExperiences,
  CacheKey::WorkerEducations,
  CacheKey::JobFilters,
  CacheKey::SelectedJob,
];

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn test_key_strings_are_unique() {
    let strings: HashSet<_> = CacheKey::all().iter().map(|k| k.as_str()).collect();
    assert_eq!(strings.len(), CacheKey::all().len());
  }

  #[test]
  fn test_purge_list_excludes_session() {
    assert!(!LOGOUT_PURGE.contains(&CacheKey::Session));
    assert_eq!(LOGOUT_PURGE.len(), CacheKey::all().len() - 1);
  }
}
