//! Typed accessors for every cached collection.

use color_eyre::Result;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::api::types::{
  Application, ApplicationCount, AttendanceRecord, Education, Experience, Hotel, Job, Skill,
};
use crate::derive::filters::JobFilters;

use super::keys::CacheKey;
use super::kv::KeyValueCache;
use super::traits::KeyValueStore;

/// Read/write access to the cached entity collections.
///
/// List readers return an empty list for a missing (or self-healed corrupt)
/// entry; writers replace the whole value.
#[derive(Clone)]
pub struct EntityCache {
  kv: KeyValueCache,
}

impl EntityCache {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self {
      kv: KeyValueCache::new(store),
    }
  }

  pub fn kv(&self) -> &KeyValueCache {
    &self.kv
  }

  fn list<T: DeserializeOwned>(&self, key: CacheKey) -> Result<Vec<T>> {
    Ok(self.kv.get::<Vec<T>>(key)?.unwrap_or_default())
  }

  pub fn jobs(&self) -> Result<Vec<Job>> {
    self.list(CacheKey::Jobs)
  }

  pub fn set_jobs(&self, jobs: &[Job]) -> Result<()> {
    self.kv.set(CacheKey::Jobs, jobs)
  }

  pub fn hotels(&self) -> Result<Vec<Hotel>> {
    self.list(CacheKey::Hotels)
  }

  pub fn set_hotels(&self, hotels: &[Hotel]) -> Result<()> {
    self.kv.set(CacheKey::Hotels, hotels)
  }

  pub fn applications(&self) -> Result<Vec<Application>> {
    self.list(CacheKey::Applications)
  }

  pub fn set_applications(&self, applications: &[Application]) -> Result<()> {
    self.kv.set(CacheKey::Applications, applications)
  }

  pub fn attendances(&self) -> Result<Vec<AttendanceRecord>> {
    self.list(CacheKey::Attendances)
  }

  pub fn set_attendances(&self, records: &[AttendanceRecord]) -> Result<()> {
    self.kv.set(CacheKey::Attendances, records)
  }

  pub fn popular_jobs(&self) -> Result<Vec<Job>> {
    self.list(CacheKey::PopularJobs)
  }

  pub fn set_popular_jobs(&self, jobs: &[Job]) -> Result<()> {
    self.kv.set(CacheKey::PopularJobs, jobs)
  }

  pub fn application_counts(&self) -> Result<Vec<ApplicationCount>> {
    self.list(CacheKey::ApplicationCounts)
  }

  pub fn set_application_counts(&self, counts: &[ApplicationCount]) -> Result<()> {
    self.kv.set(CacheKey::ApplicationCounts, counts)
  }

  pub fn worker_skills(&self) -> Result<Vec<Skill>> {
    self.list(CacheKey::WorkerSkills)
  }

  pub fn set_worker_skills(&self, skills: &[Skill]) -> Result<()> {
    self.kv.set(CacheKey::WorkerSkills, skills)
  }

  pub fn worker_experiences(&self) -> Result<Vec<Experience>> {
    self.list(CacheKey::WorkerExperiences)
  }

  pub fn set_worker_experiences(&self, experiences: &[Experience]) -> Result<()> {
    self.kv.set(CacheKey::WorkerExperiences, experiences)
  }

  pub fn worker_educations(&self) -> Result<Vec<Education>> {
    self.list(CacheKey::WorkerEducations)
  }

  pub fn set_worker_educations(&self, educations: &[Education]) -> Result<()> {
    self.kv.set(CacheKey::WorkerEducations, educations)
  }

  pub fn job_filters(&self) -> Result<Option<JobFilters>> {
    self.kv.get(CacheKey::JobFilters)
  }

  pub fn set_job_filters(&self, filters: &JobFilters) -> Result<()> {
    self.kv.set(CacheKey::JobFilters, filters)
  }

  pub fn selected_job(&self) -> Result<Option<Job>> {
    self.kv.get(CacheKey::SelectedJob)
  }

  pub fn set_selected_job(&self, job: &Job) -> Result<()> {
    self.kv.set(CacheKey::SelectedJob, job)
  }

  /// Remove each listed key.
  pub fn purge(&self, keys: &[CacheKey]) -> Result<()> {
    for key in keys {
      self.kv.remove(*key)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStorage;
  use crate::cache::LOGOUT_PURGE;

  fn repo() -> EntityCache {
    EntityCache::new(Arc::new(MemoryStorage::new()))
  }

  #[test]
  fn test_missing_collection_is_empty() {
    assert!(repo().jobs().unwrap().is_empty());
    assert!(repo().job_filters().unwrap().is_none());
  }

  #[test]
  fn test_set_replaces_whole_collection() {
    let repo = repo();
    repo
      .set_hotels(&[Hotel {
        id: "1".into(),
        ..Default::default()
      }])
      .unwrap();
    repo
      .set_hotels(&[Hotel {
        id: "2".into(),
        ..Default::default()
      }])
      .unwrap();

    let hotels = repo.hotels().unwrap();
    assert_eq!(hotels.len(), 1);
    assert_eq!(hotels[0].id.as_str(), "2");
  }

  #[test]
  fn test_purge_removes_listed_keys() {
    let repo = repo();
    repo
      .set_jobs(&[Job {
        id: "1".into(),
        ..Default::default()
      }])
      .unwrap();
    repo.set_job_filters(&JobFilters::default()).unwrap();
    repo.kv().set(CacheKey::Session, &"token").unwrap();

    repo.purge(LOGOUT_PURGE).unwrap();

    assert!(repo.jobs().unwrap().is_empty());
    assert!(repo.job_filters().unwrap().is_none());
    assert!(repo.kv().contains(CacheKey::Session).unwrap());
  }
}
