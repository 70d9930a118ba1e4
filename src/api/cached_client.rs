//! Worker client that wraps ApiClient with cache-first reads.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use color_eyre::{eyre::Report, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{CredentialStore, Session, SessionStore};
use crate::cache::{
  CacheKey, CacheLayer, CacheResult, EntityCache, FetchMode, KeyValueStore, SqliteStorage,
};
use crate::config::Config;
use crate::derive::attendance::{group_attendance, AttendanceGroup};
use crate::derive::facets::SalaryBounds;
use crate::derive::filters::JobFilters;
use crate::derive::geo::check_geofence;
use crate::derive::schedule::{schedule_for_date, ScheduleEntry};
use crate::derive::skills::SkillBoard;
use crate::error::SyncError;
use crate::resolve::{hotel_for_job_or_name, resolve_applications, ResolvedApplication};

use super::cache::LogoNormalizer;
use super::client::{ApiClient, HttpTransport, Transport};
use super::types::{
  Application, ApplicationCount, AttendanceKind, AttendanceRecord, AttendanceSubmission,
  Education, Experience, Hotel, Id, Job, Profile,
};

/// Worker API client with transparent caching.
///
/// Collection reads go through the cache layer and never fail; mandatory reads
/// and writes return errors.
#[derive(Clone)]
pub struct WorkerClient {
  api: ApiClient,
  layer: CacheLayer,
  sessions: SessionStore,
  geofence_radius_m: f64,
}

impl WorkerClient {
  /// Client over HTTP with the SQLite cache from the config.
  pub fn new(config: &Config) -> Result<Self> {
    let storage = match &config.sync.database_path {
      Some(path) => SqliteStorage::open_at(path)?,
      None => SqliteStorage::open()?,
    };
    Ok(Self::with_parts(
      config,
      Arc::new(HttpTransport::new()),
      Arc::new(storage),
    ))
  }

  pub fn with_parts(
    config: &Config,
    transport: Arc<dyn Transport>,
    store: Arc<dyn KeyValueStore>,
  ) -> Self {
    let cache = EntityCache::new(store);
    let sessions = SessionStore::new(cache.clone());
    let logos = LogoNormalizer::new(&config.api.base_url, &config.sync.default_logo);
    let layer = CacheLayer::new(cache, Arc::new(sessions.clone()), logos);

    Self {
      api: ApiClient::new(config, transport),
      layer,
      sessions,
      geofence_radius_m: config.attendance.geofence_radius_m,
    }
  }

  pub fn layer(&self) -> &CacheLayer {
    &self.layer
  }

  pub fn cache(&self) -> &EntityCache {
    self.layer.cache()
  }

  pub fn sessions(&self) -> &SessionStore {
    &self.sessions
  }

  // ==========================================================================
  // Session
  // ==========================================================================

  pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
    let response = self.api.login(email, password).await?;

    let mut session = Session::new(response.token);
    session.user = response.user;
    if let Some(seconds) = response.expires_in {
      session = session.with_lifetime(Utc::now(), seconds);
    }

    self.sessions.set_session(&session)?;
    info!(email, "logged in");
    Ok(session)
  }

  pub async fn logout(&self) -> Result<()> {
    self.sessions.clear().await
  }

  /// Worker profile. Any failure signs the worker out before propagating.
  pub async fn profile(&self) -> Result<Profile> {
    let api = self.api.clone();
    let result = self
      .layer
      .fetch_required(|token| async move { api.profile(&token).await })
      .await;

    if let Err(e) = &result {
      warn!(error = %e, "profile unavailable, signing out");
      if let Err(clear_err) = self.sessions.clear().await {
        warn!(error = %clear_err, "failed to clear session");
      }
    }
    result
  }

  // ==========================================================================
  // Collections
  // ==========================================================================

  pub async fn jobs(&self, mode: FetchMode) -> CacheResult<Vec<Job>> {
    let api = self.api.clone();
    self
      .layer
      .fetch_list(CacheKey::Jobs, mode, |token| async move {
        api.jobs(&token, &[]).await
      })
      .await
  }

  pub async fn popular_jobs(&self, mode: FetchMode) -> CacheResult<Vec<Job>> {
    let api = self.api.clone();
    self
      .layer
      .fetch_list(CacheKey::PopularJobs, mode, |token| async move {
        api.popular_jobs(&token).await
      })
      .await
  }

  pub async fn hotels(&self, mode: FetchMode) -> CacheResult<Vec<Hotel>> {
    let api = self.api.clone();
    self
      .layer
      .fetch_list(CacheKey::Hotels, mode, |token| async move {
        api.hotels(&token).await
      })
      .await
  }

  pub async fn applications(&self, mode: FetchMode) -> CacheResult<Vec<Application>> {
    let api = self.api.clone();
    self
      .layer
      .fetch_list(CacheKey::Applications, mode, |token| async move {
        api.applications(&token).await
      })
      .await
  }

  pub async fn application_counts(&self, mode: FetchMode) -> CacheResult<Vec<ApplicationCount>> {
    let api = self.api.clone();
    self
      .layer
      .fetch_list(CacheKey::ApplicationCounts, mode, |token| async move {
        api.application_counts(&token).await
      })
      .await
  }

  pub async fn attendances(&self, mode: FetchMode) -> CacheResult<Vec<AttendanceRecord>> {
    let api = self.api.clone();
    self
      .layer
      .fetch_list(CacheKey::Attendances, mode, |token| async move {
        api.attendances(&token).await
      })
      .await
  }

  pub async fn experiences(&self, mode: FetchMode) -> CacheResult<Vec<Experience>> {
    let api = self.api.clone();
    self
      .layer
      .fetch_list(CacheKey::WorkerExperiences, mode, |token| async move {
        api.experiences(&token).await
      })
      .await
  }

  pub async fn educations(&self, mode: FetchMode) -> CacheResult<Vec<Education>> {
    let api = self.api.clone();
    self
      .layer
      .fetch_list(CacheKey::WorkerEducations, mode, |token| async move {
        api.educations(&token).await
      })
      .await
  }

  // ==========================================================================
  // Joined and derived views
  // ==========================================================================

  /// Applications joined with cached jobs and hotels.
  pub async fn resolved_applications(&self, mode: FetchMode) -> CacheResult<Vec<ResolvedApplication>> {
    let applications = self.applications(mode).await;
    let jobs = self.jobs(FetchMode::CacheFirst).await;
    let hotels = self.hotels(FetchMode::CacheFirst).await;

    applications.map(|apps| resolve_applications(&apps, &jobs.data, &hotels.data))
  }

  pub async fn attendance_groups(&self, mode: FetchMode) -> CacheResult<Vec<AttendanceGroup>> {
    let records = self.attendances(mode).await;
    let jobs = self.jobs(FetchMode::CacheFirst).await;

    records.map(|records| group_attendance(&records, &jobs.data))
  }

  /// Jobs running on `date` with the worker's application and attendance.
  ///
  /// Attendance is always reloaded so a fresh check-in shows up.
  pub async fn schedule(&self, date: NaiveDate, now: NaiveDateTime) -> CacheResult<Vec<ScheduleEntry>> {
    let attendances = self.attendances(FetchMode::Force).await;
    let jobs = self.jobs(FetchMode::CacheFirst).await;
    let applications = self.applications(FetchMode::CacheFirst).await;

    attendances.map(|records| schedule_for_date(date, &jobs.data, &applications.data, &records, now))
  }

  // ==========================================================================
  // Job search
  // ==========================================================================

  /// Persisted filters, or defaults.
  pub fn job_filters(&self) -> Result<JobFilters> {
    Ok(self.cache().job_filters()?.unwrap_or_default())
  }

  /// Cached jobs narrowed by the persisted filters.
  pub async fn filtered_jobs(&self, mode: FetchMode) -> Result<CacheResult<Vec<Job>>> {
    let filters = self.job_filters()?;
    Ok(self.jobs(mode).await.map(|jobs| filters.apply(&jobs)))
  }

  /// Persist `filters` and reload jobs from the server with them.
  ///
  /// The server result replaces `cache_jobs`; the returned list is further
  /// narrowed client-side.
  pub async fn apply_filters(&self, filters: &JobFilters) -> Result<CacheResult<Vec<Job>>> {
    self.cache().set_job_filters(filters)?;

    let bounds = SalaryBounds::from_jobs(&self.cache().jobs()?);
    let params = filters.query_params(bounds);
    let api = self.api.clone();

    let result = self
      .layer
      .fetch_list(CacheKey::Jobs, FetchMode::Force, |token| async move {
        api.jobs(&token, &params).await
      })
      .await;

    Ok(result.map(|jobs| filters.apply(&jobs)))
  }

  /// Remember the job a detail view was opened for. Cleared on logout.
  pub fn select_job(&self, job: &Job) -> Result<()> {
    self.cache().set_selected_job(job)
  }

  // ==========================================================================
  // Skills
  // ==========================================================================

  /// Skill board from the server, falling back to the cached selection when
  /// the server reports none.
  pub async fn skill_board(&self) -> Result<SkillBoard> {
    let token = self.layer.require_token().await?;
    let cached = self.cache().worker_skills()?;

    let all = self.api.all_skills(&token).await?;
    let mine = self.api.my_skills(&token).await?;

    Ok(SkillBoard::from_skills(&all, &mine, &cached))
  }

  /// Save the board's selection.
  ///
  /// The cache is updated before the request so the selection shows
  /// immediately. If the request fails the previous cache entry is restored,
  /// `board` is reloaded from the server, and the error is returned.
  pub async fn save_skills(&self, board: &mut SkillBoard) -> Result<()> {
    let ids = board.validate_for_save()?;
    let previous = self.cache().worker_skills()?;
    self.cache().set_worker_skills(&board.selected_skills())?;

    let saved = match self.layer.require_token().await {
      Ok(token) => self.api.save_skills(&token, &ids).await,
      Err(e) => Err(e),
    };

    if let Err(e) = saved {
      warn!(error = %e, "failed to save skills, rolling back");
      self.cache().set_worker_skills(&previous)?;
      match self.skill_board().await {
        Ok(reloaded) => *board = reloaded,
        Err(reload_err) => {
          warn!(error = %reload_err, "failed to reload skills");
          let previous_ids: Vec<Id> = previous.iter().map(|s| s.id.clone()).collect();
          board.apply_selection(&previous_ids);
        }
      }
      return Err(e);
    }

    info!(count = ids.len(), "skills saved");
    Ok(())
  }

  // ==========================================================================
  // Experience and education
  // ==========================================================================

  pub async fn save_experience(&self, experience: &Experience) -> Result<CacheResult<Vec<Experience>>> {
    if experience.company_name.trim().is_empty() || experience.start_date.trim().is_empty() {
      return Err(Report::new(SyncError::Validation(
        "Company name and start date are required".to_string(),
      )));
    }

    let mut experience = experience.clone();
    if experience.is_current {
      experience.end_date = None;
    }

    let token = self.layer.require_token().await?;
    self.api.save_experience(&token, &experience).await?;
    Ok(self.experiences(FetchMode::Force).await)
  }

  pub async fn save_education(&self, education: &Education) -> Result<CacheResult<Vec<Education>>> {
    if education.instituted_name.trim().is_empty() || education.start_date.trim().is_empty() {
      return Err(Report::new(SyncError::Validation(
        "Institution name and start date are required".to_string(),
      )));
    }

    let mut education = education.clone();
    if education.is_current {
      education.end_date = None;
    }

    let token = self.layer.require_token().await?;
    self.api.save_education(&token, &education).await?;
    Ok(self.educations(FetchMode::Force).await)
  }

  // ==========================================================================
  // Attendance
  // ==========================================================================

  /// Check in or out at the job's hotel.
  ///
  /// The worker must be within the geofence radius of the hotel's cached
  /// coordinates. On success attendance is reloaded from the server.
  pub async fn submit_attendance(
    &self,
    job: &Job,
    application_id: Option<&Id>,
    kind: AttendanceKind,
    position: (f64, f64),
    photo: Option<String>,
  ) -> Result<CacheResult<Vec<AttendanceRecord>>> {
    let application_id = application_id
      .cloned()
      .ok_or_else(|| Report::new(SyncError::Validation("Application id not found".to_string())))?;

    let hotels = self.hotels(FetchMode::CacheFirst).await;
    let hotel = hotel_for_job_or_name(job, &hotels.data)
      .ok_or_else(|| Report::new(SyncError::Validation("Hotel not found in cache".to_string())))?;
    let site = hotel.coordinates().ok_or_else(|| {
      Report::new(SyncError::Validation("Hotel has no coordinates".to_string()))
    })?;

    let check = check_geofence(position, site, self.geofence_radius_m);
    if !check.within() {
      return Err(Report::new(SyncError::Validation(format!(
        "Outside the {} m check-in radius ({:.0} m away)",
        check.radius_m, check.distance_m
      ))));
    }

    let submission = AttendanceSubmission {
      job_id: job.id.clone(),
      application_id,
      kind,
      latitude: position.0,
      longitude: position.1,
      photo,
    };

    let token = self.layer.require_token().await?;
    self.api.submit_attendance(&token, &submission).await?;
    info!(job_id = %job.id, kind = kind.as_str(), distance_m = check.distance_m, "attendance submitted");

    Ok(self.attendances(FetchMode::Force).await)
  }
}
