//! Persisted job search filters.

use serde::{Deserialize, Serialize};

use crate::api::types::Job;

use super::facets::SalaryBounds;

/// Filters as stored under the `job_filters` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobFilters {
  /// Exact job position
  pub category: String,
  /// Case-insensitive substring of the job location
  pub location: String,
  pub job_types: Vec<String>,
  pub min_salary: f64,
  /// `0` means the salary range was never initialized
  pub max_salary: f64,
}

/// "Daily Worker" -> "daily_worker".
pub fn normalize_job_type(value: &str) -> String {
  value
    .to_lowercase()
    .split_whitespace()
    .collect::<Vec<_>>()
    .join("_")
}

impl JobFilters {
  pub fn toggle_job_type(&mut self, job_type: &str) {
    match self.job_types.iter().position(|t| t == job_type) {
      Some(i) => {
        self.job_types.remove(i);
      }
      None => self.job_types.push(job_type.to_string()),
    }
  }

  /// Set the lower bound, dragging the upper bound along when crossed.
  pub fn set_min_salary(&mut self, value: f64) {
    self.min_salary = value;
    if self.min_salary > self.max_salary {
      self.max_salary = self.min_salary;
    }
  }

  /// Set the upper bound, dragging the lower bound along when crossed.
  pub fn set_max_salary(&mut self, value: f64) {
    self.max_salary = value;
    if self.max_salary < self.min_salary {
      self.min_salary = self.max_salary;
    }
  }

  /// Reset the salary range to the full data range.
  pub fn reset_salary(&mut self, bounds: SalaryBounds) {
    self.min_salary = bounds.min;
    self.max_salary = bounds.max;
  }

  fn has_salary_range(&self) -> bool {
    self.max_salary > 0.0
  }

  pub fn matches(&self, job: &Job) -> bool {
    if !self.category.is_empty() && job.position.as_deref() != Some(self.category.as_str()) {
      return false;
    }

    if !self.location.is_empty() {
      let needle = self.location.to_lowercase();
      let found = job
        .location
        .as_deref()
        .is_some_and(|l| l.to_lowercase().contains(&needle));
      if !found {
        return false;
      }
    }

    if !self.job_types.is_empty() {
      let kind = normalize_job_type(job.category.as_deref().unwrap_or_default());
      if !self.job_types.iter().any(|t| normalize_job_type(t) == kind) {
        return false;
      }
    }

    // Jobs without a parseable fee are never excluded by salary
    if let (true, Some(fee)) = (self.has_salary_range(), job.fee_amount()) {
      if fee < self.min_salary || fee > self.max_salary {
        return false;
      }
    }

    true
  }

  pub fn apply(&self, jobs: &[Job]) -> Vec<Job> {
    jobs.iter().filter(|j| self.matches(j)).cloned().collect()
  }

  /// Query parameters for a server-side filtered reload.
  ///
  /// Salary bounds are only sent when narrower than `bounds`.
  pub fn query_params(&self, bounds: Option<SalaryBounds>) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if !self.category.is_empty() {
      params.push(("category", self.category.clone()));
    }
    if !self.location.is_empty() {
      params.push(("location", self.location.clone()));
    }
    if !self.job_types.is_empty() {
      params.push(("type", self.job_types.join(",")));
    }
    if let Some(bounds) = bounds {
      if self.min_salary > bounds.min {
        params.push(("min_salary", self.min_salary.to_string()));
      }
      if self.has_salary_range() && self.max_salary < bounds.max {
        params.push(("max_salary", self.max_salary.to_string()));
      }
    }
    params
  }
}
