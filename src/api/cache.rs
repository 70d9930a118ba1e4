//! Caching implementations for worker API types.

use crate::cache::Cacheable;

use super::types::{
  Application, ApplicationCount, AttendanceRecord, Education, Experience, Hotel, Job, Skill,
};

/// Turns server logo paths into displayable URLs.
///
/// Relative paths are resolved against the asset base URL and suffixed with
/// `?t=<timestamp>` so a re-fetched path is never served from an image cache.
/// Absolute URLs pass through untouched; missing logos get the default asset.
#[derive(Debug, Clone)]
pub struct LogoNormalizer {
  base_url: String,
  default_logo: String,
}

impl LogoNormalizer {
  pub fn new(base_url: impl Into<String>, default_logo: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into().trim_end_matches('/').to_string(),
      default_logo: default_logo.into(),
    }
  }

  pub fn normalize(&self, logo: Option<&str>, timestamp: i64) -> String {
    let logo = match logo.map(str::trim) {
      Some(l) if !l.is_empty() => l,
      _ => return self.default_logo.clone(),
    };

    if logo.starts_with("http://") || logo.starts_with("https://") || logo == self.default_logo {
      return logo.to_string();
    }

    format!(
      "{}/{}?t={}",
      self.base_url,
      logo.trim_start_matches('/'),
      timestamp
    )
  }
}

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Job {
  fn entity_type() -> &'static str {
    "job"
  }

  fn normalize(&mut self, logos: &LogoNormalizer, timestamp: i64) {
    self.hotel_logo = Some(logos.normalize(self.hotel_logo.as_deref(), timestamp));
  }
}

impl Cacheable for Hotel {
  fn entity_type() -> &'static str {
    "hotel"
  }

  fn normalize(&mut self, logos: &LogoNormalizer, timestamp: i64) {
    if self.logo.is_some() {
      self.logo = Some(logos.normalize(self.logo.as_deref(), timestamp));
    }
  }
}

impl Cacheable for Application {
  fn entity_type() -> &'static str {
    "application"
  }
}

impl Cacheable for AttendanceRecord {
  fn entity_type() -> &'static str {
    "attendance"
  }
}

impl Cacheable for ApplicationCount {
  fn entity_type() -> &'static str {
    "application_count"
  }
}

impl Cacheable for Skill {
  fn entity_type() -> &'static str {
    "skill"
  }
}

impl Cacheable for Experience {
  fn entity_type() -> &'static str {
    "experience"
  }
}

impl Cacheable for Education {
  fn entity_type() -> &'static str {
    "education"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::normalize_all;

  fn logos() -> LogoNormalizer {
    LogoNormalizer::new("http://heyworkapi.fpp/public/", "assets/images/jobs/default.png")
  }

  #[test]
  fn test_relative_logo_gets_base_and_timestamp() {
    assert_eq!(
      logos().normalize(Some("/storage/logos/grand.png"), 1700000000000),
      "http://heyworkapi.fpp/public/storage/logos/grand.png?t=1700000000000"
    );
  }

  #[test]
  fn test_absolute_logo_untouched() {
    assert_eq!(
      logos().normalize(Some("https://cdn.example.com/a.png"), 1),
      "https://cdn.example.com/a.png"
    );
  }

  #[test]
  fn test_missing_logo_uses_default() {
    assert_eq!(logos().normalize(None, 1), "assets/images/jobs/default.png");
    assert_eq!(logos().normalize(Some("  "), 1), "assets/images/jobs/default.png");
  }

  #[test]
  fn test_jobs_normalized_in_bulk() {
    let jobs = vec![
      Job {
        id: "1".into(),
        hotel_logo: Some("logos/a.png".to_string()),
        ..Default::default()
      },
      Job {
        id: "2".into(),
        ..Default::default()
      },
    ];

    let jobs = normalize_all(jobs, &logos(), 42);
    assert_eq!(
      jobs[0].hotel_logo.as_deref(),
      Some("http://heyworkapi.fpp/public/logos/a.png?t=42")
    );
    assert_eq!(jobs[1].hotel_logo.as_deref(), Some("assets/images/jobs/default.png"));
  }
}
