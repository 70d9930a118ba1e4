use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub attendance: AttendanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// REST root, e.g. `http://heyworkapi.fpp/public/api`
  pub api_url: String,
  /// Root that relative asset paths (hotel logos) are resolved against
  pub base_url: String,
  /// Live update endpoint; the bearer token is appended as `?token=`
  pub ws_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Constant delay between live channel reconnect attempts
  #[serde(default = "default_reconnect_delay_secs")]
  pub reconnect_delay_secs: u64,
  /// Logo shown for jobs without one
  #[serde(default = "default_logo")]
  pub default_logo: String,
  /// Override for the cache database location
  pub database_path: Option<PathBuf>,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      reconnect_delay_secs: default_reconnect_delay_secs(),
      default_logo: default_logo(),
      database_path: None,
    }
  }
}

impl SyncConfig {
  pub fn reconnect_delay(&self) -> Duration {
    Duration::from_secs(self.reconnect_delay_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceConfig {
  /// Maximum distance from the hotel, in meters, at which check-in is allowed
  #[serde(default = "default_geofence_radius")]
  pub geofence_radius_m: f64,
}

impl Default for AttendanceConfig {
  fn default() -> Self {
    Self {
      geofence_radius_m: default_geofence_radius(),
    }
  }
}

fn default_reconnect_delay_secs() -> u64 {
  3
}

fn default_logo() -> String {
  "assets/images/jobs/default.png".to_string()
}

fn default_geofence_radius() -> f64 {
  100.0
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./heywork.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/heywork/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/heywork/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("heywork.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("heywork").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the account password from the environment.
  pub fn get_password() -> Result<String> {
    std::env::var("HEYWORK_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set HEYWORK_PASSWORD environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_applied() {
    let config = Config::from_yaml(
      r#"
api:
  api_url: http://heyworkapi.fpp/public/api
  base_url: http://heyworkapi.fpp/public
  ws_url: ws://heyworkapi.fpp:8080/ws
"#,
    )
    .unwrap();

    assert_eq!(config.sync.reconnect_delay(), Duration::from_secs(3));
    assert_eq!(config.sync.default_logo, "assets/images/jobs/default.png");
    assert_eq!(config.attendance.geofence_radius_m, 100.0);
    assert!(config.sync.database_path.is_none());
  }

  #[test]
  fn test_overrides() {
    let config = Config::from_yaml(
      r#"
api:
  api_url: https://api.example.com/api
  base_url: https://api.example.com
  ws_url: wss://api.example.com/ws
sync:
  reconnect_delay_secs: 10
attendance:
  geofence_radius_m: 250
"#,
    )
    .unwrap();

    assert_eq!(config.sync.reconnect_delay_secs, 10);
    assert_eq!(config.attendance.geofence_radius_m, 250.0);
  }

  #[test]
  fn test_missing_api_section_fails() {
    assert!(Config::from_yaml("sync:\n  reconnect_delay_secs: 1\n").is_err());
  }
}
