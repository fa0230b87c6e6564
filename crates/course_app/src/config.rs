use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use course_engine::{ensure_output_dir, AtomicFileWriter, ClientSettings, PersistError, Timings};
use engine_logging::{engine_debug, engine_info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const API_KEY_ENV: &str = "COURSE_API_KEY";
pub const BASE_URL_ENV: &str = "COURSE_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("could not serialize config: {0}")]
    Serialize(#[from] ron::Error),
    #[error("could not save config: {0}")]
    Persist(#[from] PersistError),
    #[error("invalid config path: {0:?}")]
    InvalidPath(PathBuf),
}

/// Contents of `course.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Where downloaded artifacts are saved.
    pub output_dir: PathBuf,
    /// Log to this file in addition to the terminal.
    pub log_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub timings: TimingsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let settings = ClientSettings::default();
        Self {
            base_url: settings.base_url,
            api_key: None,
            output_dir: PathBuf::from("output"),
            log_file: None,
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            timings: TimingsConfig::default(),
        }
    }
}

/// Collaborator schedules in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingsConfig {
    pub status_interval_ms: u64,
    pub files_interval_ms: u64,
    pub files_initial_delay_ms: u64,
    pub stream_start_delay_ms: u64,
    pub reconnect_delay_ms: u64,
    pub inactivity_threshold_ms: u64,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        let timings = Timings::default();
        Self {
            status_interval_ms: millis(timings.status_interval),
            files_interval_ms: millis(timings.files_interval),
            files_initial_delay_ms: millis(timings.files_initial_delay),
            stream_start_delay_ms: millis(timings.stream_start_delay),
            reconnect_delay_ms: millis(timings.reconnect_delay),
            inactivity_threshold_ms: millis(timings.inactivity_threshold),
        }
    }
}

impl From<TimingsConfig> for Timings {
    fn from(config: TimingsConfig) -> Self {
        Self {
            // A zero period would make tokio's interval panic.
            status_interval: Duration::from_millis(config.status_interval_ms.max(1)),
            files_interval: Duration::from_millis(config.files_interval_ms.max(1)),
            files_initial_delay: Duration::from_millis(config.files_initial_delay_ms),
            stream_start_delay: Duration::from_millis(config.stream_start_delay_ms),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            inactivity_threshold: Duration::from_millis(config.inactivity_threshold_ms),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl AppConfig {
    /// Read the config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                engine_debug!("No config at {:?}; using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        engine_debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Atomically replace the config file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ConfigError::InvalidPath(path.to_path_buf()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_output_dir(&dir)?;

        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(self, pretty)?;
        AtomicFileWriter::new(dir).write(file_name, content.as_bytes())?;
        engine_info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Apply `COURSE_API_KEY` and `COURSE_BASE_URL` from `lookup`. Empty values
    /// are ignored.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(key) = non_empty(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty(BASE_URL_ENV) {
            self.base_url = url;
        }
        self
    }

    pub fn with_overrides(mut self, base_url: Option<String>, api_key: Option<String>) -> Self {
        if let Some(url) = base_url {
            self.base_url = url;
        }
        if let Some(key) = api_key {
            self.api_key = Some(key);
        }
        self
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            timings: self.timings.into(),
        }
    }
}

/// The key with everything but the last four characters masked.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load(&temp.path().join("course.ron")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timings.status_interval_ms, 2000);
    }

    #[test]
    fn config_round_trips_through_ron() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("course.ron");
        let config = AppConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "https://courses.example.com".to_string(),
            log_file: Some(PathBuf::from("course.log")),
            ..AppConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("course.ron");
        fs::write(&path, r#"(api_key: Some("sk-file"), timings: (reconnect_delay_ms: 500))"#)
            .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-file"));
        assert_eq!(config.timings.reconnect_delay_ms, 500);
        assert_eq!(config.timings.status_interval_ms, 2000);
        assert_eq!(config.base_url, "http://localhost:8000");
    }

    #[test]
    fn malformed_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("course.ron");
        fs::write(&path, "(api_key: ").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn env_overrides_file_and_flags_override_env() {
        let file = AppConfig {
            api_key: Some("sk-file".to_string()),
            ..AppConfig::default()
        };
        let env = |name: &str| match name {
            API_KEY_ENV => Some("sk-env".to_string()),
            BASE_URL_ENV => Some("  ".to_string()),
            _ => None,
        };

        let config = file.with_env(env);
        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.base_url, "http://localhost:8000");

        let config = config.with_overrides(Some("http://backend:9000".to_string()), None);
        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.base_url, "http://backend:9000");
    }

    #[test]
    fn settings_carry_timings() {
        let config = AppConfig {
            timings: TimingsConfig {
                status_interval_ms: 0,
                ..TimingsConfig::default()
            },
            ..AppConfig::default()
        };
        let settings = config.client_settings();
        assert_eq!(settings.timings.status_interval, Duration::from_millis(1));
        assert_eq!(settings.timings.reconnect_delay, Duration::from_millis(3000));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn keys_are_masked() {
        assert_eq!(mask_key("sk-abcdef1234"), "*********1234");
        assert_eq!(mask_key("abc"), "***");
    }
}
