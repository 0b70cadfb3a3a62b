use std::path::{Path, PathBuf};

use fw_core::FpsChoice;
use serde::Deserialize;

/// Host-side application settings, read from a JSON file.
///
/// Every field has a default so a partial (or missing) file still yields a
/// usable config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Root of the persisted store (`data/`, `worlds/`).
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// One of "30", "60", "120", "240".
    #[serde(default = "default_fps")]
    pub fps: String,
    #[serde(default)]
    pub show_fps: bool,
    #[serde(default)]
    pub imu_present: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_title() -> String {
    "FlipWorld".to_string()
}

fn default_base_path() -> PathBuf {
    PathBuf::from("flip_world_data")
}

fn default_api_base_url() -> String {
    "https://www.flipsocial.net/api".to_string()
}

fn default_fps() -> String {
    FpsChoice::default().label().to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            base_path: default_base_path(),
            api_base_url: default_api_base_url(),
            fps: default_fps(),
            show_fps: false,
            imu_present: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }

    /// Load `path`, falling back to defaults (with a warning) if it is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("{e}; using default config");
                Self::default()
            }
        }
    }

    /// Parsed frame rate; an unrecognized label falls back to 30 fps.
    pub fn fps_choice(&self) -> FpsChoice {
        FpsChoice::from_label(&self.fps).unwrap_or_else(|| {
            log::warn!("Unknown fps '{}' in config, using default", self.fps);
            FpsChoice::default()
        })
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn endpoint(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "fw_config_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let path = temp_file_path("partial");
        std::fs::write(&path, r#"{ "fps": "120", "show_fps": true }"#).expect("write config");
        let config = AppConfig::load(&path).expect("load config");
        assert_eq!(config.fps_choice(), FpsChoice::Fps120);
        assert!(config.show_fps);
        assert_eq!(config.title, "FlipWorld");
        assert_eq!(config.request_timeout_secs, 30);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let config = AppConfig::load_or_default(&temp_file_path("missing"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn invalid_json_falls_back_to_default() {
        let path = temp_file_path("invalid");
        std::fs::write(&path, "{ not json").expect("write config");
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn unknown_fps_label_uses_default_choice() {
        let config = AppConfig {
            fps: "75".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.fps_choice(), FpsChoice::Fps30);
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = AppConfig {
            api_base_url: "http://localhost:8000/api/".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.endpoint("/user/login"), "http://localhost:8000/api/user/login");
    }
}
