//! Scenario configuration for the evaluation service.
//!
//! Loads `scenario.toml` plus `OPENAI_API_KEY`/`OPENAI_BASE_URL` from the
//! environment, the way `config_manager` merges archetype files with
//! environment overrides (`env_nonempty`, highest-priority-wins).

use std::path::{Path, PathBuf};
use std::time::Duration;

use green_core::Track;
use green_errors::SettingsError;
use serde::Deserialize;

const DEFAULT_TASK_COUNT: usize = 5;
const DEFAULT_TIMEOUT_PER_TASK_SECS: u64 = 60;

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    config: Option<ConfigTable>,
}

#[derive(Debug, Deserialize)]
struct ConfigTable {
    track: Option<String>,
    task_count: Option<usize>,
    timeout_per_task: Option<u64>,
}

/// Immutable evaluation settings, the single source of truth for
/// defaults like `task_count` (no other module hard-codes its own copy).
#[derive(Debug, Clone)]
pub struct Settings {
    pub track: Track,
    pub task_count: usize,
    pub timeout_per_task: Duration,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
}

impl Settings {
    /// Load and validate settings from a `scenario.toml` file plus the
    /// process environment. Fatal on any missing/invalid field — there
    /// is no partial-settings recovery, matching the original's
    /// all-or-nothing `Settings.from_file`.
    pub fn from_file(config_path: &Path) -> Result<Self, SettingsError> {
        if !config_path.exists() {
            return Err(SettingsError::FileNotFound(config_path.to_path_buf()));
        }

        let raw = std::fs::read_to_string(config_path).map_err(|source| SettingsError::Io {
            path: config_path.to_path_buf(),
            source,
        })?;

        let parsed: ScenarioFile = toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;

        let cfg = parsed.config.ok_or(SettingsError::MissingConfigTable)?;

        let track_str = cfg.track.ok_or(SettingsError::MissingConfigTable)?;
        let track: Track = track_str
            .parse()
            .map_err(|_| SettingsError::InvalidTrack(track_str))?;

        let openai_api_key = env_nonempty("OPENAI_API_KEY").ok_or(SettingsError::MissingApiKey)?;
        let openai_base_url = env_nonempty("OPENAI_BASE_URL");

        Ok(Settings {
            track,
            task_count: cfg.task_count.unwrap_or(DEFAULT_TASK_COUNT),
            timeout_per_task: Duration::from_secs(
                cfg.timeout_per_task.unwrap_or(DEFAULT_TIMEOUT_PER_TASK_SECS),
            ),
            openai_api_key,
            openai_base_url,
        })
    }

    pub fn is_tdd_mode(&self) -> bool {
        matches!(self.track, Track::Tdd)
    }

    pub fn is_bdd_mode(&self) -> bool {
        matches!(self.track, Track::Bdd)
    }

    /// Task corpus directory for the configured track: `data/tasks/{track}/python`.
    pub fn task_directory(&self) -> PathBuf {
        Path::new("data")
            .join("tasks")
            .join(self.track.as_str())
            .join("python")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_scenario(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_defaults_when_optional_fields_absent() {
        std::env::set_var("OPENAI_API_KEY", "test-key");
        std::env::remove_var("OPENAI_BASE_URL");
        let file = write_scenario("[config]\ntrack = \"tdd\"\n");

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.task_count, DEFAULT_TASK_COUNT);
        assert_eq!(settings.timeout_per_task, Duration::from_secs(DEFAULT_TIMEOUT_PER_TASK_SECS));
        assert!(settings.is_tdd_mode());
        assert_eq!(settings.openai_api_key, "test-key");
    }

    #[test]
    fn rejects_invalid_track() {
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let file = write_scenario("[config]\ntrack = \"waterfall\"\n");

        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidTrack(_)));
    }

    #[test]
    fn rejects_missing_api_key() {
        std::env::remove_var("OPENAI_API_KEY");
        let file = write_scenario("[config]\ntrack = \"bdd\"\n");

        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::MissingApiKey));
    }

    #[test]
    fn rejects_missing_config_table() {
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let file = write_scenario("title = \"no config table\"\n");

        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::MissingConfigTable));
    }

    #[test]
    fn task_directory_uses_track() {
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let file = write_scenario("[config]\ntrack = \"bdd\"\n");
        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.task_directory(), PathBuf::from("data/tasks/bdd/python"));
    }
}
