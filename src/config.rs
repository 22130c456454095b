//! Application-level configuration loading: room code, default round settings, categories and timings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::session::{RoundConfig, is_valid_room_code};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARTY_QUIZ_CONFIG_PATH";

const DEFAULT_SUBJECT: &str = "歷史";
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_PRESENTER_LEASE_TTL_SECS: u64 = 15;
const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    room_code: Option<String>,
    subject: String,
    defaults: RoundConfig,
    categories: Vec<String>,
    tick_interval: Duration,
    presenter_lease_ttl: Duration,
    transition_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        room_code = ?app_config.room_code,
                        categories = app_config.categories.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Fixed room code, when the deployment pins one.
    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    /// Subject offered to presenters.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Round settings restored by a full reset.
    pub fn defaults(&self) -> RoundConfig {
        self.defaults
    }

    /// Categories offered to presenters.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Countdown tick period.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Lifetime of a presenter lease between renewals.
    pub fn presenter_lease_ttl(&self) -> Duration {
        self.presenter_lease_ttl
    }

    /// Upper bound for the persistence step of a transition.
    pub fn transition_timeout(&self) -> Duration {
        self.transition_timeout
    }

    /// Pin the room code.
    pub fn with_room_code(mut self, room_code: impl Into<String>) -> Self {
        self.room_code = Some(room_code.into());
        self
    }

    /// Override the bound on a transition's persistence step.
    pub fn with_transition_timeout(mut self, transition_timeout: Duration) -> Self {
        self.transition_timeout = transition_timeout;
        self
    }

    /// Override the countdown tick period.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            room_code: None,
            subject: DEFAULT_SUBJECT.to_owned(),
            defaults: RoundConfig::default(),
            categories: default_categories(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            presenter_lease_ttl: Duration::from_secs(DEFAULT_PRESENTER_LEASE_TTL_SECS),
            transition_timeout: Duration::from_millis(DEFAULT_TRANSITION_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    room_code: Option<String>,
    subject: Option<String>,
    defaults: Option<RawDefaults>,
    categories: Option<Vec<String>>,
    tick_interval_ms: Option<u64>,
    presenter_lease_ttl_secs: Option<u64>,
    transition_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Default round settings inside the configuration file.
struct RawDefaults {
    total_rounds: Option<u32>,
    time_per_round: Option<u32>,
    allow_duplicate: Option<bool>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let fallback = Self::default();

        let room_code = value.room_code.filter(|code| {
            let valid = is_valid_room_code(code);
            if !valid {
                warn!(room_code = %code, "ignoring configured room code; expected four digits");
            }
            valid
        });

        let defaults = value
            .defaults
            .map(|raw| RoundConfig {
                total_rounds: raw
                    .total_rounds
                    .filter(|rounds| *rounds > 0)
                    .unwrap_or(fallback.defaults.total_rounds),
                time_per_round: raw
                    .time_per_round
                    .filter(|secs| *secs > 0)
                    .unwrap_or(fallback.defaults.time_per_round),
                allow_duplicate: raw
                    .allow_duplicate
                    .unwrap_or(fallback.defaults.allow_duplicate),
            })
            .unwrap_or(fallback.defaults);

        let categories = value
            .categories
            .filter(|categories| !categories.is_empty())
            .unwrap_or(fallback.categories);

        Self {
            room_code,
            subject: value.subject.unwrap_or(fallback.subject),
            defaults,
            categories,
            tick_interval: value
                .tick_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(fallback.tick_interval),
            presenter_lease_ttl: value
                .presenter_lease_ttl_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(fallback.presenter_lease_ttl),
            transition_timeout: value
                .transition_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(fallback.transition_timeout),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Question-bank categories shipped with the binary.
fn default_categories() -> Vec<String> {
    ["台灣史", "東亞史", "世界史", "選修上", "選修下", "全範圍"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "roomCode": "0420", "defaults": { "timePerRound": 90 }, "tickIntervalMs": 250 }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.room_code(), Some("0420"));
        assert_eq!(config.defaults().time_per_round, 90);
        assert_eq!(config.defaults().total_rounds, 3);
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.categories().len(), 6);
        assert_eq!(config.subject(), "歷史");
    }

    #[test]
    fn malformed_room_code_and_zero_values_fall_back() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "roomCode": "abc", "defaults": { "totalRounds": 0 }, "categories": [] }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.room_code(), None);
        assert_eq!(config.defaults().total_rounds, 3);
        assert_eq!(config.categories().last().map(String::as_str), Some("全範圍"));
    }
}
