//! Application-level configuration loading for the countdown relay.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::services::room_timer::{DEFAULT_MAX_DURATION_SECS, DEFAULT_TICK_INTERVAL, TimerSettings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ROOM_COUNTDOWN_CONFIG_PATH";
/// Port used when neither the config file nor the environment provides one.
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    timer: TimerSettings,
    port: u16,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration stored at `path`.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        max_duration_secs = app_config.timer.max_duration_secs,
                        tick_interval_ms = app_config.timer.tick_interval.as_millis() as u64,
                        "loaded countdown settings from config"
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

    /// Settings handed to every room timer controller.
    pub fn timer_settings(&self) -> TimerSettings {
        self.timer
    }

    /// Listening port, with `PORT` or `SERVER_PORT` taking precedence over the file.
    pub fn port(&self) -> u16 {
        env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timer: TimerSettings::default(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    max_duration_secs: Option<i64>,
    tick_interval_ms: Option<u64>,
    port: Option<u16>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let max_duration_secs = match value.max_duration_secs {
            Some(max) if max > 0 => max,
            Some(max) => {
                warn!(max, "ignoring non-positive max_duration_secs");
                DEFAULT_MAX_DURATION_SECS
            }
            None => DEFAULT_MAX_DURATION_SECS,
        };
        let tick_interval = match value.tick_interval_ms {
            Some(0) => {
                warn!("ignoring zero tick_interval_ms");
                DEFAULT_TICK_INTERVAL
            }
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_TICK_INTERVAL,
        };

        Self {
            timer: TimerSettings {
                max_duration_secs,
                tick_interval,
            },
            port: value.port.unwrap_or(DEFAULT_PORT),
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
