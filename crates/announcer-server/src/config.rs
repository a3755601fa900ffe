//! Server configuration loading from file and environment variables.

use announcer_engine::Pacing;
use announcer_flightplan::FlightPlanConfig;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub flightplan: FlightPlanConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "announcer_engine=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Bind-token settings.
#[derive(Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Shared secret required by `POST /bind`. Unset means open binding.
    #[serde(default)]
    pub bind_secret: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("bind_secret", &self.bind_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Where announcement rules and their audio files live.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: String,

    /// Base directory that rule `audio` references are joined onto.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,
}

/// Playback simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// When true, items complete after their estimated speaking time.
    /// When false, items stay current until skipped or stopped.
    #[serde(default = "default_simulate")]
    pub simulate: bool,

    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,

    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,
}

impl PlaybackConfig {
    pub fn pacing(&self) -> Pacing {
        Pacing {
            words_per_minute: self.words_per_minute,
            min_duration: Duration::from_millis(self.min_duration_ms),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_catalog_path() -> String {
    "announcements-config.json".to_string()
}

fn default_audio_dir() -> String {
    "audio".to_string()
}

fn default_simulate() -> bool {
    true
}

fn default_words_per_minute() -> u32 {
    160
}

fn default_min_duration_ms() -> u64 {
    1500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            audio_dir: default_audio_dir(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            simulate: default_simulate(),
            words_per_minute: default_words_per_minute(),
            min_duration_ms: default_min_duration_ms(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `ANNOUNCER_HOST` overrides `server.host`
/// - `ANNOUNCER_PORT` overrides `server.port`
/// - `ANNOUNCER_BIND_SECRET` overrides `auth.bind_secret`
/// - `ANNOUNCER_CATALOG_PATH` overrides `catalog.path`
/// - `ANNOUNCER_AUDIO_DIR` overrides `catalog.audio_dir`
/// - `ANNOUNCER_LOG_LEVEL` overrides `logging.level`
/// - `ANNOUNCER_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `ANNOUNCER_FLIGHTPLAN_URL`, `ANNOUNCER_FLIGHTPLAN_USERNAME` and
///   `ANNOUNCER_FLIGHTPLAN_API_KEY` override the `flightplan` section
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("ANNOUNCER_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("ANNOUNCER_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(secret) = var("ANNOUNCER_BIND_SECRET") {
        config.auth.bind_secret = Some(secret).filter(|s| !s.is_empty());
    }
    if let Some(path) = var("ANNOUNCER_CATALOG_PATH") {
        config.catalog.path = path;
    }
    if let Some(dir) = var("ANNOUNCER_AUDIO_DIR") {
        config.catalog.audio_dir = dir;
    }
    if let Some(level) = var("ANNOUNCER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("ANNOUNCER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(url) = var("ANNOUNCER_FLIGHTPLAN_URL") {
        config.flightplan.api_url = url;
    }
    if let Some(username) = var("ANNOUNCER_FLIGHTPLAN_USERNAME") {
        config.flightplan.username = Some(username);
    }
    if let Some(api_key) = var("ANNOUNCER_FLIGHTPLAN_API_KEY") {
        config.flightplan.api_key = Some(api_key);
    }
}
