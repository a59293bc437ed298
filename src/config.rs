//! Application-level configuration loading: remote endpoints, sync cadence and journal location.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/scorer.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COURTSIDE_CONFIG_PATH";
const DEFAULT_BASE_URL: &str = "http://localhost:9000";
const DEFAULT_JOURNAL_DIR: &str = "data/journal";

/// How to reach one remote service.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    /// Base URL, without trailing path.
    pub base_url: String,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
    /// Per-request timeout.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "request_timeout_ms", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            token: None,
            request_timeout: default_request_timeout(),
        }
    }
}

/// Cadence of the sync worker and the connectivity monitor.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Interval between periodic drains while online.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "drain_interval_ms")]
    pub drain_interval: Duration,
    /// Interval between health probes while online; first backoff step while offline.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "probe_interval_ms")]
    pub probe_interval: Duration,
    /// Upper bound of the probe backoff while offline.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_probe_backoff_ms")]
    pub max_probe_backoff: Duration,
    /// Offline gaps at least this long schedule a reconciliation once back online.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "reconcile_after_offline_ms")]
    pub reconcile_after_offline: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drain_interval: Duration::from_secs(5),
            probe_interval: Duration::from_secs(2),
            max_probe_backoff: Duration::from_secs(30),
            reconcile_after_offline: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Stat Ledger endpoint.
    pub ledger: EndpointConfig,
    /// Game/roster provider endpoint.
    pub provider: EndpointConfig,
    /// Sync worker and connectivity cadence.
    pub sync: SyncConfig,
    /// Directory of session journals; `None` disables journaling.
    pub journal_dir: Option<PathBuf>,
    /// Port the local HTTP surface listens on.
    pub port: u16,
    /// Game loaded at boot.
    pub boot_game: Option<uuid::Uuid>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = Self::from_file(&path);
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    fn from_file(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        ledger = %app_config.ledger.base_url,
                        "loaded scorer config"
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

    /// Apply environment overrides looked up through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(url) = non_empty("LEDGER_BASE_URL") {
            self.ledger.base_url = url;
        }
        if let Some(token) = non_empty("LEDGER_TOKEN") {
            self.ledger.token = Some(token);
        }
        if let Some(url) = non_empty("PROVIDER_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(port) = non_empty("PORT")
            .or_else(|| non_empty("SERVER_PORT"))
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.port = port;
        }
        if let Some(raw) = non_empty("GAME_ID") {
            match raw.parse() {
                Ok(game_id) => self.boot_game = Some(game_id),
                Err(err) => warn!(value = %raw, error = %err, "ignoring invalid GAME_ID"),
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ledger: EndpointConfig::default(),
            provider: EndpointConfig::default(),
            sync: SyncConfig::default(),
            journal_dir: Some(PathBuf::from(DEFAULT_JOURNAL_DIR)),
            port: 8080,
            boot_game: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    ledger: EndpointConfig,
    #[serde(default)]
    provider: EndpointConfig,
    #[serde(default)]
    sync: SyncConfig,
    /// Absent means the default directory; `null` disables journaling.
    #[serde(default = "default_journal_dir")]
    journal_dir: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            ledger: value.ledger,
            provider: value.provider,
            sync: value.sync,
            journal_dir: value.journal_dir,
            ..Self::default()
        }
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_journal_dir() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_JOURNAL_DIR))
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
