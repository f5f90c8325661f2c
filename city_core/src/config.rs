use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_DASHBOARD_CONFIG: &str = include_str!("data/dashboard_config.json");

pub const CONFIG_PATH_ENV: &str = "CITY_DASHBOARD_CONFIG_PATH";
pub const API_BASE_URL_ENV: &str = "CITY_API_BASE_URL";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    api_base_url: String,
    city_id: Option<String>,
    player_id: Option<String>,
    refresh_interval_secs: u64,
    projection_interval_ms: u64,
    train_max_per_level: u32,
    max_levels_shown: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            city_id: None,
            player_id: None,
            refresh_interval_secs: 60,
            projection_interval_ms: 1000,
            train_max_per_level: 100,
            max_levels_shown: 3,
        }
    }
}

impl DashboardConfig {
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_DASHBOARD_CONFIG).unwrap_or_default()
    }

    /// Parses a config document. Blank ids are treated as absent.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let mut config: DashboardConfig = serde_json::from_str(json)?;
        let city_id = config.city_id.take();
        config.set_city_id(city_id);
        let player_id = config.player_id.take();
        config.set_player_id(player_id);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config = DashboardConfig::from_json_str(&contents)?;
        Ok(config)
    }

    /// Base URL without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn city_id(&self) -> Option<&str> {
        self.city_id.as_deref()
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn projection_interval(&self) -> Duration {
        Duration::from_millis(self.projection_interval_ms.max(1))
    }

    pub fn train_max_per_level(&self) -> u32 {
        self.train_max_per_level
    }

    pub fn max_levels_shown(&self) -> u32 {
        self.max_levels_shown.max(1)
    }

    pub fn set_api_base_url(&mut self, url: impl Into<String>) {
        self.api_base_url = url.into();
    }

    pub fn set_city_id(&mut self, city_id: Option<String>) {
        self.city_id = city_id.filter(|id| !id.trim().is_empty());
    }

    pub fn set_player_id(&mut self, player_id: Option<String>) {
        self.player_id = player_id.filter(|id| !id.trim().is_empty());
    }

    pub fn set_refresh_interval_secs(&mut self, secs: u64) {
        self.refresh_interval_secs = secs;
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse dashboard config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read dashboard config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DashboardConfigMetadata {
    path: Option<PathBuf>,
    base_url_from_env: bool,
}

impl DashboardConfigMetadata {
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn base_url_from_env(&self) -> bool {
        self.base_url_from_env
    }
}

/// File config (or builtin) with the base URL variable applied on top.
pub fn resolve_dashboard_config(
    override_path: Option<&Path>,
    base_url: Option<&str>,
) -> (DashboardConfig, DashboardConfigMetadata) {
    let mut metadata = DashboardConfigMetadata::default();

    let mut config = match override_path {
        Some(path) => match DashboardConfig::from_file(path) {
            Ok(config) => {
                tracing::info!(
                    target: "city_dashboard::config",
                    path = %path.display(),
                    "dashboard_config.loaded=file"
                );
                metadata.path = Some(path.to_path_buf());
                config
            }
            Err(err) => {
                tracing::warn!(
                    target: "city_dashboard::config",
                    path = %path.display(),
                    error = %err,
                    "dashboard_config.load_failed"
                );
                DashboardConfig::builtin()
            }
        },
        None => {
            tracing::info!(
                target: "city_dashboard::config",
                "dashboard_config.loaded=builtin"
            );
            DashboardConfig::builtin()
        }
    };

    if let Some(url) = base_url.map(str::trim).filter(|url| !url.is_empty()) {
        config.set_api_base_url(url);
        metadata.base_url_from_env = true;
        tracing::info!(
            target: "city_dashboard::config",
            base_url = %config.api_base_url(),
            "dashboard_config.base_url=env"
        );
    }

    (config, metadata)
}
