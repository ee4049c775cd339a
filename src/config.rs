use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, TryFromFloatSecsError};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HindsightConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub search: SearchLimits,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(alias = "storeLocation")]
    pub db_path: String,
    /// Per-attempt busy timeout.
    #[serde(alias = "connectTimeoutSeconds")]
    pub connect_timeout_seconds: u64,
    #[serde(alias = "maxRetries")]
    pub max_retries: u32,
    #[serde(alias = "baseBackoffSeconds")]
    pub base_backoff_seconds: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchLimits {
    #[serde(alias = "defaultLimit")]
    pub default_limit: usize,
    #[serde(alias = "maxLimit")]
    pub max_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8765,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_hindsight_dir()
            .join("knowledge.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            connect_timeout_seconds: 30,
            max_retries: 3,
            base_backoff_seconds: 0.5,
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

impl StorageConfig {
    /// Storage settings pointing at `path`, everything else default.
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            db_path: path.as_ref().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.db_path)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Fails for values too large to be a [`Duration`], such as `inf`.
    pub fn base_backoff(&self) -> Result<Duration, TryFromFloatSecsError> {
        Duration::try_from_secs_f64(self.base_backoff_seconds.max(0.0))
    }
}

/// Returns `~/.hindsight/`
pub fn default_hindsight_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hindsight")
}

/// Returns the default config file path: `~/.hindsight/config.toml`
pub fn default_config_path() -> PathBuf {
    default_hindsight_dir().join("config.toml")
}

impl HindsightConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            HindsightConfig::default()
        };

        config.apply_env_overrides();
        config
            .storage
            .base_backoff()
            .context("invalid storage.base_backoff_seconds")?;
        Ok(config)
    }

    /// Apply environment variable overrides (HINDSIGHT_DB_PATH, HINDSIGHT_LOG_LEVEL,
    /// HINDSIGHT_TRANSPORT).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HINDSIGHT_DB_PATH") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("HINDSIGHT_LOG_LEVEL") {
            self.server.log_level = val.to_lowercase();
        }
        if let Ok(val) = std::env::var("HINDSIGHT_TRANSPORT") {
            self.server.transport = val;
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
