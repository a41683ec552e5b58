use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CacheError;

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Shared remote tier
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local (L1) cache max entries
    #[serde(default = "default_local_capacity")]
    pub local_capacity: usize,

    /// Pub/sub channel carrying invalidation messages
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Prefix of the remote keys holding versions
    #[serde(default = "default_version_prefix")]
    pub version_prefix: String,

    /// TTL in seconds applied to remote values when a call passes none
    #[serde(default)]
    pub default_ttl_secs: Option<u64>,
}

fn default_local_capacity() -> usize {
    10_000
}

fn default_channel() -> String {
    "multilevel-cache:invalidate".to_string()
}

fn default_version_prefix() -> String {
    "__v:".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            local_capacity: default_local_capacity(),
            channel: default_channel(),
            version_prefix: default_version_prefix(),
            default_ttl_secs: None,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.local_capacity == 0 {
            return Err(CacheError::Config("local_capacity must be > 0".into()));
        }
        if self.channel.trim().is_empty() {
            return Err(CacheError::Config("channel must not be empty".into()));
        }
        if self.version_prefix.is_empty() {
            return Err(CacheError::Config("version_prefix must not be empty".into()));
        }
        if self.default_ttl_secs == Some(0) {
            return Err(CacheError::Config("default_ttl_secs must be > 0".into()));
        }
        self.remote.validate()
    }
}

/// Redis configuration for the shared tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Enable the remote tier (gracefully degrades without it)
    /// Default: false (local-only, single-instance)
    #[serde(default = "default_remote_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_remote_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_remote_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_remote_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_remote_enabled() -> bool {
    false
}

fn default_remote_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_remote_pool_size() -> usize {
    10
}

fn default_remote_timeout_ms() -> u64 {
    5000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: default_remote_enabled(),
            url: default_remote_url(),
            pool_size: default_remote_pool_size(),
            timeout_ms: default_remote_timeout_ms(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        if !(self.url.starts_with("redis://") || self.url.starts_with("rediss://")) {
            return Err(CacheError::Config(format!(
                "remote.url must start with redis:// or rediss://, got {}",
                self.url
            )));
        }
        if self.pool_size == 0 {
            return Err(CacheError::Config("remote.pool_size must be > 0".into()));
        }
        if self.timeout_ms == 0 {
            return Err(CacheError::Config("remote.timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

pub mod loader {
    use super::CacheConfig;
    use crate::error::CacheError;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default config file looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "league-cache.toml";

    /// Load configuration from an optional TOML file plus environment
    /// overrides, e.g. `LEAGUE_CACHE__REMOTE__URL=redis://cache:6379`.
    pub fn load_config(path: Option<&str>) -> Result<CacheConfig, CacheError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            return Err(CacheError::Config(format!(
                "config file not found: {}",
                pathbuf.display()
            )));
        }

        builder = builder.add_source(
            Environment::with_prefix("LEAGUE_CACHE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| CacheError::Config(format!("config build error: {e}")))?;
        let merged: CacheConfig = cfg
            .try_deserialize()
            .map_err(|e| CacheError::Config(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
