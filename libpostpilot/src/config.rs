//! Configuration management for Postpilot

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::types::Platform;

pub const DEFAULT_LEASE_NAME: &str = "scheduled-publish-sweep";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub platforms: PlatformsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// What to do with a post when every publish attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalFailurePolicy {
    /// Leave the post scheduled so the next sweep tries again
    #[default]
    Retry,
    /// Move the post to `failed`
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Poll interval when running as a daemon
    #[serde(with = "duration_str")]
    pub interval: Duration,
    /// Upper bound for a single publish call
    #[serde(with = "duration_str")]
    pub publish_timeout: Duration,
    /// How long a sweep lease stays valid without release
    #[serde(with = "duration_str")]
    pub lease_ttl: Duration,
    pub lease_name: String,
    pub max_concurrent_posts: usize,
    pub on_total_failure: TotalFailurePolicy,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            publish_timeout: Duration::from_secs(30),
            lease_ttl: Duration::from_secs(300),
            lease_name: DEFAULT_LEASE_NAME.to_string(),
            max_concurrent_posts: 4,
            on_total_failure: TotalFailurePolicy::Retry,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.publish_timeout.is_zero() {
            return Err(invalid("sweep.publish_timeout", "must be greater than zero"));
        }
        if self.lease_ttl.is_zero() {
            return Err(invalid("sweep.lease_ttl", "must be greater than zero"));
        }
        if self.lease_ttl <= self.publish_timeout {
            return Err(invalid(
                "sweep.lease_ttl",
                "must be longer than sweep.publish_timeout",
            ));
        }
        if self.interval.is_zero() {
            return Err(invalid("sweep.interval", "must be greater than zero"));
        }
        if self.max_concurrent_posts == 0 {
            return Err(invalid("sweep.max_concurrent_posts", "must be at least 1"));
        }
        if self.lease_name.trim().is_empty() {
            return Err(invalid("sweep.lease_name", "cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<PlatformConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<PlatformConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<PlatformConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<PlatformConfig>,
}

impl PlatformsConfig {
    pub fn get(&self, platform: Platform) -> Option<&PlatformConfig> {
        match platform {
            Platform::Facebook => self.facebook.as_ref(),
            Platform::Instagram => self.instagram.as_ref(),
            Platform::Twitter => self.twitter.as_ref(),
            Platform::Linkedin => self.linkedin.as_ref(),
        }
    }

    /// Platforms with a section whose `enabled` flag is set
    pub fn enabled(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.get(*p).is_some_and(|c| c.enabled))
            .collect()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    /// Simulated API latency for the built-in clients
    #[serde(
        default,
        with = "duration_str::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub latency: Option<Duration>,
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("enabled", &self.enabled)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("latency", &self.latency)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn invalid(field: &str, reason: &str) -> crate::error::PostpilotError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }
        self.sweep.validate()
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/postpilot/posts.db".to_string(),
            },
            sweep: SweepConfig::default(),
            platforms: PlatformsConfig::default(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("POSTPILOT_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("postpilot").join("config.toml"))
}

/// Human-readable durations ("30s", "5m", "1h 30m")
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
