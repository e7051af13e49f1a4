//! Configuration for AVDECC entity trackers.
//!
//! TOML file plus `AVDECC_`-prefixed environment overrides, translated
//! into `avdecc_core::TrackerConfig`. The core crate never reads files;
//! applications load a `Config` here and hand the result in.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use avdecc_core::{Backoff, RetryPolicy, TrackerConfig};

/// Upper bound on retries per query category.
pub const MAX_ATTEMPTS_LIMIT: u16 = 32;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Retry budget per enumeration query category.
    #[serde(default)]
    pub retries: Retries,

    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Retries {
    #[serde(default)]
    pub register_unsol: RetrySettings,
    #[serde(default)]
    pub milan_info: RetrySettings,
    #[serde(default)]
    pub descriptor: RetrySettings,
    #[serde(default)]
    pub dynamic_info: RetrySettings,
    #[serde(default)]
    pub descriptor_dynamic_info: RetrySettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffMode {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u16,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default)]
    pub backoff: BackoffMode,

    /// Cap for exponential backoff. Defaults to 8x `delay_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff: BackoffMode::default(),
            max_delay_ms: None,
        }
    }
}

fn default_max_attempts() -> u16 {
    1
}
fn default_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Reuse complete static models across entities of the same model.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

// ── Translation to core types ───────────────────────────────────────

impl RetrySettings {
    fn to_policy(&self, field: &str) -> Result<RetryPolicy, ConfigError> {
        if self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::Validation {
                field: format!("retries.{field}.max_attempts"),
                reason: format!(
                    "{} exceeds the limit of {MAX_ATTEMPTS_LIMIT}",
                    self.max_attempts
                ),
            });
        }
        if self.delay_ms == 0 {
            return Err(ConfigError::Validation {
                field: format!("retries.{field}.delay_ms"),
                reason: "must be greater than zero".into(),
            });
        }

        let delay = Duration::from_millis(self.delay_ms);
        match self.backoff {
            BackoffMode::Fixed => Ok(RetryPolicy::fixed(self.max_attempts, delay)),
            BackoffMode::Exponential => {
                let max_delay_ms = self
                    .max_delay_ms
                    .unwrap_or_else(|| self.delay_ms.saturating_mul(8));
                if max_delay_ms < self.delay_ms {
                    return Err(ConfigError::Validation {
                        field: format!("retries.{field}.max_delay_ms"),
                        reason: format!("{max_delay_ms} is below delay_ms ({})", self.delay_ms),
                    });
                }
                Ok(RetryPolicy::exponential(
                    self.max_attempts,
                    delay,
                    Duration::from_millis(max_delay_ms),
                ))
            }
        }
    }
}

impl Config {
    /// Validate and build the per-entity tracker configuration.
    pub fn tracker_config(&self) -> Result<TrackerConfig, ConfigError> {
        let retries = &self.retries;
        Ok(TrackerConfig {
            register_unsol: retries.register_unsol.to_policy("register_unsol")?,
            milan_info: retries.milan_info.to_policy("milan_info")?,
            descriptor: retries.descriptor.to_policy("descriptor")?,
            dynamic_info: retries.dynamic_info.to_policy("dynamic_info")?,
            descriptor_dynamic_info: retries
                .descriptor_dynamic_info
                .to_policy("descriptor_dynamic_info")?,
            model_cache_enabled: self.cache.enabled,
        })
    }
}

/// Human-readable summary of a policy, for logs and diagnostics.
pub fn describe_policy(policy: &RetryPolicy) -> String {
    match policy.backoff {
        Backoff::Fixed => format!(
            "{} attempt(s), {}ms fixed",
            policy.max_attempts,
            policy.delay.as_millis()
        ),
        Backoff::Exponential { max_delay } => format!(
            "{} attempt(s), {}ms doubling up to {}ms",
            policy.max_attempts,
            policy.delay.as_millis(),
            max_delay.as_millis()
        ),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "avdecc", "avdecc").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("avdecc");
    p
}

// ── Config loading ──────────────────────────────────────────────────

fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("AVDECC_").split("__"))
}

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_core_defaults() {
        let tracker = Config::default().tracker_config().unwrap();
        assert_eq!(tracker, TrackerConfig::default());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn file_overrides_single_category() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[retries.descriptor]
max_attempts = 4
delay_ms = 250
backoff = "exponential"
max_delay_ms = 1000

[cache]
enabled = false
"#,
        )
        .unwrap();

        let tracker = load_config_from(&path).unwrap().tracker_config().unwrap();
        assert_eq!(
            tracker.descriptor,
            RetryPolicy::exponential(4, Duration::from_millis(250), Duration::from_secs(1))
        );
        assert_eq!(tracker.milan_info, RetryPolicy::default());
        assert!(!tracker.model_cache_enabled);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.retries.dynamic_info.max_attempts = 3;

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn rejects_excessive_attempts() {
        let mut config = Config::default();
        config.retries.register_unsol.max_attempts = MAX_ATTEMPTS_LIMIT + 1;

        let err = config.tracker_config().unwrap_err();
        assert!(err.to_string().contains("retries.register_unsol.max_attempts"));
    }

    #[test]
    fn rejects_zero_delay_and_inverted_cap() {
        let mut config = Config::default();
        config.retries.milan_info.delay_ms = 0;
        assert!(config.tracker_config().is_err());

        let mut config = Config::default();
        config.retries.milan_info = RetrySettings {
            backoff: BackoffMode::Exponential,
            delay_ms: 500,
            max_delay_ms: Some(100),
            ..RetrySettings::default()
        };
        assert!(matches!(
            config.tracker_config(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn describes_policies() {
        assert_eq!(describe_policy(&RetryPolicy::default()), "1 attempt(s), 500ms fixed");
        assert_eq!(
            describe_policy(&RetryPolicy::exponential(
                3,
                Duration::from_millis(100),
                Duration::from_millis(400)
            )),
            "3 attempt(s), 100ms doubling up to 400ms"
        );
    }
}
