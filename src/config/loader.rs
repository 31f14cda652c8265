use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use super::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("server.bind_address cannot be empty")]
    EmptyBindAddress,

    #[error("database.path cannot be empty")]
    EmptyDatabasePath,

    #[error("database.max_connections must be at least 1")]
    InvalidMaxConnections,

    #[error("batch interval must be at least 1 minute: {0}")]
    InvalidBatchInterval(&'static str),

    #[error("locking.stale_lock_timeout_minutes must be positive")]
    InvalidStaleLockTimeout,

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("invalid upstream.forge_kind: {0}. Must be one of: github-like, gitlab-like")]
    InvalidForgeKind(String),
}

/// Layered loader, matching the teacher's precedence order:
/// defaults → project yaml → local yaml → env (highest).
pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (lowest to highest): programmatic defaults,
    /// `fleetctl.yaml`, `fleetctl.local.yaml`, `FLEETCTL_*` env vars.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("fleetctl.yaml"))
            .merge(Yaml::file("fleetctl.local.yaml"))
            .merge(Env::prefixed("FLEETCTL_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.server.bind_address.is_empty() {
            return Err(ConfigError::EmptyBindAddress);
        }
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections);
        }
        if config.batch.default_registry_sweep_interval_minutes == 0 {
            return Err(ConfigError::InvalidBatchInterval("default_registry_sweep_interval_minutes"));
        }
        if config.batch.default_tracked_app_sweep_interval_minutes == 0 {
            return Err(ConfigError::InvalidBatchInterval("default_tracked_app_sweep_interval_minutes"));
        }
        if config.locking.stale_lock_timeout_minutes <= 0 {
            return Err(ConfigError::InvalidStaleLockTimeout);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_forge_kinds = ["github-like", "gitlab-like"];
        if !valid_forge_kinds.contains(&config.upstream.forge_kind.as_str()) {
            return Err(ConfigError::InvalidForgeKind(config.upstream.forge_kind.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn rejects_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath)));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn yaml_overrides_merge_over_defaults() {
        let yaml = "server:\n  bind_address: \"127.0.0.1:9090\"\nlogging:\n  level: debug\n";
        let config: Config = Figment::new().merge(Serialized::defaults(Config::default())).merge(Yaml::string(yaml)).extract().unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:9090");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty", "unset fields should keep the default");
    }
}
