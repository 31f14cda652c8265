//! Layered configuration (SPEC_FULL.md §2 Ambient Configuration), following
//! the teacher's `infrastructure::config` split between a plain settings
//! struct and a `ConfigLoader` that merges it from several sources.

mod loader;

pub use loader::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub batch: BatchConfig,
    pub locking: LockingConfig,
    pub logging: LoggingConfig,
    pub upstream: UpstreamConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            batch: BatchConfig::default(),
            locking: LockingConfig::default(),
            logging: LoggingConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:8080".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "fleetctl.db".to_string(), max_connections: 10 }
    }
}

/// Default interval new `BatchJobConfig` rows are seeded with when a user
/// first enables a job kind (spec.md §3 `BatchJobConfig.intervalMinutes`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchConfig {
    pub default_registry_sweep_interval_minutes: u32,
    pub default_tracked_app_sweep_interval_minutes: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { default_registry_sweep_interval_minutes: 60, default_tracked_app_sweep_interval_minutes: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockingConfig {
    pub stale_lock_timeout_minutes: i64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self { stale_lock_timeout_minutes: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Where the Upstream Resolver's two provider halves point by default
/// (spec.md §4.1: a registry client and one forge client). Operators
/// override per-deployment; forge-backed tracked apps still carry their
/// own `source_ref`/token independent of this base url.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    pub registry_base_url: String,
    pub forge_kind: String,
    pub forge_base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            registry_base_url: "https://registry-1.docker.io".to_string(),
            forge_kind: "github-like".to_string(),
            forge_base_url: "https://api.github.com".to_string(),
        }
    }
}
