//! Cluster Configuration Module
//!
//! Provides configuration loading for the cluster routing layer.
//! Supports loading from TOML files with environment-specific overrides and
//! `CLUSTER_`-prefixed environment variables.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Remote invoker registry timings
    pub registry: RegistrySettings,

    /// Tracing output
    pub logging: LoggingSettings,
}

/// Timings that drive the remote invoker registry
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RegistrySettings {
    pub refresh_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub metadata_timeout_ms: u64,
    pub total_refresh_timeout_ms: u64,
    pub report_interval_ms: u64,

    /// Passed to each invoker's `start`; `None` leaves it to the invoker
    pub connect_timeout_ms: Option<u64>,
}

/// Tracing subscriber settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: defaults::registry::REFRESH_INTERVAL_MS,
            shutdown_timeout_ms: defaults::registry::SHUTDOWN_TIMEOUT_MS,
            metadata_timeout_ms: defaults::registry::METADATA_TIMEOUT_MS,
            total_refresh_timeout_ms: defaults::registry::TOTAL_REFRESH_TIMEOUT_MS,
            report_interval_ms: defaults::registry::REPORT_INTERVAL_MS,
            connect_timeout_ms: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::logging::LEVEL.to_string(),
            json: false,
        }
    }
}

impl RegistrySettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn total_refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.total_refresh_timeout_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings the registry cannot run with
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("refresh_interval_ms", self.refresh_interval_ms),
            ("shutdown_timeout_ms", self.shutdown_timeout_ms),
            ("metadata_timeout_ms", self.metadata_timeout_ms),
            ("total_refresh_timeout_ms", self.total_refresh_timeout_ms),
            ("report_interval_ms", self.report_interval_ms),
        ];

        for (field, value) in required {
            if value == 0 {
                bail!("registry.{} must be greater than zero", field);
            }
        }

        if self.metadata_timeout_ms > self.total_refresh_timeout_ms {
            bail!(
                "registry.metadata_timeout_ms ({}) exceeds registry.total_refresh_timeout_ms ({})",
                self.metadata_timeout_ms,
                self.total_refresh_timeout_ms
            );
        }

        if self.total_refresh_timeout_ms > self.refresh_interval_ms {
            warn!(
                total_refresh_timeout_ms = self.total_refresh_timeout_ms,
                refresh_interval_ms = self.refresh_interval_ms,
                "Refresh may take longer than the refresh interval"
            );
        }

        Ok(())
    }
}

impl ClusterConfig {
    /// Load configuration from files with environment overrides
    ///
    /// Sources, lowest precedence first:
    /// 1. `base_path` (or `config/cluster.toml`, optional when defaulted)
    /// 2. `environments/{environment}.toml` next to the base file
    /// 3. `CLUSTER_`-prefixed variables, `__` separating nested keys
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let (base, required) = match base_path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(defaults::CONFIG_FILE), false),
        };

        let mut builder = Config::builder().add_source(File::from(base.as_path()).required(required));

        if let Some(env) = environment {
            let env_file = base
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ClusterConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        debug!(?config, "Loaded cluster configuration");
        Ok(config)
    }

    /// Parse a TOML document directly, without file or environment layering
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClusterConfig =
            toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    pub fn validate(&self) -> Result<()> {
        self.registry.validate().context("Invalid registry settings")
    }
}

/// Convenience function to load configuration with defaults
pub fn load_config(environment: Option<&str>) -> Result<ClusterConfig> {
    ClusterConfig::load(None, environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::default();

        assert_eq!(config.registry.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.registry.shutdown_timeout(), Duration::from_secs(60));
        assert_eq!(config.registry.metadata_timeout(), Duration::from_secs(1));
        assert_eq!(config.registry.total_refresh_timeout(), Duration::from_secs(3));
        assert_eq!(config.registry.report_interval(), Duration::from_secs(15));
        assert_eq!(config.registry.connect_timeout(), None);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_base_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("cluster.toml");

        let config_content = r#"
[registry]
refresh_interval_ms = 2000
connect_timeout_ms = 250

[logging]
level = "debug"
json = true
"#;

        fs::write(&config_path, config_content).unwrap();

        let config = ClusterConfig::load(Some(&config_path), None).unwrap();

        assert_eq!(config.registry.refresh_interval_ms, 2000);
        assert_eq!(config.registry.connect_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.registry.metadata_timeout_ms, 1000);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_environment_override() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("cluster.toml");
        fs::write(&config_path, "[registry]\nshutdown_timeout_ms = 10000\n").unwrap();

        let env_dir = dir.path().join("environments");
        fs::create_dir(&env_dir).unwrap();
        fs::write(
            env_dir.join("staging.toml"),
            "[registry]\nshutdown_timeout_ms = 500\n",
        )
        .unwrap();

        let staging = ClusterConfig::load(Some(&config_path), Some("staging")).unwrap();
        assert_eq!(staging.registry.shutdown_timeout_ms, 500);

        let missing = ClusterConfig::load(Some(&config_path), Some("absent")).unwrap();
        assert_eq!(missing.registry.shutdown_timeout_ms, 10000);
    }

    #[test]
    fn test_environment_variable_override() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("cluster.toml");
        fs::write(&config_path, "[registry]\nreport_interval_ms = 9000\n").unwrap();

        std::env::set_var("CLUSTER_REGISTRY__REPORT_INTERVAL_MS", "1234");
        let config = ClusterConfig::load(Some(&config_path), None);
        std::env::remove_var("CLUSTER_REGISTRY__REPORT_INTERVAL_MS");

        assert_eq!(config.unwrap().registry.report_interval_ms, 1234);
    }

    #[test]
    fn test_missing_required_file() {
        let dir = tempdir().unwrap();
        let result = ClusterConfig::load(Some(&dir.path().join("nope.toml")), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_failures() {
        let zero = ClusterConfig::from_toml_str("[registry]\nrefresh_interval_ms = 0\n");
        assert!(zero.is_err());

        let inverted = ClusterConfig::from_toml_str(
            "[registry]\nmetadata_timeout_ms = 5000\ntotal_refresh_timeout_ms = 1000\n",
        );
        assert!(inverted.is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = ClusterConfig::default();
        config.registry.connect_timeout_ms = Some(750);

        let rendered = config.to_toml_string().unwrap();
        assert_eq!(ClusterConfig::from_toml_str(&rendered).unwrap(), config);
    }
}
