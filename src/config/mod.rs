//! Configuration management for the test harness.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file named by `CONFIG_PATH`
//! - Environment variable overrides (`H2O__SECTION__FIELD`)
//! - Section-wise validation
mod cluster;
mod datasets;
mod http;
mod monitoring;
mod polling;
mod sandbox;
pub use cluster::*;
pub use datasets::*;
pub use http::*;
pub use monitoring::*;
pub use polling::*;
pub use sandbox::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Main configuration container for the harness
///
/// Combines all section configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HarnessConfig {
    /// Node launch and cloud formation
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// HTTP client timeouts
    #[serde(default)]
    pub http: HttpConfig,
    /// Default job polling budget
    #[serde(default)]
    pub polling: PollingConfig,
    /// Log sandbox
    #[serde(default)]
    pub sandbox: SandboxConfig,
    /// Dataset lookup and synthetic generation
    #[serde(default)]
    pub datasets: DatasetConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl HarnessConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in order (later overrides earlier):
    /// 1. Type defaults
    /// 2. File from `CONFIG_PATH` (if set)
    /// 3. Environment variables with `H2O__` prefix
    ///
    /// # Example
    /// ```ignore
    /// std::env::set_var("H2O__CLUSTER__BASE_PORT", "54400");
    /// let cfg = HarnessConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from file without validation.
    ///
    /// Merging order:
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.cluster.validate()?;
        self.http.validate()?;
        self.polling.validate()?;
        self.sandbox.validate()?;
        self.datasets.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("H2O")
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("cluster.node_command")
        .with_list_parse_key("sandbox.error_patterns")
        .with_list_parse_key("sandbox.ignore_patterns")
}
