use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// A remote machine that hosts one or more nodes of the cloud
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub address: String,

    /// Overrides `ClusterConfig::ssh_user` for this host
    #[serde(default)]
    pub ssh_user: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Shared cloud name; a random one is generated per cluster when unset
    #[serde(default)]
    pub cloud_name: Option<String>,

    /// Node command template. Items may contain `{cloud_name}`, `{host}`,
    /// `{port}` and `{index}`.
    #[serde(default = "default_node_command")]
    pub node_command: Vec<String>,

    /// Bind address for locally launched nodes
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Each node occupies `port` and `port + 1`, hence the default step of 2
    #[serde(default = "default_port_step")]
    pub port_step: u16,

    /// Remote hosts; empty means every node runs locally
    #[serde(default)]
    pub hosts: Vec<HostConfig>,

    #[serde(default = "default_nodes_per_host")]
    pub nodes_per_host: usize,

    #[serde(default)]
    pub ssh_user: Option<String>,

    /// Upper bound on waiting for `cloud_size` agreement (unit: milliseconds)
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    #[serde(default = "default_stabilize_interval_ms")]
    pub stabilize_interval_ms: u64,

    /// How long teardown waits for a killed node to be reaped
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            node_command: default_node_command(),
            host: default_host(),
            base_port: default_base_port(),
            port_step: default_port_step(),
            hosts: vec![],
            nodes_per_host: default_nodes_per_host(),
            ssh_user: None,
            startup_timeout_ms: default_startup_timeout_ms(),
            stabilize_interval_ms: default_stabilize_interval_ms(),
            kill_timeout_ms: default_kill_timeout_ms(),
        }
    }
}

impl ClusterConfig {
    /// Validates cluster configuration consistency
    /// # Errors
    /// Returns `Error::InvalidConfig` if any configuration rules are violated
    pub fn validate(&self) -> Result<()> {
        if self.node_command.is_empty() || self.node_command[0].trim().is_empty() {
            return Err(Error::InvalidConfig(
                "node_command must name an executable".into(),
            ));
        }

        if self.base_port == 0 {
            return Err(Error::InvalidConfig("base_port cannot be 0".into()));
        }

        if self.port_step == 0 {
            return Err(Error::InvalidConfig(
                "port_step must be at least 1".into(),
            ));
        }

        if self.nodes_per_host == 0 {
            return Err(Error::InvalidConfig(
                "nodes_per_host must be at least 1".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for host in &self.hosts {
            if host.address.trim().is_empty() {
                return Err(Error::InvalidConfig("host address cannot be empty".into()));
            }
            if !seen.insert(host.address.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate host {} in hosts",
                    host.address
                )));
            }
        }

        if self.stabilize_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "stabilize_interval_ms must be > 0".into(),
            ));
        }

        if self.startup_timeout_ms < self.stabilize_interval_ms {
            return Err(Error::InvalidConfig(format!(
                "startup_timeout_ms {} is shorter than stabilize_interval_ms {}",
                self.startup_timeout_ms, self.stabilize_interval_ms
            )));
        }

        Ok(())
    }

    /// Highest port a cluster of `node_count` nodes would use, if it fits
    pub fn last_port(
        &self,
        node_count: usize,
    ) -> Option<u16> {
        let span = (node_count.checked_sub(1)? as u64) * self.port_step as u64;
        let last = self.base_port as u64 + span;
        u16::try_from(last).ok()
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn stabilize_interval(&self) -> Duration {
        Duration::from_millis(self.stabilize_interval_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}

fn default_node_command() -> Vec<String> {
    [
        "java",
        "-Xmx1g",
        "-jar",
        "build/h2o.jar",
        "-name",
        "{cloud_name}",
        "-ip",
        "{host}",
        "-port",
        "{port}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_base_port() -> u16 {
    54321
}
fn default_port_step() -> u16 {
    2
}
fn default_nodes_per_host() -> usize {
    1
}
fn default_startup_timeout_ms() -> u64 {
    20_000
}
fn default_stabilize_interval_ms() -> u64 {
    500
}
fn default_kill_timeout_ms() -> u64 {
    5_000
}
