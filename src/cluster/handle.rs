use std::fmt;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::utils::net::base_url;
use crate::Error;
use crate::NodeClient;
use crate::Result;
use crate::Sandbox;
use crate::StartupError;

/// Address of one node's JSON API
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeEndpoint {
    pub host: String,
    pub port: u16,
}

impl NodeEndpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn base_url(&self) -> String {
        base_url(&self.to_string())
    }
}

impl fmt::Display for NodeEndpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStatus {
    Forming,
    Formed,
    Stopped,
}

/// A running cloud and everything needed to talk to it and tear it down.
///
/// Node processes are spawned with `kill_on_drop`, so dropping the handle
/// without calling [`ClusterHandle::stop`] still takes them down.
#[derive(Debug)]
pub struct ClusterHandle {
    cloud_name: String,
    expected: usize,
    clients: Vec<NodeClient>,
    processes: Vec<Option<Child>>,
    status: ClusterStatus,
    sandbox: Sandbox,
    kill_timeout: Duration,
}

impl ClusterHandle {
    pub(crate) fn forming(
        cloud_name: String,
        expected: usize,
        sandbox: Sandbox,
        kill_timeout: Duration,
    ) -> Self {
        Self {
            cloud_name,
            expected,
            clients: Vec::with_capacity(expected),
            processes: Vec::with_capacity(expected),
            status: ClusterStatus::Forming,
            sandbox,
            kill_timeout,
        }
    }

    pub(crate) fn add_node(
        &mut self,
        client: NodeClient,
        process: Option<Child>,
    ) {
        self.clients.push(client);
        self.processes.push(process);
    }

    pub(crate) fn take_processes(&mut self) -> Vec<Option<Child>> {
        std::mem::take(&mut self.processes)
    }

    pub(crate) fn restore_processes(
        &mut self,
        processes: Vec<Option<Child>>,
    ) {
        self.processes = processes;
    }

    pub(crate) fn clients(&self) -> &[NodeClient] {
        &self.clients
    }

    pub(crate) fn mark_formed(&mut self) {
        self.status = ClusterStatus::Formed;
    }

    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    /// Node count the cloud was started with
    pub fn expected_size(&self) -> usize {
        self.expected
    }

    pub fn status(&self) -> ClusterStatus {
        self.status
    }

    pub fn is_alive(&self) -> bool {
        self.status != ClusterStatus::Stopped
    }

    pub fn nodes(&self) -> Vec<&NodeEndpoint> {
        self.clients.iter().map(NodeClient::endpoint).collect()
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Client of the first node, the one remote operations go through
    pub fn client(&self) -> Result<&NodeClient> {
        self.node_client(0)
    }

    pub fn node_client(
        &self,
        index: usize,
    ) -> Result<&NodeClient> {
        if !self.is_alive() {
            return Err(Error::ClusterStopped);
        }
        self.clients
            .get(index)
            .ok_or_else(|| Error::InvalidParams(format!("cluster has no node {index}")))
    }

    /// Asks every node for its view of the cloud and fails if any of them
    /// disagrees with the size the cluster was started with
    pub async fn verify_cloud_size(&self) -> Result<()> {
        if !self.is_alive() {
            return Err(Error::ClusterStopped);
        }
        for (node, client) in self.clients.iter().enumerate() {
            let cloud = client.get_cloud().await?;
            if cloud.cloud_size != self.expected {
                return Err(StartupError::Inconsistent {
                    node,
                    expected: self.expected,
                    observed: cloud.cloud_size,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Kills every node the harness spawned and waits for them to exit.
    ///
    /// Never fails: errors from nodes that are already gone are logged and
    /// ignored. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        if self.status == ClusterStatus::Stopped {
            debug!(cloud = %self.cloud_name, "cluster already stopped");
            return;
        }
        info!(cloud = %self.cloud_name, nodes = self.clients.len(), "stopping cluster");
        for (index, process) in self.processes.iter_mut().enumerate() {
            if let Some(mut child) = process.take() {
                kill_node(index, &mut child, self.kill_timeout).await;
            }
        }
        self.status = ClusterStatus::Stopped;
    }
}

/// Same as [`ClusterHandle::stop`]
pub async fn stop_cluster(cluster: &mut ClusterHandle) {
    cluster.stop().await
}

async fn kill_node(
    index: usize,
    child: &mut Child,
    limit: Duration,
) {
    if let Err(e) = child.start_kill() {
        debug!(index, "node already gone: {:?}", e);
    }
    match timeout(limit, child.wait()).await {
        Ok(Ok(status)) => debug!(index, %status, "node exited"),
        Ok(Err(e)) => warn!(index, "failed to reap node: {:?}", e),
        Err(_) => warn!(index, ?limit, "node did not exit in time"),
    }
}
