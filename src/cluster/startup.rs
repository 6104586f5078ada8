use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use tokio::process::Child;
use tokio::time::Instant;
use tracing::error;
use tracing::info;

use crate::metrics::CLUSTER_START_SECONDS;
use crate::params::generate_key;
use crate::poll_until;
use crate::ClusterConfig;
use crate::ClusterHandle;
use crate::Error;
use crate::HarnessConfig;
use crate::LocalLauncher;
use crate::NodeClient;
use crate::NodeEndpoint;
use crate::NodeLauncher;
use crate::NodeSpec;
use crate::PollPolicy;
use crate::RemoteError;
use crate::Result;
use crate::Sandbox;
use crate::SshLauncher;
use crate::StartupError;

/// Starts `node_count` nodes, locally when `cluster.hosts` is empty and over
/// SSH otherwise, and waits for them to form one cloud
pub async fn start_cluster(
    node_count: usize,
    config: &HarnessConfig,
) -> Result<ClusterHandle> {
    let command = config.cluster.node_command.clone();
    let launcher: Arc<dyn NodeLauncher> = if config.cluster.hosts.is_empty() {
        Arc::new(LocalLauncher::new(command))
    } else {
        Arc::new(SshLauncher::new(command))
    };
    start_cluster_with_launcher(node_count, config, launcher).await
}

/// Starts `nodes_per_host` nodes on every configured host
pub async fn start_cluster_with_hosts(config: &HarnessConfig) -> Result<ClusterHandle> {
    if config.cluster.hosts.is_empty() {
        return Err(Error::InvalidConfig("cluster.hosts is empty".into()));
    }
    let node_count = config.cluster.hosts.len() * config.cluster.nodes_per_host;
    let launcher = Arc::new(SshLauncher::new(config.cluster.node_command.clone()));
    start_cluster_with_launcher(node_count, config, launcher).await
}

/// Launches every node through `launcher` and polls until each of them
/// reports `cloud_size == node_count`.
///
/// On any failure the nodes launched so far are stopped before the error is
/// returned; their logs stay in the sandbox.
pub async fn start_cluster_with_launcher(
    node_count: usize,
    config: &HarnessConfig,
    launcher: Arc<dyn NodeLauncher>,
) -> Result<ClusterHandle> {
    if node_count == 0 {
        return Err(Error::InvalidConfig("node_count must be at least 1".into()));
    }
    let started = Instant::now();

    let sandbox = Sandbox::new(&config.sandbox);
    sandbox.prepare(config.sandbox.clean_on_start).await?;

    let cloud_name = config
        .cluster
        .cloud_name
        .clone()
        .unwrap_or_else(|| generate_key("harness"));
    let specs = plan_nodes(node_count, &config.cluster, &cloud_name)?;
    info!(cloud = %cloud_name, node_count, "starting cluster");

    let mut handle = ClusterHandle::forming(cloud_name, node_count, sandbox, config.cluster.kill_timeout());
    if let Err(e) = launch_nodes(&mut handle, &specs, config, launcher.as_ref()) {
        handle.stop().await;
        return Err(e);
    }

    let policy = PollPolicy::new(config.cluster.startup_timeout(), config.cluster.stabilize_interval());
    let processes = Mutex::new(handle.take_processes());
    let outcome = wait_for_cloud(handle.clients(), &processes, node_count, policy).await;
    handle.restore_processes(processes.into_inner().unwrap_or_else(PoisonError::into_inner));

    match outcome {
        Ok(()) => {
            handle.mark_formed();
            let elapsed = started.elapsed();
            CLUSTER_START_SECONDS.observe(elapsed.as_secs_f64());
            info!(cloud = %handle.cloud_name(), node_count, ?elapsed, "cluster formed");
            Ok(handle)
        }
        Err(e) => {
            error!(cloud = %handle.cloud_name(), "cluster failed to form: {}", e);
            handle.stop().await;
            Err(e)
        }
    }
}

/// Node layout: `base_port + i * port_step` on the local host, or
/// `nodes_per_host` consecutive slots on each remote host
pub fn plan_nodes(
    node_count: usize,
    config: &ClusterConfig,
    cloud_name: &str,
) -> Result<Vec<NodeSpec>> {
    let per_host = if config.hosts.is_empty() {
        node_count
    } else {
        config.nodes_per_host
    };
    if per_host == 0 {
        return Err(Error::InvalidConfig("nodes_per_host must be at least 1".into()));
    }
    if !config.hosts.is_empty() && node_count > config.hosts.len() * per_host {
        return Err(Error::InvalidConfig(format!(
            "{node_count} nodes requested but {} hosts with {per_host} nodes each are configured",
            config.hosts.len()
        )));
    }
    if config.last_port(per_host.min(node_count)).is_none() {
        return Err(Error::InvalidConfig(format!(
            "{node_count} nodes from port {} in steps of {} exceed the port range",
            config.base_port, config.port_step
        )));
    }

    let specs = (0..node_count)
        .map(|index| {
            let slot = index % per_host;
            let port = config.base_port + (slot as u16) * config.port_step;
            let (host, ssh_user) = match config.hosts.get(index / per_host) {
                Some(host) => (
                    host.address.clone(),
                    host.ssh_user.clone().or_else(|| config.ssh_user.clone()),
                ),
                None => (config.host.clone(), None),
            };
            NodeSpec {
                index,
                host,
                port,
                cloud_name: cloud_name.to_string(),
                ssh_user,
            }
        })
        .collect();
    Ok(specs)
}

fn launch_nodes(
    handle: &mut ClusterHandle,
    specs: &[NodeSpec],
    config: &HarnessConfig,
    launcher: &dyn NodeLauncher,
) -> Result<()> {
    for spec in specs {
        let endpoint = NodeEndpoint::new(spec.host.clone(), spec.port);
        let client = NodeClient::new(endpoint, &config.http)?;
        let logs = handle.sandbox().node_logs(spec.index);
        let process = launcher.launch(spec, &logs)?;
        info!(index = spec.index, host = %spec.host, port = spec.port, spawned = process.is_some(), "node launched");
        handle.add_node(client, process);
    }
    Ok(())
}

async fn wait_for_cloud(
    clients: &[NodeClient],
    processes: &Mutex<Vec<Option<Child>>>,
    expected: usize,
    policy: PollPolicy,
) -> Result<()> {
    let observed: Mutex<Vec<Option<usize>>> = Mutex::new(vec![None; clients.len()]);
    let observed_ref = &observed;

    let outcome = poll_until(policy, "cloud formation", || async move {
        check_processes(processes)?;

        let mut formed = true;
        let mut sizes = Vec::with_capacity(clients.len());
        for client in clients {
            match client.get_cloud().await {
                Ok(cloud) => {
                    formed &= cloud.is_formed(expected);
                    sizes.push(Some(cloud.cloud_size));
                }
                // not listening yet, or still booting
                Err(e) if is_not_up_yet(&e) => {
                    formed = false;
                    sizes.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        *observed_ref.lock().unwrap_or_else(PoisonError::into_inner) = sizes;
        Ok(formed.then_some(()))
    })
    .await;

    match outcome {
        Err(Error::Timeout { elapsed, .. }) => Err(StartupError::NotConverged {
            expected,
            observed: observed.into_inner().unwrap_or_else(PoisonError::into_inner),
            waited: elapsed,
        }
        .into()),
        other => other,
    }
}

fn check_processes(processes: &Mutex<Vec<Option<Child>>>) -> Result<()> {
    let mut processes = processes.lock().unwrap_or_else(PoisonError::into_inner);
    for (node, process) in processes.iter_mut().enumerate() {
        if let Some(child) = process {
            if let Some(status) = child.try_wait()? {
                return Err(StartupError::ExitedEarly { node, status }.into());
            }
        }
    }
    Ok(())
}

fn is_not_up_yet(e: &Error) -> bool {
    e.is_connection() || matches!(e, Error::Remote(RemoteError::Http { status, .. }) if *status >= 500)
}
