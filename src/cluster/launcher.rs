use std::process::Stdio;

#[cfg(test)]
use mockall::automock;
use tokio::process::Child;
use tokio::process::Command;
use tracing::debug;

use crate::Error;
use crate::ProcessLogs;
use crate::Result;
use crate::StartupError;

/// Where and as what one node of the cloud is started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub index: usize,
    pub host: String,
    pub port: u16,
    pub cloud_name: String,
    /// Login for remote hosts
    pub ssh_user: Option<String>,
}

/// Fills `{cloud_name}`, `{host}`, `{port}` and `{index}` in every item of
/// `template`
pub fn expand_command(
    template: &[String],
    spec: &NodeSpec,
) -> Vec<String> {
    template
        .iter()
        .map(|item| {
            item.replace("{cloud_name}", &spec.cloud_name)
                .replace("{host}", &spec.host)
                .replace("{port}", &spec.port.to_string())
                .replace("{index}", &spec.index.to_string())
        })
        .collect()
}

/// Starts node processes.
///
/// Returning `Ok(None)` means the node is not owned by the harness (already
/// running elsewhere); the cluster will wait for it but never kill it.
#[cfg_attr(test, automock)]
pub trait NodeLauncher: Send + Sync {
    fn launch(
        &self,
        spec: &NodeSpec,
        logs: &ProcessLogs,
    ) -> Result<Option<Child>>;
}

/// Runs the node command on this machine
#[derive(Debug, Clone)]
pub struct LocalLauncher {
    command: Vec<String>,
}

impl LocalLauncher {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl NodeLauncher for LocalLauncher {
    fn launch(
        &self,
        spec: &NodeSpec,
        logs: &ProcessLogs,
    ) -> Result<Option<Child>> {
        let argv = expand_command(&self.command, spec);
        spawn_node(spec.index, &argv, logs).map(Some)
    }
}

/// Runs the node command on `spec.host` through a non-interactive `ssh`
#[derive(Debug, Clone)]
pub struct SshLauncher {
    command: Vec<String>,
}

impl SshLauncher {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// `ssh -o BatchMode=yes [user@]host <node command>`
    pub fn ssh_argv(
        &self,
        spec: &NodeSpec,
    ) -> Vec<String> {
        let target = match &spec.ssh_user {
            Some(user) => format!("{user}@{}", spec.host),
            None => spec.host.clone(),
        };
        vec![
            "ssh".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            target,
            expand_command(&self.command, spec).join(" "),
        ]
    }
}

impl NodeLauncher for SshLauncher {
    fn launch(
        &self,
        spec: &NodeSpec,
        logs: &ProcessLogs,
    ) -> Result<Option<Child>> {
        spawn_node(spec.index, &self.ssh_argv(spec), logs).map(Some)
    }
}

/// For nodes that are already up; launches nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachedLauncher;

impl NodeLauncher for AttachedLauncher {
    fn launch(
        &self,
        spec: &NodeSpec,
        _logs: &ProcessLogs,
    ) -> Result<Option<Child>> {
        debug!(index = spec.index, host = %spec.host, port = spec.port, "attaching to running node");
        Ok(None)
    }
}

fn spawn_node(
    index: usize,
    argv: &[String],
    logs: &ProcessLogs,
) -> Result<Child> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| Error::InvalidConfig("node command is empty".into()))?;

    debug!(index, ?argv, "launching node");
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(logs.open_stdout()?))
        .stderr(Stdio::from(logs.open_stderr()?))
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| StartupError::Spawn { node: index, source }.into())
}
