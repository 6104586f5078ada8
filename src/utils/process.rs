//! Blocking execution of external helper commands.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::Error;
use crate::Result;
use crate::Sandbox;
use crate::SystemError;

/// Runs `argv` to completion with stdout/stderr captured in the sandbox as
/// `<name>.stdout.log` / `<name>.stderr.log`.
///
/// Fails with `SystemError::Process` on a non-zero exit and with
/// `Error::Timeout` (after killing the child) when `limit` elapses first.
pub async fn spawn_cmd_and_wait(
    name: &str,
    argv: &[String],
    working_dir: Option<&Path>,
    limit: Duration,
    sandbox: &Sandbox,
) -> Result<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| Error::InvalidConfig(format!("empty command line for {name}")))?;

    let logs = sandbox.logs_for(name);
    let stdout = logs.open_stdout()?;
    let stderr = logs.open_stderr()?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    debug!(name, ?argv, ?working_dir, "spawning");
    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|source| SystemError::PathError {
        path: program.into(),
        source,
    })?;

    match timeout(limit, child.wait()).await {
        Ok(Ok(status)) if status.success() => {
            debug!(name, elapsed = ?started.elapsed(), "finished");
            Ok(())
        }
        Ok(Ok(status)) => Err(SystemError::Process {
            name: name.to_string(),
            status,
        }
        .into()),
        Ok(Err(e)) => Err(SystemError::Io(e).into()),
        Err(_) => {
            warn!(name, ?limit, "timed out, killing");
            if let Err(e) = child.kill().await {
                warn!(name, "kill after timeout failed: {:?}", e);
            }
            Err(Error::Timeout {
                what: format!("process {name}"),
                elapsed: started.elapsed(),
            })
        }
    }
}
