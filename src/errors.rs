//! Harness Error Hierarchy
//!
//! Errors are grouped by the layer that produced them: cluster startup, remote
//! service calls, local system work (files, helper processes), and
//! configuration.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cloud did not come up (fatal to the test)
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// Network or service-reported failure on a remote operation
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Local infrastructure failures (files, helper processes)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Polling or process budget exhausted
    #[error("Timed out waiting for {what} after {elapsed:?}")]
    Timeout { what: String, elapsed: Duration },

    /// Operation issued against a cluster that was already torn down
    #[error("Cluster has been stopped")]
    ClusterStopped,

    /// Configuration source could not be read or deserialized
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Job parameters rejected before sending
    #[error("Invalid job parameters: {0}")]
    InvalidParams(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to launch node {node}")]
    Spawn {
        node: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Node {node} exited during startup with {status}")]
    ExitedEarly { node: usize, status: ExitStatus },

    /// Nodes never agreed on the expected cloud size
    #[error("Cloud did not converge to {expected} nodes within {waited:?} (last observed sizes: {observed:?})")]
    NotConverged {
        expected: usize,
        observed: Vec<Option<usize>>,
        waited: Duration,
    },

    #[error("Node {node} reports cloud_size {observed}, expected {expected}")]
    Inconsistent {
        node: usize,
        expected: usize,
        observed: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Endpoint unreachable or the request could not be completed
    #[error("Connection to {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Service answered with an `error` field or `error` status
    #[error("{request} failed: {message}")]
    Service { request: String, message: String },

    #[error("{request} returned HTTP {status}: {message}")]
    Http {
        request: String,
        status: u16,
        message: String,
    },

    #[error("Failed to decode {request} response")]
    Decode {
        request: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{request} response is missing `{field}`")]
    MissingField { request: String, field: String },

    /// Job reached the failed state
    #[error("Job {key} failed: {message}")]
    JobFailed { key: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Process {name} exited with {status}")]
    Process { name: String, status: ExitStatus },

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Generator exited cleanly but its output is missing
    #[error("Dataset generator did not produce {0}")]
    Generator(PathBuf),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Io(e))
    }
}

impl Error {
    /// True for transport-level failures, which cluster stabilization treats
    /// as "node not up yet".
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Remote(RemoteError::Connection { .. }))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
