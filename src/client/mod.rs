//! Remote operations against the service's JSON API.
//!
//! [`NodeClient`] talks to one node. The free functions take a
//! [`ClusterHandle`] and route through its first node, so a stopped cluster
//! is rejected before anything goes on the wire.

mod cloud;
mod envelope;
mod job;
mod node;
pub use cloud::*;
pub use job::*;
pub use node::*;


use std::path::Path;

use tracing::info;

use crate::ClusterHandle;
use crate::DatasetRef;
use crate::JobParams;
use crate::PollPolicy;
use crate::Poller;
use crate::Result;

/// Uploads `path` through the cluster's first node
pub async fn upload_file(
    cluster: &ClusterHandle,
    path: impl AsRef<Path>,
) -> Result<DatasetRef> {
    cluster.client()?.upload_file(path).await
}

/// Validates `params` and starts the job on the cluster's first node
pub async fn start_job(
    cluster: &ClusterHandle,
    data: &DatasetRef,
    params: &JobParams,
) -> Result<JobHandle> {
    let job = cluster.client()?.start_job(data, params).await?;
    info!(kind = job.kind().as_str(), key = job.key(), "job submitted");
    Ok(job)
}

/// Polls `job` until it reaches a terminal state or `policy.timeout` elapses.
///
/// The shared borrow of `cluster` keeps it from being stopped while the job
/// is polled.
pub async fn await_completion(
    cluster: &ClusterHandle,
    job: &mut JobHandle,
    policy: PollPolicy,
) -> Result<JobResult> {
    let client = cluster.client()?;
    Poller::new(policy).await_completion(client, job).await
}
