//! Upload, parse and train compositions shared by tests and the CLI.
//!
//! Every step goes through the cluster's first node and waits with the
//! given [`PollPolicy`]; the first failing step aborts the chain.

use std::path::Path;

use tracing::info;
use tracing::warn;

use crate::await_completion;
use crate::start_job;
use crate::upload_file;
use crate::ClusterHandle;
use crate::DatasetRef;
use crate::GlmParams;
use crate::JobParams;
use crate::JobResult;
use crate::ParseParams;
use crate::PollPolicy;
use crate::Result;
use crate::RfParams;

/// Uploads `path`, parses it and returns the parsed dataset
pub async fn parse_file(
    cluster: &ClusterHandle,
    path: impl AsRef<Path>,
    params: &ParseParams,
    policy: PollPolicy,
) -> Result<DatasetRef> {
    let raw = upload_file(cluster, path).await?;
    let mut job = start_job(cluster, &raw, &JobParams::Parse(params.clone())).await?;
    await_completion(cluster, &mut job, policy).await?;
    info!(source = %raw, parsed = job.key(), "dataset parsed");
    Ok(DatasetRef::new(job.key()))
}

/// Trains a Random Forest on an already parsed dataset
pub async fn run_rf_only(
    cluster: &ClusterHandle,
    parsed: &DatasetRef,
    params: &RfParams,
    policy: PollPolicy,
) -> Result<JobResult> {
    let mut job = start_job(cluster, parsed, &JobParams::RandomForest(params.clone())).await?;
    let result = await_completion(cluster, &mut job, policy).await?;
    log_result_errors(job.key(), &result);
    Ok(result)
}

/// Uploads and parses `path`, then trains a Random Forest on it
pub async fn run_rf(
    cluster: &ClusterHandle,
    path: impl AsRef<Path>,
    params: &RfParams,
    policy: PollPolicy,
) -> Result<JobResult> {
    let parsed = parse_file(cluster, path, &ParseParams::default(), policy).await?;
    run_rf_only(cluster, &parsed, params, policy).await
}

pub async fn run_glm_only(
    cluster: &ClusterHandle,
    parsed: &DatasetRef,
    params: &GlmParams,
    policy: PollPolicy,
) -> Result<JobResult> {
    let mut job = start_job(cluster, parsed, &JobParams::Glm(params.clone())).await?;
    let result = await_completion(cluster, &mut job, policy).await?;
    log_result_errors(job.key(), &result);
    Ok(result)
}

fn log_result_errors(
    key: &str,
    result: &JobResult,
) {
    for error in result.errors() {
        warn!(key, "result carries error field: {}", error);
    }
}
