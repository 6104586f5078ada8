//! Bounded polling of asynchronous remote work.
//!
//! [`poll_until`] is the single retry loop of the crate: cluster
//! stabilization and job completion are both expressed through it.
//! [`Poller`] drives a [`JobHandle`] through its state machine on top of it.


use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::metrics::JOB_DURATION_SECONDS;
use crate::metrics::JOB_POLLS_TOTAL;
use crate::Error;
use crate::JobHandle;
use crate::JobResult;
use crate::JobState;
use crate::JobStatus;
use crate::RemoteError;
use crate::Result;

/// How long to keep asking, and how often
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self { timeout, interval }
    }

    pub fn from_secs(
        timeout_secs: u64,
        interval_secs: u64,
    ) -> Self {
        Self::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(interval_secs),
        )
    }
}

/// Calls `attempt` until it yields `Some`, sleeping `policy.interval` between
/// calls.
///
/// Errors from `attempt` are returned immediately; callers that want to
/// tolerate some errors map them to `Ok(None)` themselves. Once
/// `policy.timeout` has elapsed without a value the call fails with
/// [`Error::Timeout`]. The last sleep is clipped to the remaining budget and
/// every attempt is cut off at `timeout + interval` from the start, so a
/// stalled attempt cannot stretch the total wait past that bound.
pub async fn poll_until<T, F, Fut>(
    policy: PollPolicy,
    what: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let deadline = policy.timeout + policy.interval;
    let mut attempts = 0u64;
    loop {
        attempts += 1;
        let remaining = deadline.saturating_sub(started.elapsed());
        let outcome = match timeout(remaining, attempt()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let elapsed = started.elapsed();
                warn!(what, attempts, ?elapsed, "attempt stalled past poll budget");
                return Err(Error::Timeout {
                    what: what.to_string(),
                    elapsed,
                });
            }
        };
        if let Some(value) = outcome? {
            debug!(what, attempts, elapsed = ?started.elapsed(), "poll finished");
            return Ok(value);
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            warn!(what, attempts, ?elapsed, "poll budget exhausted");
            return Err(Error::Timeout {
                what: what.to_string(),
                elapsed,
            });
        }

        sleep(policy.interval.min(policy.timeout - elapsed)).await;
    }
}

/// Source of job status observations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn job_status(
        &self,
        job: &JobHandle,
    ) -> Result<JobStatus>;
}

/// Drives a [`JobHandle`] to a terminal state
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    policy: PollPolicy,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Polls `source` until `job` succeeds, fails or the budget runs out.
    ///
    /// Returns as soon as the first terminal status is observed. A job whose
    /// start request already carried the result is returned without polling.
    pub async fn await_completion<S>(
        &self,
        source: &S,
        job: &mut JobHandle,
    ) -> Result<JobResult>
    where
        S: JobStatusSource + ?Sized,
    {
        if let Some(result) = job.result() {
            return Ok(result.clone());
        }
        if job.state().is_terminal() {
            return Err(Error::InvalidParams(format!(
                "job {} is already {:?}",
                job.key(),
                job.state()
            )));
        }

        let kind = job.kind().as_str();
        let what = format!("{} job {}", kind, job.key());
        let started = Instant::now();
        let saw_running = AtomicBool::new(false);

        let outcome = {
            let request: &JobHandle = job;
            let saw_running = &saw_running;
            poll_until(self.policy, &what, || async move {
                JOB_POLLS_TOTAL.with_label_values(&[kind]).inc();
                match source.job_status(request).await? {
                    JobStatus::Pending => Ok(None),
                    JobStatus::Running { progress, total } => {
                        saw_running.store(true, Ordering::Relaxed);
                        debug!(key = request.key(), progress, total, "job running");
                        Ok(None)
                    }
                    JobStatus::Succeeded(result) => Ok(Some(Ok(result))),
                    JobStatus::Failed(message) => Ok(Some(Err(message))),
                }
            })
            .await
        };

        if saw_running.load(Ordering::Relaxed) {
            job.advance(JobState::Running);
        }
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(Ok(result)) => {
                job.advance(JobState::Succeeded);
                JOB_DURATION_SECONDS
                    .with_label_values(&[kind, "succeeded"])
                    .observe(elapsed);
                Ok(result)
            }
            Ok(Err(message)) => {
                job.advance(JobState::Failed);
                JOB_DURATION_SECONDS
                    .with_label_values(&[kind, "failed"])
                    .observe(elapsed);
                Err(RemoteError::JobFailed {
                    key: job.key().to_string(),
                    message,
                }
                .into())
            }
            Err(e) => {
                if e.is_timeout() {
                    job.advance(JobState::TimedOut);
                    JOB_DURATION_SECONDS
                        .with_label_values(&[kind, "timed_out"])
                        .observe(elapsed);
                }
                Err(e)
            }
        }
    }
}
