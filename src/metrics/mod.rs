//! Prometheus metrics for job and cluster timings.


use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    /// Wall time from job start to a terminal state, labelled by job kind
    /// and outcome (`succeeded`, `failed`, `timed_out`)
    pub static ref JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "harness_job_duration_seconds",
            "Time from job start until a terminal state was observed"
        )
        .buckets(exponential_buckets(0.1, 2.0, 14).expect("valid buckets")),
        &["kind", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref JOB_POLLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("harness_job_polls_total", "Status requests issued per job kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref CLUSTER_START_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "harness_cluster_start_seconds",
            "Time from first node launch until the cloud size converged"
        )
        .buckets(exponential_buckets(0.25, 2.0, 10).expect("valid buckets"))
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(JOB_DURATION_SECONDS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(JOB_POLLS_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(CLUSTER_START_SECONDS.clone()))
        .expect("collector can be registered");
}

/// Registers the harness metrics with [`REGISTRY`]; safe to call repeatedly
pub fn init_metrics() {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Text exposition of everything in `registry`
pub fn gather_text(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode metrics: {}", e);
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(text) => text,
        Err(e) => {
            error!("metrics could not be from_utf8'd: {}", e);
            String::new()
        }
    }
}

/// Serves `GET /metrics` until `shutdown_signal` fires
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    init_metrics();

    let metrics_route = warp::path!("metrics")
        .map(|| REGISTRY.clone())
        .and_then(metrics_handler);

    info!(port, "serving metrics");
    let (_, server) = warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
        let _ = shutdown_signal.changed().await;
    });
    server.await;
}

async fn metrics_handler(registry: Registry) -> Result<impl Reply, Rejection> {
    Ok(gather_text(&registry))
}
