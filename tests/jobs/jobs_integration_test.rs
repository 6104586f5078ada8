use std::time::Duration;

use h2o_harness::await_completion;
use h2o_harness::parse_file;
use h2o_harness::run_glm_only;
use h2o_harness::run_rf;
use h2o_harness::run_rf_only;
use h2o_harness::start_cluster;
use h2o_harness::start_job;
use h2o_harness::upload_file;
use h2o_harness::DatasetRef;
use h2o_harness::Error;
use h2o_harness::Family;
use h2o_harness::GlmParams;
use h2o_harness::JobParams;
use h2o_harness::JobState;
use h2o_harness::ParseParams;
use h2o_harness::PollPolicy;
use h2o_harness::RemoteError;
use h2o_harness::RfParams;
use tokio::time::Instant;

use crate::common::case_config;
use crate::common::reset;
use crate::common::write_iris_like_csv;
use crate::common::MockCloud;
use crate::common::WAIT_FOR_JOB_IN_SEC;
use crate::CLUSTER_PORT_BASE;

fn job_policy() -> PollPolicy {
    PollPolicy::new(Duration::from_secs(WAIT_FOR_JOB_IN_SEC), Duration::from_millis(200))
}

/// Case 1: upload a 100 row CSV, train 6 trees, get an error-free result
/// well within the budget
#[tokio::test]
async fn test_rf_on_small_csv_case1() {
    crate::enable_logger();
    let case_dir = reset("jobs/case1").await;
    let base_port = CLUSTER_PORT_BASE + 110;
    let mock = MockCloud::start(1, base_port);
    let csv = write_iris_like_csv(&case_dir.join("data"), "iris2.csv", 100);

    let config = case_config(&case_dir.join("sandbox"), base_port);
    let mut cluster = start_cluster(1, &config).await.expect("cloud should form");

    let params = RfParams {
        model_key: Some("iris2".to_string()),
        ..RfParams::with_trees(6)
    };
    let started = Instant::now();
    let result = run_rf(&cluster, &csv, &params, job_policy()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(WAIT_FOR_JOB_IN_SEC));
    assert_eq!(result.get_f64("trees.number_built"), Some(6.0));
    assert_eq!(result.get_str("model_key"), Some("iris2"));
    assert!(!result.has_errors(), "errors: {:?}", result.errors());
    assert!(cluster.sandbox().check_for_errors().await.unwrap().is_empty());

    cluster.stop().await;
    mock.shutdown().await;
}

/// Case 2: parse once, then train repeatedly on the parsed key
#[tokio::test]
async fn test_rf_only_on_parsed_key_case2() {
    crate::enable_logger();
    let case_dir = reset("jobs/case2").await;
    let base_port = CLUSTER_PORT_BASE + 120;
    let mock = MockCloud::start(1, base_port);
    let csv = write_iris_like_csv(&case_dir.join("data"), "poker100.csv", 100);

    let config = case_config(&case_dir.join("sandbox"), base_port);
    let mut cluster = start_cluster(1, &config).await.expect("cloud should form");

    let parsed = parse_file(&cluster, &csv, &ParseParams::default(), job_policy())
        .await
        .unwrap();
    assert_eq!(parsed, DatasetRef::new("poker100.csv.hex"));

    for trees in [1, 3, 5] {
        let result = run_rf_only(&cluster, &parsed, &RfParams::with_trees(trees), job_policy())
            .await
            .unwrap();
        assert_eq!(result.get_f64("trees.number_built"), Some(trees as f64));
    }

    cluster.stop().await;
    mock.shutdown().await;
}

/// Case 3: GLM answers synchronously
#[tokio::test]
async fn test_glm_returns_coefficients_case3() {
    crate::enable_logger();
    let case_dir = reset("jobs/case3").await;
    let base_port = CLUSTER_PORT_BASE + 130;
    let mock = MockCloud::start(1, base_port);
    let csv = write_iris_like_csv(&case_dir.join("data"), "benign.csv", 100);

    let config = case_config(&case_dir.join("sandbox"), base_port);
    let mut cluster = start_cluster(1, &config).await.expect("cloud should form");

    let parsed = parse_file(&cluster, &csv, &ParseParams::default(), job_policy())
        .await
        .unwrap();
    let mut params = GlmParams::new(3);
    params.family = Family::Binomial;
    params.xval = Some(2);
    let result = run_glm_only(&cluster, &parsed, &params, job_policy()).await.unwrap();

    assert_eq!(result.get_str("GLMModel.family"), Some("binomial"));
    assert_eq!(result.get_f64("GLMModel.validations.0.err"), Some(0.125));
    assert!(result.get("GLMModel.coefficients.Intercept").is_some());

    cluster.stop().await;
    mock.shutdown().await;
}

/// Case 4: a job that never finishes times out after 5s and leaves the
/// cluster usable
#[tokio::test]
async fn test_polling_timeout_case4() {
    crate::enable_logger();
    let case_dir = reset("jobs/case4").await;
    let base_port = CLUSTER_PORT_BASE + 140;
    let mock = MockCloud::start(1, base_port);
    let csv = write_iris_like_csv(&case_dir.join("data"), "stall.csv", 10);

    let config = case_config(&case_dir.join("sandbox"), base_port);
    let mut cluster = start_cluster(1, &config).await.expect("cloud should form");
    let parsed = parse_file(&cluster, &csv, &ParseParams::default(), job_policy())
        .await
        .unwrap();

    let params = RfParams {
        model_key: Some("stall_model".to_string()),
        ..RfParams::with_trees(6)
    };
    let mut job = start_job(&cluster, &parsed, &JobParams::from(params)).await.unwrap();
    let policy = PollPolicy::new(Duration::from_secs(5), Duration::from_secs(1));
    let started = Instant::now();
    let err = await_completion(&cluster, &mut job, policy).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout(), "unexpected error: {err:?}");
    assert!(elapsed >= Duration::from_secs(5), "gave up early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(7), "overran budget: {elapsed:?}");
    assert_eq!(job.state(), JobState::TimedOut);
    assert!(cluster.is_alive());
    cluster.verify_cloud_size().await.unwrap();

    cluster.stop().await;
    mock.shutdown().await;
}

/// Case 5: service-side errors surface as remote errors, nothing is retried
#[tokio::test]
async fn test_unknown_key_is_remote_error_case5() {
    crate::enable_logger();
    let case_dir = reset("jobs/case5").await;
    let base_port = CLUSTER_PORT_BASE + 150;
    let mock = MockCloud::start(1, base_port);

    let config = case_config(&case_dir.join("sandbox"), base_port);
    let mut cluster = start_cluster(1, &config).await.expect("cloud should form");

    let err = start_job(
        &cluster,
        &DatasetRef::new("never_uploaded.hex"),
        &JobParams::from(RfParams::with_trees(6)),
    )
    .await
    .unwrap_err();
    match err {
        Error::Remote(RemoteError::Service { request, message }) => {
            assert_eq!(request, "RF");
            assert!(message.contains("never_uploaded.hex"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = upload_file(&cluster, case_dir.join("data/absent.csv")).await.unwrap_err();
    assert!(matches!(err, Error::System(_)));

    cluster.stop().await;
    mock.shutdown().await;
}
