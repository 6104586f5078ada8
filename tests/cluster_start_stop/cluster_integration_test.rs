use std::sync::Arc;

use h2o_harness::start_cluster;
use h2o_harness::start_cluster_with_launcher;
use h2o_harness::stop_cluster;
use h2o_harness::upload_file;
use h2o_harness::AttachedLauncher;
use h2o_harness::ClusterStatus;
use h2o_harness::Error;
use h2o_harness::StartupError;

use crate::common::case_config;
use crate::common::reset;
use crate::common::MockCloud;
use crate::CLUSTER_PORT_BASE;

/// Case 1: a single node cloud forms, reports size 1 and stops cleanly
#[tokio::test]
async fn test_single_node_cloud_case1() {
    crate::enable_logger();
    let case_dir = reset("cluster_start_stop/case1").await;
    let base_port = CLUSTER_PORT_BASE + 10;
    let mock = MockCloud::start(1, base_port);

    let config = case_config(&case_dir.join("sandbox"), base_port);
    let mut cluster = start_cluster(1, &config).await.expect("cloud should form");

    assert_eq!(cluster.status(), ClusterStatus::Formed);
    assert_eq!(cluster.cloud_name(), "mock");
    assert_eq!(cluster.nodes().len(), 1);
    assert_eq!(cluster.nodes()[0].port, base_port);
    let cloud = cluster.client().unwrap().get_cloud().await.unwrap();
    assert_eq!(cloud.cloud_size, 1);
    cluster.verify_cloud_size().await.unwrap();
    assert!(case_dir.join("sandbox/node0.stdout.log").exists());

    cluster.stop().await;
    assert_eq!(cluster.status(), ClusterStatus::Stopped);
    assert!(!cluster.is_alive());

    mock.shutdown().await;
}

/// Case 2: three nodes; every node agrees on a cloud of three
#[tokio::test]
async fn test_three_node_cloud_case2() {
    crate::enable_logger();
    let case_dir = reset("cluster_start_stop/case2").await;
    let base_port = CLUSTER_PORT_BASE + 20;
    let mock = MockCloud::start(3, base_port);

    let config = case_config(&case_dir.join("sandbox"), base_port);
    let mut cluster = start_cluster(3, &config).await.expect("cloud should form");

    let ports: Vec<u16> = cluster.nodes().iter().map(|n| n.port).collect();
    assert_eq!(ports, vec![base_port, base_port + 2, base_port + 4]);
    for index in 0..3 {
        let cloud = cluster.node_client(index).unwrap().get_cloud().await.unwrap();
        assert_eq!(cloud.cloud_size, 3, "node {index} disagrees");
        assert!(cloud.consensus);
    }

    stop_cluster(&mut cluster).await;
    mock.shutdown().await;
}

/// Case 3: repeated stops are no-ops and later operations are rejected
#[tokio::test]
async fn test_stop_is_idempotent_case3() {
    crate::enable_logger();
    let case_dir = reset("cluster_start_stop/case3").await;
    let base_port = CLUSTER_PORT_BASE + 30;
    let mock = MockCloud::start(1, base_port);

    let config = case_config(&case_dir.join("sandbox"), base_port);
    let mut cluster = start_cluster(1, &config).await.expect("cloud should form");

    cluster.stop().await;
    cluster.stop().await;
    stop_cluster(&mut cluster).await;

    assert_eq!(cluster.status(), ClusterStatus::Stopped);
    assert!(matches!(cluster.client(), Err(Error::ClusterStopped)));
    assert!(matches!(cluster.verify_cloud_size().await, Err(Error::ClusterStopped)));
    let err = upload_file(&cluster, case_dir.join("missing.csv")).await.unwrap_err();
    assert!(matches!(err, Error::ClusterStopped));

    mock.shutdown().await;
}

/// Case 4: nodes that never agree on the expected size fail the startup
#[tokio::test]
async fn test_cloud_not_converging_case4() {
    crate::enable_logger();
    let case_dir = reset("cluster_start_stop/case4").await;
    let base_port = CLUSTER_PORT_BASE + 40;
    let mock = MockCloud::start_with_reported_size(3, base_port, 2);

    let mut config = case_config(&case_dir.join("sandbox"), base_port);
    config.cluster.startup_timeout_ms = 1_000;
    let err = start_cluster(3, &config).await.unwrap_err();

    match err {
        Error::Startup(StartupError::NotConverged { expected, observed, .. }) => {
            assert_eq!(expected, 3);
            assert_eq!(observed, vec![Some(2), Some(2), Some(2)]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    mock.shutdown().await;
}

/// Case 5: attaching to nodes the harness did not start; stopping leaves
/// them running
#[tokio::test]
async fn test_attach_to_running_nodes_case5() {
    crate::enable_logger();
    let case_dir = reset("cluster_start_stop/case5").await;
    let base_port = CLUSTER_PORT_BASE + 50;
    let mock = MockCloud::start(2, base_port);

    let config = case_config(&case_dir.join("sandbox"), base_port);
    let mut cluster = start_cluster_with_launcher(2, &config, Arc::new(AttachedLauncher))
        .await
        .expect("cloud should form");
    let client = cluster.node_client(1).unwrap().clone();

    cluster.stop().await;

    let cloud = client.get_cloud().await.expect("attached node keeps running");
    assert_eq!(cloud.cloud_size, 2);

    mock.shutdown().await;
}
