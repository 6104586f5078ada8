use super::*;
use crate::test_utils::argv;
use crate::Sandbox;

fn spec(index: usize) -> NodeSpec {
    NodeSpec {
        index,
        host: "10.0.0.11".to_string(),
        port: 54321 + 2 * index as u16,
        cloud_name: "nightly".to_string(),
        ssh_user: None,
    }
}

#[test]
fn expand_command_should_fill_every_placeholder() {
    let template = argv(&["java", "-jar", "h2o.jar", "-name", "{cloud_name}", "-ip", "{host}", "-port", "{port}", "--log=node{index}.log"]);

    let expanded = expand_command(&template, &spec(1));

    assert_eq!(
        expanded,
        argv(&["java", "-jar", "h2o.jar", "-name", "nightly", "-ip", "10.0.0.11", "-port", "54323", "--log=node1.log"])
    );
}

#[test]
fn ssh_argv_should_prefix_user_when_set() {
    let launcher = SshLauncher::new(argv(&["java", "-port", "{port}"]));
    let mut spec = spec(0);

    assert_eq!(
        launcher.ssh_argv(&spec),
        argv(&["ssh", "-o", "BatchMode=yes", "10.0.0.11", "java -port 54321"])
    );

    spec.ssh_user = Some("0xdiag".to_string());
    assert_eq!(launcher.ssh_argv(&spec)[3], "0xdiag@10.0.0.11");
}

#[tokio::test]
async fn attached_launcher_should_spawn_nothing() {
    let sandbox = Sandbox::at(tempfile::tempdir().unwrap().path());

    let child = AttachedLauncher.launch(&spec(0), &sandbox.node_logs(0)).unwrap();

    assert!(child.is_none());
}

#[tokio::test]
async fn local_launcher_should_write_node_logs() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::at(dir.path());
    let launcher = LocalLauncher::new(argv(&["sh", "-c", "echo node {index} on {port}"]));
    let logs = sandbox.node_logs(2);

    let mut child = launcher.launch(&spec(2), &logs).unwrap().unwrap();
    let status = child.wait().await.unwrap();

    assert!(status.success());
    assert_eq!(std::fs::read_to_string(&logs.stdout).unwrap(), "node 2 on 54325\n");
}

#[tokio::test]
async fn local_launcher_should_report_spawn_failure() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::at(dir.path());
    let launcher = LocalLauncher::new(argv(&["/nonexistent/h2o-node"]));

    let err = launcher.launch(&spec(3), &sandbox.node_logs(3)).unwrap_err();

    assert!(matches!(
        err,
        crate::Error::Startup(crate::StartupError::Spawn { node: 3, .. })
    ));
}
