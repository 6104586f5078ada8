//! In-process stand-in for the service's JSON API.
//!
//! One warp server per node, all sharing a [`MockState`]: uploaded keys,
//! parsed keys and per-model poll counters. Model keys starting with
//! `stall` never finish, which is how tests exercise polling timeouts.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use h2o_harness::HarnessConfig;
use serde_json::json;
use serde_json::Value;
use tokio::fs::remove_dir_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use warp::reply::Json;
use warp::Filter;

pub const WAIT_FOR_JOB_IN_SEC: u64 = 10;

type Query = HashMap<String, String>;

pub struct MockState {
    cloud_name: String,
    node_count: usize,
    /// Size every node reports once formed; differs from `node_count` to
    /// simulate a cloud that never converges
    reported_size: usize,
    cloud_calls: AtomicUsize,
    uploads: Mutex<HashMap<String, usize>>,
    parsed: Mutex<HashMap<String, usize>>,
    rf_polls: Mutex<HashMap<String, (usize, u64)>>,
}

impl MockState {
    fn cloud(&self) -> Value {
        // Membership grows one node per round of Cloud calls
        let calls = self.cloud_calls.fetch_add(1, Ordering::SeqCst);
        let size = (1 + calls / self.node_count).min(self.reported_size);
        json!({
            "cloud_name": self.cloud_name,
            "cloud_size": size,
            "consensus": size == self.reported_size,
            "locked": false,
            "nodes": (0..size).map(|i| json!({"name": format!("/127.0.0.1:{i}")})).collect::<Vec<_>>(),
        })
    }

    fn post_file(
        &self,
        query: Query,
        body: &[u8],
    ) -> Value {
        let Some(key) = query.get("key") else {
            return json!({"error": "Missing argument key"});
        };
        let rows = body.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count();
        self.uploads.lock().unwrap().insert(key.clone(), rows);
        json!({"key": key, "rows": rows})
    }

    fn parse(
        &self,
        query: Query,
    ) -> Value {
        let source = query.get("source_key").cloned().unwrap_or_default();
        let destination = query
            .get("destination_key")
            .cloned()
            .unwrap_or_else(|| format!("{source}.hex"));
        let Some(rows) = self.uploads.lock().unwrap().get(&source).copied() else {
            return json!({"error": format!("Key {source} not found")});
        };
        self.parsed.lock().unwrap().insert(destination.clone(), rows);
        json!({
            "response": {
                "status": "redirect",
                "redirect_request": "Progress",
                "redirect_request_args": {"destination_key": destination}
            }
        })
    }

    fn progress(
        &self,
        query: Query,
    ) -> Value {
        let key = query.get("destination_key").cloned().unwrap_or_default();
        match self.parsed.lock().unwrap().get(&key) {
            Some(rows) => json!({"response": {"status": "done"}, "key": key, "num_rows": rows}),
            None => json!({"error": format!("Key {key} not found")}),
        }
    }

    fn rf(
        &self,
        query: Query,
    ) -> Value {
        let data_key = query.get("data_key").cloned().unwrap_or_default();
        if !self.parsed.lock().unwrap().contains_key(&data_key) {
            return json!({"error": format!("Key {data_key} not found")});
        }
        let model_key = query.get("model_key").cloned().unwrap_or_default();
        let trees = query.get("ntree").and_then(|n| n.parse().ok()).unwrap_or(50);
        self.rf_polls.lock().unwrap().insert(model_key.clone(), (0, trees));
        json!({
            "response": {
                "status": "redirect",
                "redirect_request": "RFView",
                "redirect_request_args": {"model_key": model_key, "data_key": data_key}
            }
        })
    }

    fn rf_view(
        &self,
        query: Query,
    ) -> Value {
        let model_key = query.get("model_key").cloned().unwrap_or_default();
        let mut polls = self.rf_polls.lock().unwrap();
        let Some((count, trees)) = polls.get_mut(&model_key) else {
            return json!({"error": format!("Model {model_key} not found")});
        };
        *count += 1;
        if model_key.starts_with("stall") {
            return json!({"response": {"status": "poll", "progress": 1, "progress_total": *trees}});
        }
        match *count {
            1 => json!({"response": {"status": "poll", "progress": 0, "progress_total": *trees}}),
            2 => json!({"response": {"status": "poll", "progress": *trees / 2, "progress_total": *trees}}),
            _ => json!({
                "response": {"status": "done"},
                "model_key": model_key,
                "trees": {"number_built": *trees},
                "confusion_matrix": {"classification_error": 0.05}
            }),
        }
    }

    fn glm(
        &self,
        query: Query,
    ) -> Value {
        let key = query.get("key").cloned().unwrap_or_default();
        if !self.parsed.lock().unwrap().contains_key(&key) {
            return json!({"error": format!("Key {key} not found")});
        }
        json!({
            "key": key,
            "GLMModel": {
                "family": query.get("family"),
                "coefficients": {"C1": 0.25, "C2": -1.5, "Intercept": 0.1},
                "validations": [{"err": "0.125", "auc": 0.91}]
            }
        })
    }
}

/// A set of mock nodes on `base_port + i * port_step`
pub struct MockCloud {
    pub state: Arc<MockState>,
    graceful_tx: watch::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl MockCloud {
    pub fn start(
        node_count: usize,
        base_port: u16,
    ) -> Self {
        Self::start_with_reported_size(node_count, base_port, node_count)
    }

    pub fn start_with_reported_size(
        node_count: usize,
        base_port: u16,
        reported_size: usize,
    ) -> Self {
        let state = Arc::new(MockState {
            cloud_name: "mock".to_string(),
            node_count,
            reported_size,
            cloud_calls: AtomicUsize::new(0),
            uploads: Mutex::new(HashMap::new()),
            parsed: Mutex::new(HashMap::new()),
            rf_polls: Mutex::new(HashMap::new()),
        });
        let (graceful_tx, graceful_rx) = watch::channel(());

        let handles = (0..node_count)
            .map(|i| {
                let port = base_port + 2 * i as u16;
                let mut shutdown = graceful_rx.clone();
                let (_, server) = warp::serve(routes(state.clone()))
                    .try_bind_with_graceful_shutdown(([127, 0, 0, 1], port), async move {
                        let _ = shutdown.changed().await;
                    })
                    .unwrap_or_else(|e| panic!("mock node on port {port}: {e}"));
                debug!(port, "mock node listening");
                tokio::spawn(server)
            })
            .collect();

        Self {
            state,
            graceful_tx,
            handles,
        }
    }

    pub async fn shutdown(self) {
        let _ = self.graceful_tx.send(());
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

fn routes(state: Arc<MockState>) -> impl Filter<Extract = (Json,), Error = warp::Rejection> + Clone + Send + Sync + 'static {
    let with_state = warp::any().map(move || state.clone());

    let cloud = warp::path!("Cloud.json")
        .and(with_state.clone())
        .map(|s: Arc<MockState>| warp::reply::json(&s.cloud()));
    let post_file = warp::path!("PostFile.json")
        .and(warp::post())
        .and(warp::query::<Query>())
        .and(warp::body::bytes())
        .and(with_state.clone())
        .map(|q: Query, body: warp::hyper::body::Bytes, s: Arc<MockState>| warp::reply::json(&s.post_file(q, &body)));
    let parse = warp::path!("Parse.json")
        .and(warp::query::<Query>())
        .and(with_state.clone())
        .map(|q: Query, s: Arc<MockState>| warp::reply::json(&s.parse(q)));
    let progress = warp::path!("Progress.json")
        .and(warp::query::<Query>())
        .and(with_state.clone())
        .map(|q: Query, s: Arc<MockState>| warp::reply::json(&s.progress(q)));
    let rf = warp::path!("RF.json")
        .and(warp::query::<Query>())
        .and(with_state.clone())
        .map(|q: Query, s: Arc<MockState>| warp::reply::json(&s.rf(q)));
    let rf_view = warp::path!("RFView.json")
        .and(warp::query::<Query>())
        .and(with_state.clone())
        .map(|q: Query, s: Arc<MockState>| warp::reply::json(&s.rf_view(q)));
    let glm = warp::path!("GLM.json")
        .and(warp::query::<Query>())
        .and(with_state)
        .map(|q: Query, s: Arc<MockState>| warp::reply::json(&s.glm(q)));

    cloud
        .or(post_file)
        .unify()
        .or(parse)
        .unify()
        .or(progress)
        .unify()
        .or(rf)
        .unify()
        .or(rf_view)
        .unify()
        .or(glm)
        .unify()
}

fn get_root_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("sandbox")
}

/// Empties the sandbox of `case_name` and returns its path
pub async fn reset(case_name: &str) -> PathBuf {
    let dir = get_root_path().join(case_name);
    debug!(?dir, "reset path");
    // Ignore errors for a directory that does not exist yet
    let _ = remove_dir_all(&dir).await;
    dir
}

/// Config for a case: nodes are `sleep` processes standing in for the real
/// node command, the mock servers answer on their ports
pub fn case_config(
    sandbox: &Path,
    base_port: u16,
) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.sandbox.dir = sandbox.to_path_buf();
    config.cluster.cloud_name = Some("mock".to_string());
    config.cluster.node_command = vec!["sleep".to_string(), "30".to_string()];
    config.cluster.base_port = base_port;
    config.cluster.startup_timeout_ms = 5_000;
    config.cluster.stabilize_interval_ms = 50;
    config.cluster.kill_timeout_ms = 2_000;
    config
}

/// `rows` lines of an iris-like CSV with a header
pub fn write_iris_like_csv(
    dir: &Path,
    name: &str,
    rows: usize,
) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let classes = ["Iris-setosa", "Iris-versicolor", "Iris-virginica"];
    let mut text = String::from("sepal_len,sepal_wid,petal_len,petal_wid,class\n");
    for i in 0..rows {
        let f = i as f64;
        text.push_str(&format!(
            "{:.1},{:.1},{:.1},{:.1},{}\n",
            4.3 + (f % 36.0) / 10.0,
            2.0 + (f % 24.0) / 10.0,
            1.0 + (f % 59.0) / 10.0,
            0.1 + (f % 24.0) / 10.0,
            classes[i % 3]
        ));
    }
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}
