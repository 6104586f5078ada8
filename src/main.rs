use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use h2o_harness::find_file;
use h2o_harness::make_syn_dir;
use h2o_harness::metrics;
use h2o_harness::parse_file;
use h2o_harness::run_glm_only;
use h2o_harness::run_rf;
use h2o_harness::start_cluster;
use h2o_harness::utils::file_io::open_file_for_append;
use h2o_harness::ClusterHandle;
use h2o_harness::Family;
use h2o_harness::GlmParams;
use h2o_harness::HarnessConfig;
use h2o_harness::JobResult;
use h2o_harness::ParityGenerator;
use h2o_harness::ParitySpec;
use h2o_harness::ParseParams;
use h2o_harness::Result;
use h2o_harness::RfParams;
use h2o_harness::Sandbox;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[derive(Debug, Parser)]
#[command(name = "h2o-harness", version, about = "Start H2O clouds and run jobs against them")]
struct Cli {
    /// Extra config file layered over `CONFIG_PATH` and the defaults
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a cloud, print its status and keep it up until Ctrl+C
    Cloud {
        #[arg(long, default_value_t = 1)]
        nodes: usize,
    },
    /// Upload, parse and train a Random Forest
    Rf {
        #[arg(long, default_value_t = 1)]
        nodes: usize,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = 5)]
        trees: u32,
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Upload, parse and train a GLM
    Glm {
        #[arg(long, default_value_t = 1)]
        nodes: usize,
        #[arg(long)]
        file: PathBuf,
        /// Response column
        #[arg(long)]
        y: u32,
        #[arg(long, default_value = "gaussian")]
        family: Family,
        #[arg(long)]
        xval: Option<u32>,
    },
    /// Generate a parity dataset into the synthetic dataset directory
    GenParity {
        #[arg(long)]
        cols: u32,
        #[arg(long)]
        groups: u32,
        #[arg(long)]
        rows: u64,
    },
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = HarnessConfig::new()?;
    if let Some(path) = &cli.config {
        config = config.with_override_config(path)?;
    }
    let mut config = config.validate()?;

    // The log file lives in the sandbox, so it must be cleaned before logging starts
    let sandbox = Sandbox::new(&config.sandbox);
    sandbox.prepare(config.sandbox.clean_on_start).await?;
    config.sandbox.clean_on_start = false;
    let _guard = init_observability(sandbox.root())?;

    let (graceful_tx, graceful_rx) = watch::channel(());
    if config.monitoring.prometheus_enabled {
        tokio::spawn(metrics::start_server(config.monitoring.prometheus_port, graceful_rx.clone()));
    }

    let outcome = run(cli.command, &config, &sandbox).await;
    let _ = graceful_tx.send(());

    match outcome {
        Ok(()) => report_sandbox(&sandbox).await,
        Err(e) => {
            error!("command failed: {:?}", e);
            eprintln!("error: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(
    command: Command,
    config: &HarnessConfig,
    sandbox: &Sandbox,
) -> Result<()> {
    let policy = config.polling.policy();
    match command {
        Command::Cloud { nodes } => {
            let mut cluster = start_cluster(nodes, config).await?;
            print_cloud(&cluster).await;
            info!("Cloud is up. Waiting for CTRL+C signal...");
            let waited = wait_for_shutdown().await;
            cluster.stop().await;
            waited
        }
        Command::Rf {
            nodes,
            file,
            trees,
            depth,
        } => {
            let params = RfParams {
                depth,
                ..RfParams::with_trees(trees)
            };
            let path = find_file(&file)?;
            let mut cluster = start_cluster(nodes, config).await?;
            let outcome = run_rf(&cluster, &path, &params, policy).await;
            cluster.stop().await;
            print_json(outcome?.json());
            Ok(())
        }
        Command::Glm {
            nodes,
            file,
            y,
            family,
            xval,
        } => {
            let mut params = GlmParams::new(y);
            params.family = family;
            params.xval = xval;
            let path = find_file(&file)?;
            let mut cluster = start_cluster(nodes, config).await?;
            let outcome = run_glm(&cluster, &path, &params, config).await;
            cluster.stop().await;
            print_json(outcome?.json());
            Ok(())
        }
        Command::GenParity { cols, groups, rows } => {
            make_syn_dir(&config.datasets).await?;
            let path = ParityGenerator::from_config(&config.datasets)?
                .generate(&ParitySpec::new(cols, groups, rows), sandbox)
                .await?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

async fn run_glm(
    cluster: &ClusterHandle,
    path: &Path,
    params: &GlmParams,
    config: &HarnessConfig,
) -> Result<JobResult> {
    let policy = config.polling.policy();
    let parsed = parse_file(cluster, path, &ParseParams::default(), policy).await?;
    run_glm_only(cluster, &parsed, params, policy).await
}

async fn print_cloud(cluster: &ClusterHandle) {
    for (index, endpoint) in cluster.nodes().into_iter().enumerate() {
        let status = match cluster.node_client(index) {
            Ok(client) => client.get_cloud().await,
            Err(e) => Err(e),
        };
        match status {
            Ok(cloud) => println!(
                "node {index} {endpoint}: cloud {} size {} consensus {}",
                cloud.cloud_name, cloud.cloud_size, cloud.consensus
            ),
            Err(e) => println!("node {index} {endpoint}: {e}"),
        }
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => warn!("failed to render result: {:?}", e),
    }
}

/// Fails the run when node logs contain error lines the API did not report
async fn report_sandbox(sandbox: &Sandbox) -> Result<ExitCode> {
    let findings = sandbox.check_for_errors().await?;
    if findings.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    for finding in &findings {
        eprintln!("{}:{}: {}", finding.file.display(), finding.line_no, finding.line);
    }
    Ok(ExitCode::FAILURE)
}

async fn wait_for_shutdown() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }
    Ok(())
}

fn init_observability(sandbox_dir: &Path) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(&sandbox_dir.join("harness.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
