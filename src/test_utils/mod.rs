//! Helpers shared by the unit tests

use std::path::Path;

use crate::HarnessConfig;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

pub fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Defaults with the sandbox under `sandbox` and startup budgets short
/// enough for failing-startup tests
pub fn test_config(
    sandbox: &Path,
    base_port: u16,
) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.sandbox.dir = sandbox.to_path_buf();
    config.cluster.base_port = base_port;
    config.cluster.startup_timeout_ms = 400;
    config.cluster.stabilize_interval_ms = 50;
    config.cluster.kill_timeout_ms = 1_000;
    config
}
