//! Integration-test harness for H2O clouds.
//!
//! Starts node processes (locally or over SSH), waits for them to agree on
//! membership, drives datasets and training jobs through the JSON API and
//! polls the jobs to completion under an explicit time budget.
//!
//! ```ignore
//! let config = HarnessConfig::new()?.validate()?;
//! let mut cluster = start_cluster(1, &config).await?;
//! let result = run_rf(&cluster, find_file("smalldata/iris/iris2.csv")?, &RfParams::with_trees(6), config.polling.policy()).await?;
//! assert!(!result.has_errors());
//! cluster.stop().await;
//! ```

mod client;
mod cluster;
mod config;
mod dataset;
mod errors;
pub mod metrics;
mod params;
mod poll;
mod sandbox;
pub mod utils;
mod workflow;

pub use client::*;
pub use cluster::*;
pub use config::*;
pub use dataset::*;
pub use errors::*;
pub use params::*;
pub use poll::*;
pub use sandbox::*;
pub use workflow::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
