use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::PollPolicy;
use crate::Result;

/// Default budget for waiting on remote jobs
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct PollingConfig {
    /// Give up after this long (unit: milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Sleep between two status requests (unit: milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl PollingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::InvalidConfig("polling interval_ms must be > 0".into()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("polling timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(self.timeout_ms),
            Duration::from_millis(self.interval_ms),
        )
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}
fn default_interval_ms() -> u64 {
    500
}
