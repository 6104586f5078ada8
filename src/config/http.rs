use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// HTTP client settings shared by every node client of a cluster
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConfig {
    /// Maximum time to wait for establishing a TCP connection
    /// Default: 1 second
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Maximum time for a complete request/response, uploads included
    /// Default: 60 seconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 {
            return Err(Error::InvalidConfig("connect_timeout_ms must be > 0".into()));
        }
        if self.request_timeout_ms < self.connect_timeout_ms {
            return Err(Error::InvalidConfig(format!(
                "request_timeout_ms {} must not be shorter than connect_timeout_ms {}",
                self.request_timeout_ms, self.connect_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_connect_timeout_ms() -> u64 {
    1_000
}
fn default_request_timeout_ms() -> u64 {
    60_000
}
