use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SandboxConfig {
    /// Directory receiving node and helper process logs
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Wipe the sandbox when a cluster starts
    #[serde(default = "default_clean_on_start")]
    pub clean_on_start: bool,

    /// A log line containing any of these is reported as an error
    #[serde(default = "default_error_patterns")]
    pub error_patterns: Vec<String>,

    /// ...unless it also contains one of these
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            clean_on_start: default_clean_on_start(),
            error_patterns: default_error_patterns(),
            ignore_patterns: vec![],
        }
    }
}

impl SandboxConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("sandbox dir path cannot be empty".into()));
        }
        if self.error_patterns.iter().any(|p| p.is_empty()) {
            return Err(Error::InvalidConfig(
                "sandbox error_patterns cannot contain empty patterns".into(),
            ));
        }
        Ok(())
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("sandbox")
}
fn default_clean_on_start() -> bool {
    true
}
fn default_error_patterns() -> Vec<String> {
    vec![
        "ERROR".to_string(),
        "Exception".to_string(),
        "AssertionError".to_string(),
    ]
}
