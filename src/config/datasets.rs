use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatasetConfig {
    /// Root of the shared (large) dataset tree used by `find_dataset`
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Output directory of generated datasets
    #[serde(default = "default_syn_dir")]
    pub syn_dir: PathBuf,

    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Generator script, resolved with `find_file` when relative
    #[serde(default = "default_parity_script")]
    pub parity_script: PathBuf,

    #[serde(default = "default_generator_timeout_ms")]
    pub generator_timeout_ms: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            syn_dir: default_syn_dir(),
            interpreter: default_interpreter(),
            parity_script: default_parity_script(),
            generator_timeout_ms: default_generator_timeout_ms(),
        }
    }
}

impl DatasetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.syn_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("syn_dir path cannot be empty".into()));
        }
        if self.interpreter.trim().is_empty() {
            return Err(Error::InvalidConfig("interpreter cannot be empty".into()));
        }
        if self.generator_timeout_ms == 0 {
            return Err(Error::InvalidConfig("generator_timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_millis(self.generator_timeout_ms)
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/home/0xdiag/datasets")
}
fn default_syn_dir() -> PathBuf {
    PathBuf::from("syn_datasets")
}
fn default_interpreter() -> String {
    "perl".to_string()
}
fn default_parity_script() -> PathBuf {
    PathBuf::from("syn_scripts/parity.pl")
}
fn default_generator_timeout_ms() -> u64 {
    30_000
}
