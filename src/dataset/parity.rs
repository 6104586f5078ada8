use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::dataset::find_file;
use crate::utils::process::spawn_cmd_and_wait;
use crate::DatasetConfig;
use crate::Result;
use crate::Sandbox;
use crate::SystemError;

/// Shape of a parity dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParitySpec {
    pub cols: u32,
    pub groups: u32,
    pub rows: u64,
}

impl ParitySpec {
    pub fn new(
        cols: u32,
        groups: u32,
        rows: u64,
    ) -> Self {
        Self { cols, groups, rows }
    }

    /// File name the generator writes: `parity_<cols>_<groups>_<rows>_quad.data`
    pub fn file_name(&self) -> String {
        format!("parity_{}_{}_{}_quad.data", self.cols, self.groups, self.rows)
    }

    fn args(&self) -> [String; 4] {
        [
            self.cols.to_string(),
            self.groups.to_string(),
            self.rows.to_string(),
            "quad".to_string(),
        ]
    }
}

/// Runs the external parity script into the synthetic dataset directory
#[derive(Debug, Clone)]
pub struct ParityGenerator {
    interpreter: String,
    script: PathBuf,
    output_dir: PathBuf,
    timeout: Duration,
}

impl ParityGenerator {
    /// Resolves the script with [`find_file`] unless it is absolute
    pub fn from_config(config: &DatasetConfig) -> Result<Self> {
        let script = find_file(&config.parity_script)?;
        let script = std::fs::canonicalize(&script).map_err(|source| SystemError::PathError {
            path: script.clone(),
            source,
        })?;
        Ok(Self {
            interpreter: config.interpreter.clone(),
            script,
            output_dir: config.syn_dir.clone(),
            timeout: config.generator_timeout(),
        })
    }

    pub fn new(
        interpreter: impl Into<String>,
        script: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            output_dir: output_dir.into(),
            timeout,
        }
    }

    pub fn with_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path the dataset for `spec` has (or will have)
    pub fn path_for(
        &self,
        spec: &ParitySpec,
    ) -> PathBuf {
        self.output_dir.join(spec.file_name())
    }

    /// Blocks until the script exits or the timeout kills it.
    ///
    /// The script runs with the output directory as working directory and must
    /// leave `spec.file_name()` there.
    pub async fn generate(
        &self,
        spec: &ParitySpec,
        sandbox: &Sandbox,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| SystemError::PathError {
                path: self.output_dir.clone(),
                source,
            })?;

        let script = if self.script.is_absolute() {
            self.script.clone()
        } else {
            std::env::current_dir()?.join(&self.script)
        };
        let mut argv = vec![self.interpreter.clone(), script.display().to_string()];
        argv.extend(spec.args());

        info!(file = %spec.file_name(), rows = spec.rows, "generating parity dataset");
        spawn_cmd_and_wait("parity", &argv, Some(&self.output_dir), self.timeout, sandbox).await?;

        let path = self.path_for(spec);
        if !path.is_file() {
            return Err(SystemError::Generator(path).into());
        }
        Ok(path)
    }
}
