//! Log sandbox shared by cluster nodes and helper processes.
//!
//! Every launched process gets `<name>.stdout.log` and `<name>.stderr.log`
//! under the sandbox root. After a trial, tests scan those files for error
//! lines the service printed but did not report through its API.


use std::fs::File;
use std::path::Path;
use std::path::PathBuf;

use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tracing::debug;
use tracing::warn;

use crate::utils::file_io::open_file_for_append;
use crate::Result;
use crate::SandboxConfig;
use crate::SystemError;

const STDOUT_SUFFIX: &str = ".stdout.log";
const STDERR_SUFFIX: &str = ".stderr.log";

/// Output files of one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLogs {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

impl ProcessLogs {
    pub fn open_stdout(&self) -> Result<File> {
        open_file_for_append(&self.stdout)
    }

    pub fn open_stderr(&self) -> Result<File> {
        open_file_for_append(&self.stderr)
    }
}

/// A log line matching an error pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxFinding {
    pub file: PathBuf,
    pub line_no: usize,
    pub line: String,
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    error_patterns: Vec<String>,
    ignore_patterns: Vec<String>,
}

impl Sandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            root: config.dir.clone(),
            error_patterns: config.error_patterns.clone(),
            ignore_patterns: config.ignore_patterns.clone(),
        }
    }

    /// Sandbox at `root` with the default patterns
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self::new(&SandboxConfig {
            dir: root.into(),
            ..Default::default()
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root, wiping it first when `clean` is set
    pub async fn prepare(
        &self,
        clean: bool,
    ) -> Result<()> {
        if clean {
            self.clean().await?;
        } else {
            self.create_root().await?;
        }
        Ok(())
    }

    pub fn logs_for(
        &self,
        name: &str,
    ) -> ProcessLogs {
        ProcessLogs {
            stdout: self.root.join(format!("{name}{STDOUT_SUFFIX}")),
            stderr: self.root.join(format!("{name}{STDERR_SUFFIX}")),
        }
    }

    pub fn node_logs(
        &self,
        index: usize,
    ) -> ProcessLogs {
        self.logs_for(&format!("node{index}"))
    }

    /// Removes everything under the root and recreates it
    pub async fn clean(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!(root = ?self.root, "sandbox removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SystemError::PathError {
                    path: self.root.clone(),
                    source,
                }
                .into())
            }
        }
        self.create_root().await
    }

    /// Removes only process stdout/stderr files, keeping anything else (for
    /// instance the harness log) for a later look at a hung run
    pub async fn clean_stdout_stderr(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.process_log_files().await? {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(?path, "failed to remove sandbox file: {:?}", e),
            }
        }
        Ok(removed)
    }

    /// Scans every process log for lines containing an error pattern and none
    /// of the ignore patterns
    pub async fn check_for_errors(&self) -> Result<Vec<SandboxFinding>> {
        let mut findings = Vec::new();
        for file in self.process_log_files().await? {
            let handle = tokio::fs::File::open(&file).await.map_err(|source| SystemError::PathError {
                path: file.clone(),
                source,
            })?;
            // Node output is not guaranteed to be UTF-8
            let mut reader = BufReader::new(handle);
            let mut buf = Vec::new();
            let mut line_no = 0;
            while reader.read_until(b'\n', &mut buf).await? > 0 {
                line_no += 1;
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if self.is_error_line(line) {
                    findings.push(SandboxFinding {
                        file: file.clone(),
                        line_no,
                        line: line.to_string(),
                    });
                }
                buf.clear();
            }
        }
        if !findings.is_empty() {
            warn!(count = findings.len(), root = ?self.root, "errors found in sandbox");
        }
        Ok(findings)
    }

    fn is_error_line(
        &self,
        line: &str,
    ) -> bool {
        self.error_patterns.iter().any(|p| line.contains(p.as_str()))
            && !self.ignore_patterns.iter().any(|p| line.contains(p.as_str()))
    }

    async fn create_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| {
                SystemError::PathError {
                    path: self.root.clone(),
                    source,
                }
                .into()
            })
    }

    async fn process_log_files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(source) => {
                return Err(SystemError::PathError {
                    path: self.root.clone(),
                    source,
                }
                .into())
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_process_log = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(STDOUT_SUFFIX) || n.ends_with(STDERR_SUFFIX))
                .unwrap_or(false);
            if is_process_log && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
