//! Dataset references, fixture lookup and synthetic dataset generation.

mod parity;
pub use parity::*;


use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::DatasetConfig;
use crate::Result;
use crate::SystemError;

/// Key of a dataset held by the service, raw (uploaded) or parsed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetRef {
    key: String,
}

impl DatasetRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Resolves `relative` against the current directory and its two parents,
/// so tests work from the repository root and from nested test directories.
pub fn find_file(relative: impl AsRef<Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    find_file_from(&cwd, relative)
}

pub fn find_file_from(
    base: &Path,
    relative: impl AsRef<Path>,
) -> Result<PathBuf> {
    let relative = relative.as_ref();
    if relative.is_absolute() {
        return if relative.exists() {
            Ok(relative.to_path_buf())
        } else {
            Err(SystemError::NotFound(relative.to_path_buf()).into())
        };
    }

    for dir in base.ancestors().take(3) {
        let candidate = dir.join(relative);
        if candidate.exists() {
            debug!(?candidate, "found file");
            return Ok(candidate);
        }
    }
    Err(SystemError::NotFound(relative.to_path_buf()).into())
}

/// Looks `relative` up in the shared dataset tree
pub fn find_dataset(
    config: &DatasetConfig,
    relative: impl AsRef<Path>,
) -> Result<PathBuf> {
    let path = config.root.join(relative);
    if path.is_file() {
        Ok(path)
    } else {
        Err(SystemError::NotFound(path).into())
    }
}

/// Creates the synthetic dataset directory; an existing one is kept
pub async fn make_syn_dir(config: &DatasetConfig) -> Result<PathBuf> {
    tokio::fs::create_dir_all(&config.syn_dir)
        .await
        .map_err(|source| SystemError::PathError {
            path: config.syn_dir.clone(),
            source,
        })?;
    Ok(config.syn_dir.clone())
}

/// Empties the synthetic dataset directory, creating it if needed
pub async fn reset_syn_dir(config: &DatasetConfig) -> Result<PathBuf> {
    match tokio::fs::remove_dir_all(&config.syn_dir).await {
        Ok(()) => debug!(dir = ?config.syn_dir, "synthetic dataset dir removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(SystemError::PathError {
                path: config.syn_dir.clone(),
                source,
            }
            .into())
        }
    }
    make_syn_dir(config).await
}
