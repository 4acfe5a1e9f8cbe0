//! Filesystem access used by a build.
//!
//! Every read, write and removal performed by the pipeline goes through a
//! [`Runtime`], so tests can observe the order of side effects and embedders
//! can redirect output.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use path_clean::PathClean;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Runtime error: {0}")]
    Other(String),
}

#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Write a file, creating missing parent directories.
    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()>;

    /// Remove a file or directory tree. Removing a missing path succeeds.
    async fn remove_path(&self, path: &Path) -> RuntimeResult<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// Runtime backed by the local filesystem. Relative paths resolve against
/// `cwd`.
#[derive(Debug, Clone)]
pub struct NativeRuntime {
    cwd: PathBuf,
}

impl NativeRuntime {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path).clean()
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> RuntimeError {
    RuntimeError::Other(format!("Task join error: {e}"))
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = self.resolve_path(path);
        tokio::task::spawn_blocking(move || {
            std::fs::read(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::FileNotFound(path.clone())
                } else {
                    RuntimeError::Io(format!("Failed to read {}: {e}", path.display()))
                }
            })
        })
        .await
        .map_err(join_error)?
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let path = self.resolve_path(path);
        let content = content.to_vec();
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RuntimeError::Io(format!(
                        "Failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            std::fs::write(&path, content)
                .map_err(|e| RuntimeError::Io(format!("Failed to write {}: {e}", path.display())))
        })
        .await
        .map_err(join_error)?
    }

    async fn remove_path(&self, path: &Path) -> RuntimeResult<()> {
        let path = self.resolve_path(path);
        tokio::task::spawn_blocking(move || {
            let result = match std::fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&path),
                Ok(_) => std::fs::remove_file(&path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => Err(e),
            };
            result.map_err(|e| RuntimeError::Io(format!("Failed to remove {}: {e}", path.display())))
        })
        .await
        .map_err(join_error)?
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path).exists()
    }
}
