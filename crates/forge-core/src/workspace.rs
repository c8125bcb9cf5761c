//! Per-run output workspace
//!
//! Every run gets its own uniquely-named directory under the output root, so
//! concurrent runs never interleave files or race on an archive path. Writes
//! are confined to the run directory.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// An isolated directory holding one run's generated files
#[derive(Debug)]
pub struct RunWorkspace {
    run_id: Uuid,
    dir: PathBuf,
}

impl RunWorkspace {
    /// Create a fresh workspace under `root`.
    ///
    /// # Errors
    /// Returns `Error::Workspace` when the directory cannot be created.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let run_id = Uuid::new_v4();
        let dir = root.as_ref().join(format!("run-{run_id}"));
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::Workspace(format!("failed to create {}: {e}", dir.display()))
        })?;
        Ok(Self { run_id, dir })
    }

    /// The run identifier
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The workspace directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a file at a workspace-relative path, creating parent
    /// directories as needed.
    ///
    /// # Errors
    /// Rejects absolute paths and paths escaping the workspace; surfaces
    /// I/O failures as `Error::Workspace`.
    pub fn write_file(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        if relative.trim().is_empty() {
            return Err(Error::Workspace("empty file path".to_string()));
        }
        if rel.is_absolute() {
            return Err(Error::Workspace(format!("absolute path rejected: {relative}")));
        }
        for component in rel.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(Error::Workspace(format!(
                        "path escapes the workspace: {relative}"
                    )));
                }
            }
        }

        let path = self.dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Workspace(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        std::fs::write(&path, contents)
            .map_err(|e| Error::Workspace(format!("failed to write {}: {e}", path.display())))?;
        Ok(path)
    }

    /// Remove the workspace directory and everything in it.
    ///
    /// # Errors
    /// Returns `Error::Workspace` on I/O failure.
    pub fn cleanup(self) -> Result<()> {
        std::fs::remove_dir_all(&self.dir).map_err(|e| {
            Error::Workspace(format!("failed to remove {}: {e}", self.dir.display()))
        })
    }
}
