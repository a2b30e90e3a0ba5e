//! Temp Workspace
//!
//! A uniquely named scratch directory under the temp root. It is removed
//! when released explicitly or, failing that, when the handle is dropped,
//! so every exit path of the owning operation cleans up.

use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};

use crate::error::CoreResult;

/// Handle to an acquired Temp Workspace
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    /// Create `<root>/<prefix><random token>`.
    pub fn acquire(root: &Path, prefix: &str) -> CoreResult<Self> {
        std::fs::create_dir_all(root)?;
        let dir = Builder::new().prefix(prefix).tempdir_in(root)?;
        tracing::debug!("Acquired temp workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the workspace
    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory and its contents, reporting removal failures.
    ///
    /// Dropping the handle also removes it, silently.
    pub fn release(self) -> CoreResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!("Released temp workspace {}", path.display());
        Ok(())
    }
}
