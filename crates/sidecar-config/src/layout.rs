//! Derives the on-disk names shared by every run of the lifecycle manager.
//!
//! A restarted host must find the workspaces and pointer file written by a
//! crashed predecessor, so the prefix, pointer name and executable location
//! are fixed rather than configurable.

use std::path::{Path, PathBuf};

/// Name prefix of every workspace directory.
pub const WORKSPACE_PREFIX: &str = "soar-web-";

/// Name of the pointer file recording the most recent workspace.
pub const POINTER_FILE_NAME: &str = "soar-web-current.txt";

/// File name of the compiled service executable.
#[cfg(windows)]
pub const EXECUTABLE_NAME: &str = "soar-web.exe";

/// File name of the compiled service executable.
#[cfg(not(windows))]
pub const EXECUTABLE_NAME: &str = "soar-web";

const BIN_DIR: &str = "bin";

/// Canonical paths for workspaces under a temporary root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    temp_root: PathBuf,
    pointer_path: PathBuf,
}

impl WorkspaceLayout {
    /// Builds the layout rooted at `temp_root`.
    #[must_use]
    pub fn new(temp_root: impl AsRef<Path>) -> Self {
        let temp_root = temp_root.as_ref().to_path_buf();
        Self {
            pointer_path: temp_root.join(POINTER_FILE_NAME),
            temp_root,
        }
    }

    /// Directory holding workspaces and the pointer file.
    #[must_use]
    pub fn temp_root(&self) -> &Path {
        self.temp_root.as_path()
    }

    /// Path of the pointer file.
    #[must_use]
    pub fn pointer_path(&self) -> &Path {
        self.pointer_path.as_path()
    }

    /// Prefix shared by workspace directory names.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        WORKSPACE_PREFIX
    }

    /// Whether `name` looks like a workspace directory created by this layout.
    #[must_use]
    pub fn is_workspace_name(&self, name: &str) -> bool {
        name != POINTER_FILE_NAME
            && name.len() > WORKSPACE_PREFIX.len()
            && name.starts_with(WORKSPACE_PREFIX)
    }

    /// Location of the compiled executable inside `workspace`.
    #[must_use]
    pub fn executable_in(&self, workspace: &Path) -> PathBuf {
        workspace.join(BIN_DIR).join(EXECUTABLE_NAME)
    }
}
