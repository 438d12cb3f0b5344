//! Provisioning, recording and reclamation of build workspaces.
//!
//! Each host start copies the bundled source into a fresh directory named
//! with [`sidecar_config::WORKSPACE_PREFIX`] under the temporary root. The
//! directory's path is written to the pointer file and its owner's identity
//! to a marker inside it, so a later start can tell a crashed predecessor's
//! leftovers from a workspace another live host still uses.

mod errors;
mod owner;
mod pointer;
mod tree;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::Builder;
use tracing::{debug, info, warn};

use sidecar_config::WorkspaceLayout;

pub use errors::WorkspaceError;
#[cfg(test)]
pub(crate) use owner::{OWNER_FILE_NAME, marker_for};

/// Log target for workspace management.
pub(crate) const WORKSPACE_TARGET: &str = "sidecar_host::workspace";

/// A provisioned workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    executable: PathBuf,
    pointer: PathBuf,
    created_at: SystemTime,
}

impl Workspace {
    /// Absolute path of the workspace directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Where the build places the service executable.
    #[must_use]
    pub fn executable_path(&self) -> &Path {
        self.executable.as_path()
    }

    /// Pointer file that records this workspace.
    #[must_use]
    pub fn pointer_path(&self) -> &Path {
        self.pointer.as_path()
    }

    /// When the workspace was created.
    #[must_use]
    pub const fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

/// Summary of a [`WorkspaceManager::reclaim_orphans`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReclaimReport {
    removed: Vec<PathBuf>,
    skipped: Vec<PathBuf>,
    failed: Vec<PathBuf>,
}

impl ReclaimReport {
    /// Workspaces deleted by the pass.
    #[must_use]
    pub fn removed(&self) -> &[PathBuf] {
        &self.removed
    }

    /// Workspaces left alone because another live host owns them.
    #[must_use]
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    /// Workspaces that could not be removed completely.
    #[must_use]
    pub fn failed(&self) -> &[PathBuf] {
        &self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Removed,
    Skipped,
    Failed,
}

/// Creates, records and removes workspaces under a temporary root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    layout: WorkspaceLayout,
}

impl WorkspaceManager {
    /// Builds a manager for `layout`.
    #[must_use]
    pub const fn new(layout: WorkspaceLayout) -> Self {
        Self { layout }
    }

    /// Directory layout in use.
    #[must_use]
    pub const fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Deletes workspaces left behind by earlier runs.
    ///
    /// The workspace named by the pointer file goes first, then every
    /// prefixed directory under the temporary root. Workspaces owned by
    /// another live process are skipped. Failures are logged per entry and
    /// never stop the scan.
    pub fn reclaim_orphans(&self) -> ReclaimReport {
        let mut report = ReclaimReport::default();
        let pointer_path = self.layout.pointer_path();

        let mut keep_pointer = false;
        if let Some(recorded) = pointer::read(pointer_path) {
            if self.is_candidate(&recorded) {
                keep_pointer = self.reclaim_entry(&recorded, &mut report) == EntryOutcome::Skipped;
            } else {
                warn!(
                    target: WORKSPACE_TARGET,
                    recorded = %recorded.display(),
                    "pointer names a path outside the workspace root; ignoring it"
                );
            }
        }
        if !keep_pointer && let Err(error) = pointer::remove(pointer_path) {
            warn!(
                target: WORKSPACE_TARGET,
                file = %pointer_path.display(),
                %error,
                "failed to remove stale pointer"
            );
        }

        match fs::read_dir(self.layout.temp_root()) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let is_dir = entry.file_type().is_ok_and(|kind| kind.is_dir());
                    if is_dir && self.is_candidate(&path) {
                        self.reclaim_entry(&path, &mut report);
                    }
                }
            }
            Err(error) => {
                debug!(
                    target: WORKSPACE_TARGET,
                    root = %self.layout.temp_root().display(),
                    %error,
                    "temporary root not scanned"
                );
            }
        }

        info!(
            target: WORKSPACE_TARGET,
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "orphan reclamation finished"
        );
        report
    }

    /// Creates a workspace and copies `source_root` into it.
    ///
    /// The pointer file is written before the copy, so a crash mid-copy still
    /// leaves the workspace discoverable. A partial copy is not rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when the source is unreadable or the
    /// workspace cannot be created, recorded or populated.
    pub fn provision(&self, source_root: &Path) -> Result<Workspace, WorkspaceError> {
        let metadata =
            fs::metadata(source_root).map_err(|source| WorkspaceError::SourceUnreadable {
                path: source_root.to_path_buf(),
                source,
            })?;
        if !metadata.is_dir() {
            return Err(WorkspaceError::SourceNotDirectory {
                path: source_root.to_path_buf(),
            });
        }

        let temp_root = self.layout.temp_root();
        let create_error = |source| WorkspaceError::Create {
            path: temp_root.to_path_buf(),
            source,
        };
        fs::create_dir_all(temp_root).map_err(create_error)?;
        let root = Builder::new()
            .prefix(self.layout.prefix())
            .tempdir_in(temp_root)
            .map_err(create_error)?
            .keep();

        owner::write(&root).map_err(|source| WorkspaceError::Record {
            path: root.join(owner::OWNER_FILE_NAME),
            source,
        })?;
        let pointer_path = self.layout.pointer_path();
        pointer::write(pointer_path, &root).map_err(|source| WorkspaceError::Record {
            path: pointer_path.to_path_buf(),
            source,
        })?;

        let files = tree::copy_tree(source_root, &root)?;
        info!(
            target: WORKSPACE_TARGET,
            workspace = %root.display(),
            source = %source_root.display(),
            files,
            "workspace provisioned"
        );

        Ok(Workspace {
            executable: self.layout.executable_in(&root),
            pointer: pointer_path.to_path_buf(),
            created_at: SystemTime::now(),
            root,
        })
    }

    /// Removes the workspace children-first, then its pointer.
    ///
    /// Removing an already-removed workspace is a no-op. The pointer is only
    /// deleted while it still names this workspace.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::RemovalIncomplete`] when something could not
    /// be deleted; everything else has still been removed.
    pub fn destroy(&self, workspace: &Workspace) -> Result<(), WorkspaceError> {
        let mut failure = tree::remove_tree(workspace.root())
            .err()
            .map(|source| WorkspaceError::RemovalIncomplete {
                path: workspace.root.clone(),
                source,
            });

        if pointer::points_at(workspace.pointer_path(), workspace.root())
            && let Err(source) = pointer::remove(workspace.pointer_path())
        {
            failure.get_or_insert(WorkspaceError::RemovalIncomplete {
                path: workspace.pointer.clone(),
                source,
            });
        }

        match failure {
            Some(error) => Err(error),
            None => {
                info!(
                    target: WORKSPACE_TARGET,
                    workspace = %workspace.root().display(),
                    "workspace removed"
                );
                Ok(())
            }
        }
    }

    fn is_candidate(&self, path: &Path) -> bool {
        let under_root = path.parent() == Some(self.layout.temp_root());
        let named = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.layout.is_workspace_name(name));
        under_root && named
    }

    fn reclaim_entry(&self, path: &Path, report: &mut ReclaimReport) -> EntryOutcome {
        if report.skipped.iter().any(|seen| seen == path) {
            return EntryOutcome::Skipped;
        }
        if report.failed.iter().any(|seen| seen == path) {
            return EntryOutcome::Failed;
        }
        if let Some(pid) = owner::live_foreign_owner(path) {
            info!(
                target: WORKSPACE_TARGET,
                workspace = %path.display(),
                owner = pid,
                "workspace owned by a live process; leaving it"
            );
            report.skipped.push(path.to_path_buf());
            return EntryOutcome::Skipped;
        }
        match tree::remove_tree(path) {
            Ok(()) => {
                info!(target: WORKSPACE_TARGET, workspace = %path.display(), "orphan workspace reclaimed");
                report.removed.push(path.to_path_buf());
                EntryOutcome::Removed
            }
            Err(error) => {
                warn!(
                    target: WORKSPACE_TARGET,
                    workspace = %path.display(),
                    %error,
                    "failed to reclaim orphan workspace"
                );
                report.failed.push(path.to_path_buf());
                EntryOutcome::Failed
            }
        }
    }
}
