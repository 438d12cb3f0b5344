use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while provisioning or removing a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The bundled source tree could not be read.
    #[error("source tree '{path}' is unreadable: {source}")]
    SourceUnreadable {
        /// Source root or entry that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The bundled source root is not a directory.
    #[error("source root '{path}' is not a directory")]
    SourceNotDirectory {
        /// Configured source root.
        path: PathBuf,
    },
    /// The workspace directory could not be created.
    #[error("failed to create workspace under '{path}': {source}")]
    Create {
        /// Temporary root the workspace was being created in.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Copying a file or directory into the workspace failed.
    #[error("failed to copy '{from}' to '{to}': {source}")]
    Copy {
        /// Source path.
        from: PathBuf,
        /// Destination path.
        to: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The pointer or owner marker could not be written.
    #[error("failed to write '{path}': {source}")]
    Record {
        /// File being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Teardown left files behind; the next start reclaims them.
    #[error("failed to remove '{path}' completely: {source}")]
    RemovalIncomplete {
        /// Path that could not be removed.
        path: PathBuf,
        /// First IO error encountered.
        #[source]
        source: io::Error,
    },
}
