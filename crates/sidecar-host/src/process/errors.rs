use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while starting the supervised child.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The executable does not exist.
    #[error("executable '{path}' does not exist")]
    MissingExecutable {
        /// Expected executable path.
        path: PathBuf,
    },
    /// The operating system refused to start the executable.
    #[error("failed to start '{path}': {source}")]
    Spawn {
        /// Executable path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A pipe or reader thread could not be set up.
    #[error("failed to capture {stream} of '{path}': {source}")]
    Capture {
        /// Executable path.
        path: PathBuf,
        /// Stream being captured.
        stream: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
