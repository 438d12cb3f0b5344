use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The two independently bounded build stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// Fetching and tidying module dependencies.
    ResolveDependencies,
    /// Compiling the entry file into the service executable.
    Compile,
}

impl BuildStage {
    /// Short label used in logs and output origins.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ResolveDependencies => "resolve",
            Self::Compile => "compile",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolveDependencies => f.write_str("dependency resolution"),
            Self::Compile => f.write_str("compilation"),
        }
    }
}

/// Errors raised by the build stages.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The stage did not finish within its bound and was killed.
    #[error("{stage} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// Stage that timed out.
        stage: BuildStage,
        /// Bound that was exceeded.
        timeout: Duration,
    },
    /// The toolchain exited unsuccessfully.
    #[error("{stage} exited with {}: {stderr_tail}", exit_label(.code))]
    NonZeroExit {
        /// Stage that failed.
        stage: BuildStage,
        /// Exit code, absent when the toolchain was killed by a signal.
        code: Option<i32>,
        /// Last lines written to stderr.
        stderr_tail: String,
    },
    /// The compile stage exited zero without producing the executable.
    #[error("compilation reported success but '{path}' was not produced")]
    MissingArtifact {
        /// Expected executable path.
        path: PathBuf,
    },
    /// The toolchain could not be started.
    #[error("failed to start {stage} with '{program}': {source}")]
    Spawn {
        /// Stage being started.
        stage: BuildStage,
        /// Toolchain program.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Waiting on the toolchain or preparing the artefact failed.
    #[error("{stage} failed at '{path}': {source}")]
    Io {
        /// Stage in progress.
        stage: BuildStage,
        /// Path involved, the workspace when none is more specific.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| String::from("a signal"), |value| format!("status {value}"))
}
