//! Error surface of the start sequence.

use thiserror::Error;

use crate::health::HealthCheckError;
use crate::lifecycle::LifecycleState;
use crate::process::LaunchError;
use crate::toolchain::BuildError;
use crate::workspace::WorkspaceError;

/// Failure raised by [`crate::LifecycleController::start`].
///
/// Every variant is fatal to the start sequence; nothing is retried.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The workspace could not be created or populated.
    #[error("workspace provisioning failed: {0}")]
    Provisioning(#[from] WorkspaceError),
    /// A build stage timed out, exited non-zero or produced no artefact.
    #[error("build failed: {0}")]
    Build(#[from] BuildError),
    /// The built executable could not be started.
    #[error("launch failed: {0}")]
    Launch(#[from] LaunchError),
    /// The child exited or stayed unreachable before confirmation.
    #[error("health check failed: {0}")]
    HealthCheck(#[from] HealthCheckError),
    /// Start was requested from a state that cannot start.
    #[error("cannot start the embedded service while {state}")]
    InvalidState {
        /// State observed when start was requested.
        state: LifecycleState,
    },
}

/// Coarse classification of a [`LifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Workspace creation or copy failure.
    Provisioning,
    /// A build stage exceeded its bound.
    BuildTimeout,
    /// A build stage exited non-zero or produced no artefact.
    BuildFailed,
    /// The child could not be started.
    Launch,
    /// The child died or was unreachable during the health check.
    HealthCheck,
    /// The controller was not in a startable state.
    InvalidState,
}

impl FailureKind {
    /// Stable label used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::BuildTimeout => "build-timeout",
            Self::BuildFailed => "build-failed",
            Self::Launch => "launch",
            Self::HealthCheck => "health-check",
            Self::InvalidState => "invalid-state",
        }
    }
}

impl LifecycleError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Provisioning(_) => FailureKind::Provisioning,
            Self::Build(BuildError::Timeout { .. }) => FailureKind::BuildTimeout,
            Self::Build(_) => FailureKind::BuildFailed,
            Self::Launch(_) => FailureKind::Launch,
            Self::HealthCheck(_) => FailureKind::HealthCheck,
            Self::InvalidState { .. } => FailureKind::InvalidState,
        }
    }
}
