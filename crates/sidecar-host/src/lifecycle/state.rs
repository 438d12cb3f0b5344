use std::fmt;

/// Position of the controller in its start and teardown sequence.
///
/// Start walks forward from [`Self::Uninitialized`] to [`Self::Running`];
/// any failure lands in [`Self::Failed`]. Teardown runs from either of those
/// through [`Self::ShuttingDown`] to [`Self::Stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing has happened yet.
    Uninitialized,
    /// Deleting workspaces left by earlier runs.
    ReclaimingOrphans,
    /// Creating and populating the workspace.
    Provisioning,
    /// Running the toolchain.
    Building,
    /// Starting the built executable.
    Launching,
    /// Waiting out the settle and confirmation windows.
    HealthChecking,
    /// The child passed its health check.
    Running,
    /// Teardown is in progress.
    ShuttingDown,
    /// Teardown finished.
    Stopped,
    /// Start failed; partial resources have been released.
    Failed,
}

impl LifecycleState {
    /// Whether the start sequence is still in progress.
    #[must_use]
    pub const fn is_starting(self) -> bool {
        matches!(
            self,
            Self::ReclaimingOrphans
                | Self::Provisioning
                | Self::Building
                | Self::Launching
                | Self::HealthChecking
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::ReclaimingOrphans => "reclaiming orphans",
            Self::Provisioning => "provisioning",
            Self::Building => "building",
            Self::Launching => "launching",
            Self::HealthChecking => "health checking",
            Self::Running => "running",
            Self::ShuttingDown => "shutting down",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
