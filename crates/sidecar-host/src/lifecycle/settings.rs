use std::path::PathBuf;
use std::time::Duration;

use sidecar_config::{Config, FailedWorkspacePolicy, WorkspaceLayout};

/// Inputs the controller needs beyond its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Where workspaces and the pointer file live.
    pub layout: WorkspaceLayout,
    /// Bundled source tree copied into each workspace.
    pub source_root: PathBuf,
    /// Compile target relative to the workspace root.
    pub entry_file: String,
    /// Arguments passed to the service executable.
    pub launch_args: Vec<String>,
    /// Bound for each build stage.
    pub build_timeout: Duration,
    /// Graceful stop wait, reused for the forced-kill wait.
    pub grace_period: Duration,
    /// First health window after launch.
    pub settle_delay: Duration,
    /// Second health window.
    pub confirm_window: Duration,
    /// Whether a failed start leaves its workspace behind.
    pub failed_workspace: FailedWorkspacePolicy,
}

impl ControllerSettings {
    /// Derives settings from the resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            layout: config.workspace_layout(),
            source_root: config.source_root().as_std_path().to_path_buf(),
            entry_file: config.entry_file().to_owned(),
            launch_args: vec![String::from("--addr"), config.bind_address()],
            build_timeout: Duration::from_secs(config.build_timeout_secs()),
            grace_period: Duration::from_millis(config.grace_period_ms()),
            settle_delay: Duration::from_millis(config.settle_delay_ms()),
            confirm_window: Duration::from_millis(config.confirm_window_ms()),
            failed_workspace: config.failed_workspace(),
        }
    }
}
