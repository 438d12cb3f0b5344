//! Behavioural switches for readiness probing and failed-start cleanup.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Whether the child's HTTP endpoint is probed after the liveness checks.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProbeMode {
    /// Issue an HTTP GET and treat any response as reachable.
    #[default]
    Http,
    /// Rely on process liveness alone.
    Disabled,
}

impl ProbeMode {
    /// Returns `true` when the HTTP probe runs.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Http)
    }
}

/// What to do with the workspace of a start attempt that failed.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FailedWorkspacePolicy {
    /// Delete the workspace and pointer immediately.
    #[default]
    Cleanup,
    /// Leave the workspace and pointer for inspection; the next start reclaims them.
    Retain,
}

impl FailedWorkspacePolicy {
    /// Returns `true` when a failed workspace is left on disk.
    #[must_use]
    pub const fn retains(self) -> bool {
        matches!(self, Self::Retain)
    }
}
