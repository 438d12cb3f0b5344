//! Lifecycle manager for an auxiliary HTTP service shipped as source.
//!
//! The host materialises the bundled source into a private workspace, builds
//! it with an external toolchain, launches the resulting executable as a
//! supervised child and confirms it stays up before reporting success.
//! Teardown is idempotent and always terminates the child before deleting the
//! workspace it runs from. Workspaces left behind by a host that never ran
//! teardown are reclaimed by the next start.
//!
//! The rest of the host interacts only with [`EmbeddedService`], whose
//! [`EmbeddedService::ensure_running`] and [`EmbeddedService::shutdown`] pair
//! hides the workspace, build output and process handle. The components are
//! public so other hosts can assemble them differently:
//!
//! - [`WorkspaceManager`] provisions, records and reclaims workspaces.
//! - [`BuildOrchestrator`] runs the bounded dependency and compile stages.
//! - [`ProcessSupervisor`] launches, drains and terminates the child.
//! - [`HealthChecker`] confirms liveness and optional HTTP reachability.
//! - [`LifecycleController`] sequences the above under a single mutex.

mod bootstrap;
mod errors;
mod health;
mod lifecycle;
mod process;
mod reporter;
mod service;
#[cfg(unix)]
mod shutdown;
mod telemetry;
mod toolchain;
mod workspace;

pub use bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader};
pub use errors::{FailureKind, LifecycleError};
pub use health::{
    HealthCheckError, HealthChecker, HealthReport, HttpProbe, ProbeError, ReadinessProbe,
};
pub use lifecycle::{ControllerSettings, LifecycleController, LifecycleState, TeardownSummary};
pub use process::{LaunchError, ProcessSupervisor, SupervisedProcess, TerminationOutcome};
pub use reporter::{LifecycleReporter, StructuredLifecycleReporter};
pub use service::{EmbeddedService, ServiceHealth};
#[cfg(unix)]
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
pub use toolchain::{BuildError, BuildOrchestrator, BuildResult, BuildStage, GoToolchain, Toolchain};
pub use workspace::{ReclaimReport, Workspace, WorkspaceError, WorkspaceManager};

#[cfg(test)]
mod tests;
