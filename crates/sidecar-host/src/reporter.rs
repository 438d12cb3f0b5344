//! Structured reporting of lifecycle transitions.

use std::sync::Arc;

use crate::errors::LifecycleError;
use crate::health::HealthReport;
use crate::lifecycle::{LIFECYCLE_TARGET, LifecycleState, TeardownSummary};

/// Observer notified as the controller moves through its states.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked whenever the controller enters `state`.
    fn stage_entered(&self, state: LifecycleState);

    /// Invoked once the child passed its health check.
    fn service_running(&self, pid: u32, report: &HealthReport);

    /// Invoked when the start sequence fails, before partial resources are released.
    fn start_failed(&self, error: &LifecycleError);

    /// Invoked after a teardown released resources.
    fn teardown_completed(&self, summary: &TeardownSummary);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter,
{
    fn stage_entered(&self, state: LifecycleState) {
        (**self).stage_entered(state);
    }

    fn service_running(&self, pid: u32, report: &HealthReport) {
        (**self).service_running(pid, report);
    }

    fn start_failed(&self, error: &LifecycleError) {
        (**self).start_failed(error);
    }

    fn teardown_completed(&self, summary: &TeardownSummary) {
        (**self).teardown_completed(summary);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn stage_entered(&self, state: LifecycleState) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "stage_entered",
            state = %state,
            "lifecycle stage entered"
        );
    }

    fn service_running(&self, pid: u32, report: &HealthReport) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "service_running",
            pid,
            liveness_checks = report.liveness_checks(),
            http_status = ?report.http_status(),
            "embedded service running"
        );
    }

    fn start_failed(&self, error: &LifecycleError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "start_failed",
            kind = error.kind().label(),
            error = %error,
            "embedded service failed to start"
        );
    }

    fn teardown_completed(&self, summary: &TeardownSummary) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "teardown_completed",
            termination = ?summary.termination(),
            workspace_removed = summary.workspace_removed(),
            workspace_retained = summary.workspace_retained(),
            "embedded service torn down"
        );
    }
}
