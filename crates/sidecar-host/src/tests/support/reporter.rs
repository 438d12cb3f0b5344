//! Test double for [`LifecycleReporter`] that records events for assertions.

use std::sync::Mutex;

use crate::errors::{FailureKind, LifecycleError};
use crate::health::HealthReport;
use crate::lifecycle::{LifecycleState, TeardownSummary};
use crate::reporter::LifecycleReporter;

/// Lifecycle events captured during a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The controller entered a state.
    Stage(LifecycleState),
    /// The service passed its health check.
    Running { pid: u32, report: HealthReport },
    /// Start failed with the given classification.
    StartFailed(FailureKind),
    /// A teardown released resources.
    Teardown(TeardownSummary),
}

/// Records lifecycle events.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }

    /// States entered, in order.
    pub fn stages(&self) -> Vec<LifecycleState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::Stage(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Teardown summaries, in order.
    pub fn teardowns(&self) -> Vec<TeardownSummary> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::Teardown(summary) => Some(summary),
                _ => None,
            })
            .collect()
    }

    /// Health report of the successful start, if any.
    pub fn running_report(&self) -> Option<HealthReport> {
        self.events().into_iter().find_map(|event| match event {
            LifecycleEvent::Running { report, .. } => Some(report),
            _ => None,
        })
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingReporter {
    fn stage_entered(&self, state: LifecycleState) {
        self.record(LifecycleEvent::Stage(state));
    }

    fn service_running(&self, pid: u32, report: &HealthReport) {
        self.record(LifecycleEvent::Running {
            pid,
            report: *report,
        });
    }

    fn start_failed(&self, error: &LifecycleError) {
        self.record(LifecycleEvent::StartFailed(error.kind()));
    }

    fn teardown_completed(&self, summary: &TeardownSummary) {
        self.record(LifecycleEvent::Teardown(*summary));
    }
}
