//! Post-launch verification of the supervised child.
//!
//! The child is watched through a settle window and then a confirmation
//! window. Liveness is polled throughout so an early exit fails fast, and is
//! checked again at the end of each window. An optional readiness probe then
//! confirms something answers on the child's port.

mod probe;

use std::process::ExitStatus;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::process::SupervisedProcess;

#[cfg(test)]
pub(crate) use probe::MockReadinessProbe;
pub use probe::{HttpProbe, ProbeError, ReadinessProbe};

/// Log target for health checks.
pub(crate) const HEALTH_TARGET: &str = "sidecar_host::health";

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const EXIT_OUTPUT_WAIT: Duration = Duration::from_millis(500);

/// Errors raised while verifying the child.
#[derive(Debug, Error)]
pub enum HealthCheckError {
    /// The child exited before it was confirmed.
    #[error(
        "service exited during the {window} window ({}){}",
        status_label(.status),
        output_label(.output)
    )]
    Exited {
        /// Window in which the exit was observed.
        window: &'static str,
        /// Exit status, when known.
        status: Option<ExitStatus>,
        /// Last lines the child wrote before exiting.
        output: Vec<String>,
    },
    /// The child stayed alive but nothing answered the readiness probe.
    #[error("service is alive but unreachable: {source}")]
    Unreachable {
        /// Probe failure.
        #[source]
        source: ProbeError,
    },
}

fn status_label(status: &Option<ExitStatus>) -> String {
    status.map_or_else(|| String::from("status unknown"), |value| value.to_string())
}

fn output_label(output: &[String]) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(": {}", output.join(" | "))
    }
}

/// What the health check established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    liveness_checks: u8,
    http_status: Option<u16>,
}

impl HealthReport {
    /// Number of window-end liveness confirmations that passed.
    #[must_use]
    pub const fn liveness_checks(&self) -> u8 {
        self.liveness_checks
    }

    /// Status answered by the readiness probe, when it ran.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        self.http_status
    }
}

/// Confirms a freshly launched child stays up.
#[derive(Clone)]
pub struct HealthChecker {
    settle_delay: Duration,
    confirm_window: Duration,
    probe: Option<Arc<dyn ReadinessProbe>>,
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker")
            .field("settle_delay", &self.settle_delay)
            .field("confirm_window", &self.confirm_window)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

impl HealthChecker {
    /// Builds a checker with the two windows and an optional readiness probe.
    #[must_use]
    pub fn new(
        settle_delay: Duration,
        confirm_window: Duration,
        probe: Option<Arc<dyn ReadinessProbe>>,
    ) -> Self {
        Self {
            settle_delay,
            confirm_window,
            probe,
        }
    }

    /// Readiness probe in use, if any.
    #[must_use]
    pub fn probe(&self) -> Option<&Arc<dyn ReadinessProbe>> {
        self.probe.as_ref()
    }

    /// Waits out both windows, confirming liveness at the end of each, then
    /// runs the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns [`HealthCheckError::Exited`] as soon as the child is seen dead
    /// and [`HealthCheckError::Unreachable`] when the probe gets no answer.
    pub fn verify(&self, process: &SupervisedProcess) -> Result<HealthReport, HealthCheckError> {
        let mut liveness_checks = 0;
        let windows = [
            ("settle", self.settle_delay),
            ("confirmation", self.confirm_window),
        ];
        for (window, length) in windows {
            watch(process, window, length)?;
            liveness_checks += 1;
            debug!(target: HEALTH_TARGET, pid = process.pid(), window, "liveness confirmed");
        }

        let http_status = match &self.probe {
            Some(probe) => match probe.probe() {
                Ok(status) => {
                    info!(target: HEALTH_TARGET, pid = process.pid(), status, "service reachable");
                    Some(status)
                }
                Err(source) => {
                    warn!(
                        target: HEALTH_TARGET,
                        pid = process.pid(),
                        error = %source,
                        "service unreachable"
                    );
                    return Err(HealthCheckError::Unreachable { source });
                }
            },
            None => None,
        };

        Ok(HealthReport {
            liveness_checks,
            http_status,
        })
    }
}

fn watch(
    process: &SupervisedProcess,
    window: &'static str,
    length: Duration,
) -> Result<(), HealthCheckError> {
    let deadline = Instant::now() + length;
    loop {
        if !process.is_alive() {
            let output = process.join_output(EXIT_OUTPUT_WAIT);
            let status = process.exit_status();
            warn!(
                target: HEALTH_TARGET,
                pid = process.pid(),
                window,
                ?status,
                "service exited before confirmation"
            );
            return Err(HealthCheckError::Exited {
                window,
                status,
                output,
            });
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}
