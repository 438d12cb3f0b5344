//! The `ensure_running`/`shutdown` surface used by the rest of the host.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;

use sidecar_config::Config;

use crate::errors::LifecycleError;
use crate::health::{HttpProbe, ReadinessProbe};
use crate::lifecycle::{
    ControllerSettings, HealthMonitor, LIFECYCLE_TARGET, LifecycleController, LifecycleState,
};
use crate::reporter::LifecycleReporter;
use crate::toolchain::GoToolchain;

/// Point-in-time view of the embedded service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceHealth {
    state: LifecycleState,
    alive: bool,
    http_status: Option<u16>,
}

impl ServiceHealth {
    /// Controller state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether the child process is alive.
    #[must_use]
    pub const fn alive(&self) -> bool {
        self.alive
    }

    /// Status answered by the readiness probe; `None` when probing is
    /// disabled, the child is down, or nothing answered.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        self.http_status
    }
}

/// The embedded service as seen by its host.
///
/// Callers never see the workspace, build output or process handle. Dropping
/// the service shuts it down.
#[derive(Debug)]
pub struct EmbeddedService {
    controller: Arc<LifecycleController>,
    monitor_interval: Option<Duration>,
    monitor: Mutex<Option<HealthMonitor>>,
}

impl EmbeddedService {
    /// Wraps `controller`, polling liveness every `monitor_interval` once running.
    #[must_use]
    pub fn new(controller: LifecycleController, monitor_interval: Option<Duration>) -> Self {
        Self {
            controller: Arc::new(controller),
            monitor_interval,
            monitor: Mutex::new(None),
        }
    }

    /// Builds the service from configuration with the Go toolchain.
    #[must_use]
    pub fn from_config(config: &Config, reporter: Arc<dyn LifecycleReporter>) -> Self {
        let toolchain = GoToolchain::new(
            config.toolchain().as_std_path(),
            config.goproxy().map(str::to_owned),
        );
        let probe = config.readiness_probe().is_enabled().then(|| {
            let http = HttpProbe::new(
                config.probe_host(),
                config.service_port(),
                config.health_path(),
                Duration::from_millis(config.probe_timeout_ms()),
            );
            Arc::new(http) as Arc<dyn ReadinessProbe>
        });
        let controller = LifecycleController::new(
            ControllerSettings::from_config(config),
            Box::new(toolchain),
            probe,
            reporter,
        );
        let interval = match config.monitor_interval_ms() {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        };
        Self::new(controller, interval)
    }

    /// Starts the service unless it is already running.
    ///
    /// # Errors
    ///
    /// Returns the [`LifecycleError`] of a failed start; the host should
    /// treat it as fatal.
    pub fn ensure_running(&self) -> Result<(), LifecycleError> {
        self.controller.start()?;
        self.start_monitor();
        Ok(())
    }

    /// Stops the monitor, then tears the service down. Idempotent.
    pub fn shutdown(&self) {
        let monitor = self
            .monitor
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        if let Some(running) = monitor {
            running.shutdown();
        }
        self.controller.stop();
    }

    /// Current controller state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.controller.state()
    }

    /// Reports liveness and, when probing is enabled, the HTTP status.
    #[must_use]
    pub fn health(&self) -> ServiceHealth {
        let alive = self.controller.child_alive();
        let http_status = if alive {
            self.controller
                .probe_readiness()
                .and_then(|outcome| outcome.ok())
        } else {
            None
        };
        ServiceHealth {
            state: self.controller.state(),
            alive,
            http_status,
        }
    }

    /// Controller backing the service.
    #[must_use]
    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    fn start_monitor(&self) {
        let Some(interval) = self.monitor_interval else {
            return;
        };
        let mut slot = self.monitor.lock().unwrap_or_else(|poison| poison.into_inner());
        if slot.is_some() || !self.controller.is_running() {
            return;
        }
        match HealthMonitor::spawn(Arc::downgrade(&self.controller), interval) {
            Ok(monitor) => *slot = Some(monitor),
            Err(error) => warn!(
                target: LIFECYCLE_TARGET,
                %error,
                "failed to start health monitor; continuing without it"
            ),
        }
    }
}

impl Drop for EmbeddedService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
