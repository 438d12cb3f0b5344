//! Background liveness polling for a running service.

use std::io;
use std::sync::Weak;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::{LIFECYCLE_TARGET, LifecycleController, LifecycleState};

/// Thread that tears the controller down when its child dies.
#[derive(Debug)]
pub(crate) struct HealthMonitor {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl HealthMonitor {
    pub(crate) fn spawn(
        controller: Weak<LifecycleController>,
        interval: Duration,
    ) -> io::Result<Self> {
        let (stop, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(String::from("service-monitor"))
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    let Some(live) = controller.upgrade() else {
                        break;
                    };
                    if live.state() != LifecycleState::Running {
                        break;
                    }
                    if !live.child_alive() {
                        warn!(
                            target: LIFECYCLE_TARGET,
                            "service process died; tearing down"
                        );
                        live.stop();
                        break;
                    }
                }
                debug!(target: LIFECYCLE_TARGET, "health monitor finished");
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signals the thread and joins it.
    ///
    /// Waits for any teardown the monitor already started.
    pub(crate) fn shutdown(mut self) {
        if self.stop.send(()).is_err() {
            debug!(target: LIFECYCLE_TARGET, "health monitor already stopped");
        }
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!(target: LIFECYCLE_TARGET, "health monitor panicked");
        }
    }
}
