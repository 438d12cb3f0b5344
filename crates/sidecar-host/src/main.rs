//! Host binary that keeps the embedded service up until it is told to stop.
//!
//! Loads configuration, initialises telemetry, starts the service and waits
//! for a termination signal before tearing it down.

use std::error::Error;
use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use sidecar_host::{
    ConfigLoader, EmbeddedService, StructuredLifecycleReporter, SystemConfigLoader,
    initialise_telemetry,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(io::stderr(), "sidecar-host: {error}"));
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<OsString> = std::env::args_os().collect();
    let config = SystemConfigLoader.load(&args)?;
    config.validate()?;
    initialise_telemetry(&config)?;

    let service = EmbeddedService::from_config(&config, Arc::new(StructuredLifecycleReporter::new()));
    service.ensure_running()?;
    let waited = wait_for_shutdown();
    service.shutdown();
    waited
}

#[cfg(unix)]
fn wait_for_shutdown() -> Result<(), Box<dyn Error>> {
    use sidecar_host::{ShutdownSignal, SystemShutdownSignal};

    SystemShutdownSignal.wait()?;
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown() -> Result<(), Box<dyn Error>> {
    // Without POSIX signals, end of standard input stands in for shutdown.
    let mut sink = String::new();
    while io::stdin().read_line(&mut sink)? > 0 {
        sink.clear();
    }
    Ok(())
}
