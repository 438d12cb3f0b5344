//! Shared configuration for the embedded service lifecycle manager.
//!
//! Configuration is layered with [`ortho_config`]: built-in defaults are
//! overridden by a configuration file, then by `SIDECAR_*` environment
//! variables, then by command-line flags. The resolved [`Config`] exposes
//! accessor methods so callers never depend on field layout, and
//! [`WorkspaceLayout`] derives the on-disk names the lifecycle manager agrees
//! on across restarts.

mod defaults;
mod layout;
mod logging;
mod policy;

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_BUILD_TIMEOUT_SECS, DEFAULT_CONFIRM_WINDOW_MS, DEFAULT_ENTRY_FILE, DEFAULT_GOPROXY,
    DEFAULT_GRACE_PERIOD_MS, DEFAULT_HEALTH_PATH, DEFAULT_LOG_FILTER, DEFAULT_MONITOR_INTERVAL_MS,
    DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_SERVICE_PORT, DEFAULT_SETTLE_DELAY_MS, DEFAULT_SOURCE_ROOT,
    DEFAULT_TOOLCHAIN, default_log_filter, default_log_format, default_temp_root,
};
pub use layout::{EXECUTABLE_NAME, POINTER_FILE_NAME, WORKSPACE_PREFIX, WorkspaceLayout};
pub use logging::{LogFormat, LogFormatParseError};
pub use policy::{FailedWorkspacePolicy, ProbeMode};

/// Resolved configuration for the embedded service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SIDECAR")]
pub struct Config {
    /// Port the child binds, passed as `--addr [host]:port`.
    #[serde(default = "defaults::service_port")]
    #[ortho_config(default = defaults::service_port())]
    pub service_port: u16,
    /// Optional bind host; empty means all interfaces (`:port`).
    #[serde(default)]
    #[ortho_config(default = String::new())]
    pub service_host: String,
    /// Upper bound, in seconds, for each build stage.
    #[serde(default = "defaults::build_timeout_secs")]
    #[ortho_config(default = defaults::build_timeout_secs())]
    pub build_timeout_secs: u64,
    /// Graceful termination window in milliseconds.
    #[serde(default = "defaults::grace_period_ms")]
    #[ortho_config(default = defaults::grace_period_ms())]
    pub grace_period_ms: u64,
    /// Settle window after launch in milliseconds.
    #[serde(default = "defaults::settle_delay_ms")]
    #[ortho_config(default = defaults::settle_delay_ms())]
    pub settle_delay_ms: u64,
    /// Confirmation window following the settle window, in milliseconds.
    #[serde(default = "defaults::confirm_window_ms")]
    #[ortho_config(default = defaults::confirm_window_ms())]
    pub confirm_window_ms: u64,
    /// Whether the child's HTTP port is probed after the liveness checks.
    #[serde(default)]
    #[ortho_config(default = ProbeMode::Http)]
    pub readiness_probe: ProbeMode,
    /// Path requested by the readiness probe.
    #[serde(default = "defaults::health_path")]
    #[ortho_config(default = defaults::health_path())]
    pub health_path: String,
    /// Readiness probe timeout in milliseconds.
    #[serde(default = "defaults::probe_timeout_ms")]
    #[ortho_config(default = defaults::probe_timeout_ms())]
    pub probe_timeout_ms: u64,
    /// Background liveness monitor period in milliseconds; zero disables it.
    #[serde(default = "defaults::monitor_interval_ms")]
    #[ortho_config(default = defaults::monitor_interval_ms())]
    pub monitor_interval_ms: u64,
    /// Bundled source tree copied into each workspace.
    #[serde(default = "defaults::source_root")]
    #[ortho_config(default = defaults::source_root())]
    pub source_root: Utf8PathBuf,
    /// Compile target, relative to the workspace root.
    #[serde(default = "defaults::entry_file")]
    #[ortho_config(default = defaults::entry_file())]
    pub entry_file: String,
    /// Toolchain executable used for dependency resolution and compilation.
    #[serde(default = "defaults::toolchain")]
    #[ortho_config(default = defaults::toolchain())]
    pub toolchain: Utf8PathBuf,
    /// Module proxy exported to the toolchain; empty leaves the environment untouched.
    #[serde(default = "defaults::goproxy")]
    #[ortho_config(default = defaults::goproxy())]
    pub goproxy: String,
    /// Directory holding workspaces and the pointer file.
    #[serde(default = "defaults::default_temp_root")]
    #[ortho_config(default = defaults::default_temp_root())]
    pub temp_root: Utf8PathBuf,
    /// What happens to a workspace whose start sequence failed.
    #[serde(default)]
    #[ortho_config(default = FailedWorkspacePolicy::Cleanup)]
    pub failed_workspace: FailedWorkspacePolicy,
    /// Tracing filter expression.
    #[serde(default = "defaults::log_filter_string")]
    #[ortho_config(default = defaults::log_filter_string())]
    pub log_filter: String,
    /// Tracing output format.
    #[serde(default = "defaults::default_log_format")]
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_port: DEFAULT_SERVICE_PORT,
            service_host: String::new(),
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            confirm_window_ms: DEFAULT_CONFIRM_WINDOW_MS,
            readiness_probe: ProbeMode::default(),
            health_path: defaults::health_path(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            monitor_interval_ms: DEFAULT_MONITOR_INTERVAL_MS,
            source_root: defaults::source_root(),
            entry_file: defaults::entry_file(),
            toolchain: defaults::toolchain(),
            goproxy: defaults::goproxy(),
            temp_root: default_temp_root(),
            failed_workspace: FailedWorkspacePolicy::default(),
            log_filter: defaults::log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Resolves the configuration from `args`, the `SIDECAR_*` environment
    /// and any configuration file, layered over the built-in defaults.
    ///
    /// `args` is the full command line, program name first.
    ///
    /// # Errors
    ///
    /// Returns the loader's aggregated error when a layer fails to parse.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Port handed to the child process.
    #[must_use]
    pub const fn service_port(&self) -> u16 {
        self.service_port
    }

    /// Bind address in the child's `--addr` format.
    ///
    /// An empty host yields `:PORT`, which the child reads as "all interfaces".
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service_host.trim(), self.service_port)
    }

    /// Host the readiness probe connects to.
    #[must_use]
    pub fn probe_host(&self) -> &str {
        let host = self.service_host.trim();
        if host.is_empty() || host == "0.0.0.0" {
            "127.0.0.1"
        } else {
            host
        }
    }

    /// Bound applied to each build stage, in seconds.
    #[must_use]
    pub const fn build_timeout_secs(&self) -> u64 {
        self.build_timeout_secs
    }

    /// Graceful termination window, in milliseconds.
    #[must_use]
    pub const fn grace_period_ms(&self) -> u64 {
        self.grace_period_ms
    }

    /// Settle window after launch, in milliseconds.
    #[must_use]
    pub const fn settle_delay_ms(&self) -> u64 {
        self.settle_delay_ms
    }

    /// Confirmation window, in milliseconds.
    #[must_use]
    pub const fn confirm_window_ms(&self) -> u64 {
        self.confirm_window_ms
    }

    /// Readiness probe mode.
    #[must_use]
    pub const fn readiness_probe(&self) -> ProbeMode {
        self.readiness_probe
    }

    /// Path requested by the readiness probe.
    #[must_use]
    pub fn health_path(&self) -> &str {
        self.health_path.as_str()
    }

    /// Readiness probe timeout, in milliseconds.
    #[must_use]
    pub const fn probe_timeout_ms(&self) -> u64 {
        self.probe_timeout_ms
    }

    /// Liveness monitor period, in milliseconds.
    #[must_use]
    pub const fn monitor_interval_ms(&self) -> u64 {
        self.monitor_interval_ms
    }

    /// Bundled source tree.
    #[must_use]
    pub fn source_root(&self) -> &Utf8PathBuf {
        &self.source_root
    }

    /// Compile target relative to the workspace root.
    #[must_use]
    pub fn entry_file(&self) -> &str {
        self.entry_file.as_str()
    }

    /// Toolchain executable.
    #[must_use]
    pub fn toolchain(&self) -> &Utf8PathBuf {
        &self.toolchain
    }

    /// Module proxy exported to the toolchain, if any.
    #[must_use]
    pub fn goproxy(&self) -> Option<&str> {
        let proxy = self.goproxy.trim();
        (!proxy.is_empty()).then_some(proxy)
    }

    /// Directory holding workspaces and the pointer file.
    #[must_use]
    pub fn temp_root(&self) -> &Utf8PathBuf {
        &self.temp_root
    }

    /// Policy for workspaces left behind by a failed start.
    #[must_use]
    pub const fn failed_workspace(&self) -> FailedWorkspacePolicy {
        self.failed_workspace
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Tracing output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Derives the on-disk workspace layout.
    #[must_use]
    pub fn workspace_layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::new(self.temp_root.as_std_path())
    }

    /// Rejects values that can never produce a working service.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.build_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "build_timeout_secs",
            });
        }
        if self.grace_period_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "grace_period_ms",
            });
        }
        if !self.health_path.starts_with('/') {
            return Err(ConfigError::RelativeHealthPath {
                path: self.health_path.clone(),
            });
        }
        if self.entry_file.trim().is_empty() {
            return Err(ConfigError::EmptyEntryFile);
        }
        Ok(())
    }
}

/// Semantic problems detected in an otherwise well-formed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The service port was zero.
    #[error("service_port must be non-zero")]
    ZeroPort,
    /// A bounded wait was configured as zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Name of the offending field.
        field: &'static str,
    },
    /// The readiness path did not start with a slash.
    #[error("health_path '{path}' must start with '/'")]
    RelativeHealthPath {
        /// Configured path.
        path: String,
    },
    /// No compile target was configured.
    #[error("entry_file must not be empty")]
    EmptyEntryFile,
}

#[cfg(test)]
mod tests;
