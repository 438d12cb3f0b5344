use std::env;

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default port the embedded service listens on.
pub const DEFAULT_SERVICE_PORT: u16 = 3000;

/// Default upper bound for each build stage, in seconds.
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 300;

/// Default graceful termination window, in milliseconds.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 5_000;

/// Default settle window after launch, in milliseconds.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

/// Default confirmation window after the settle window, in milliseconds.
pub const DEFAULT_CONFIRM_WINDOW_MS: u64 = 5_000;

/// Default path requested by the readiness probe.
pub const DEFAULT_HEALTH_PATH: &str = "/webui";

/// Default readiness probe timeout, in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Default liveness monitor period, in milliseconds.
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 10_000;

/// Default location of the bundled source tree.
pub const DEFAULT_SOURCE_ROOT: &str = "soar-web";

/// Default compile target inside the workspace.
pub const DEFAULT_ENTRY_FILE: &str = "main.go";

/// Default toolchain executable.
pub const DEFAULT_TOOLCHAIN: &str = "go";

/// Default module proxy handed to the toolchain.
pub const DEFAULT_GOPROXY: &str = "https://goproxy.cn,direct";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Directory that holds workspaces when none is configured.
///
/// Falls back to `/tmp` when the platform temporary directory is not UTF-8.
#[must_use]
pub fn default_temp_root() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

pub(crate) fn log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

pub(crate) const fn service_port() -> u16 {
    DEFAULT_SERVICE_PORT
}

pub(crate) const fn build_timeout_secs() -> u64 {
    DEFAULT_BUILD_TIMEOUT_SECS
}

pub(crate) const fn grace_period_ms() -> u64 {
    DEFAULT_GRACE_PERIOD_MS
}

pub(crate) const fn settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

pub(crate) const fn confirm_window_ms() -> u64 {
    DEFAULT_CONFIRM_WINDOW_MS
}

pub(crate) fn health_path() -> String {
    DEFAULT_HEALTH_PATH.to_owned()
}

pub(crate) const fn probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

pub(crate) const fn monitor_interval_ms() -> u64 {
    DEFAULT_MONITOR_INTERVAL_MS
}

pub(crate) fn source_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_SOURCE_ROOT)
}

pub(crate) fn entry_file() -> String {
    DEFAULT_ENTRY_FILE.to_owned()
}

pub(crate) fn toolchain() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_TOOLCHAIN)
}

pub(crate) fn goproxy() -> String {
    DEFAULT_GOPROXY.to_owned()
}
