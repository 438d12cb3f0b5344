//! Unit tests for configuration defaults, validation and layout.

use std::path::Path;

use rstest::rstest;

use crate::{
    Config, ConfigError, DEFAULT_GOPROXY, DEFAULT_SERVICE_PORT, FailedWorkspacePolicy, LogFormat,
    ProbeMode, WorkspaceLayout,
};

#[rstest]
fn defaults_match_documented_values() {
    let config = Config::default();
    assert_eq!(config.service_port(), DEFAULT_SERVICE_PORT);
    assert_eq!(config.build_timeout_secs(), 300);
    assert_eq!(config.grace_period_ms(), 5_000);
    assert_eq!(config.settle_delay_ms(), 2_000);
    assert_eq!(config.confirm_window_ms(), 5_000);
    assert_eq!(config.health_path(), "/webui");
    assert_eq!(config.readiness_probe(), ProbeMode::Http);
    assert_eq!(config.failed_workspace(), FailedWorkspacePolicy::Cleanup);
    assert_eq!(config.goproxy(), Some(DEFAULT_GOPROXY));
    assert_eq!(config.log_format(), LogFormat::Json);
    assert!(config.validate().is_ok());
}

#[rstest]
fn loading_without_overrides_yields_defaults() {
    let loaded = Config::load_from_iter(["sidecar-host"]).expect("bare command line loads");
    assert_eq!(loaded, Config::default());
}

#[rstest]
#[case("", 3000, ":3000")]
#[case("127.0.0.1", 8080, "127.0.0.1:8080")]
#[case("  ", 9, ":9")]
fn bind_address_follows_child_flag_format(
    #[case] host: &str,
    #[case] port: u16,
    #[case] expected: &str,
) {
    let config = Config {
        service_host: host.to_owned(),
        service_port: port,
        ..Config::default()
    };
    assert_eq!(config.bind_address(), expected);
}

#[rstest]
#[case("", "127.0.0.1")]
#[case("0.0.0.0", "127.0.0.1")]
#[case("localhost", "localhost")]
fn probe_host_avoids_wildcard(#[case] host: &str, #[case] expected: &str) {
    let config = Config {
        service_host: host.to_owned(),
        ..Config::default()
    };
    assert_eq!(config.probe_host(), expected);
}

#[rstest]
fn blank_goproxy_disables_proxy() {
    let config = Config {
        goproxy: "   ".to_owned(),
        ..Config::default()
    };
    assert_eq!(config.goproxy(), None);
}

#[rstest]
fn validate_rejects_zero_port() {
    let config = Config {
        service_port: 0,
        ..Config::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::ZeroPort));
}

#[rstest]
fn validate_rejects_zero_build_timeout() {
    let config = Config {
        build_timeout_secs: 0,
        ..Config::default()
    };
    assert_eq!(
        config.validate(),
        Err(ConfigError::ZeroDuration {
            field: "build_timeout_secs"
        })
    );
}

#[rstest]
fn validate_rejects_relative_health_path() {
    let config = Config {
        health_path: "webui".to_owned(),
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::RelativeHealthPath { .. })
    ));
}

#[rstest]
#[case("json", LogFormat::Json, true)]
#[case("COMPACT", LogFormat::Compact, false)]
fn log_format_parses_case_insensitively(
    #[case] text: &str,
    #[case] expected: LogFormat,
    #[case] structured: bool,
) {
    assert_eq!(text.parse::<LogFormat>().ok(), Some(expected));
    assert_eq!(expected.is_structured(), structured);
}

#[rstest]
#[case("retain", FailedWorkspacePolicy::Retain, true)]
#[case("cleanup", FailedWorkspacePolicy::Cleanup, false)]
fn failed_workspace_policy_parses(
    #[case] text: &str,
    #[case] expected: FailedWorkspacePolicy,
    #[case] retains: bool,
) {
    let parsed = text.parse::<FailedWorkspacePolicy>().ok();
    assert_eq!(parsed, Some(expected));
    assert_eq!(expected.retains(), retains);
}

#[rstest]
fn layout_places_pointer_and_executable() {
    let layout = WorkspaceLayout::new("/var/tmp/sidecar");
    assert_eq!(
        layout.pointer_path(),
        Path::new("/var/tmp/sidecar/soar-web-current.txt")
    );
    let executable = layout.executable_in(Path::new("/var/tmp/sidecar/soar-web-abc"));
    assert!(executable.starts_with("/var/tmp/sidecar/soar-web-abc/bin"));
}

#[rstest]
#[case("soar-web-x1y2", true)]
#[case("soar-web-", false)]
#[case("soar-web-current.txt", false)]
#[case("other-dir", false)]
fn layout_recognises_workspace_names(#[case] name: &str, #[case] expected: bool) {
    let layout = WorkspaceLayout::new("/tmp");
    assert_eq!(layout.is_workspace_name(name), expected);
}
