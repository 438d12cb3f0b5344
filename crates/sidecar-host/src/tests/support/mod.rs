//! Shared fixtures and doubles for the test suites.

mod reporter;
#[cfg(unix)]
mod toolchain;

use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use sidecar_config::{FailedWorkspacePolicy, WorkspaceLayout};

use crate::lifecycle::ControllerSettings;

pub use reporter::{LifecycleEvent, RecordingReporter};
#[cfg(unix)]
pub use toolchain::{FLOOD, ScriptToolchain};

/// Creates a small bundled source tree with a nested directory.
pub fn source_tree() -> TempDir {
    let dir = TempDir::new().expect("create source dir");
    fs::write(dir.path().join("main.go"), "package main\n").expect("write entry file");
    fs::write(dir.path().join("go.mod"), "module soar-web\n").expect("write module file");
    fs::create_dir_all(dir.path().join("static/css")).expect("create nested dir");
    fs::write(dir.path().join("static/css/site.css"), "body {}\n").expect("write nested file");
    dir
}

/// Settings with short windows suitable for tests.
pub fn test_settings(temp_root: &Path, source_root: &Path) -> ControllerSettings {
    ControllerSettings {
        layout: WorkspaceLayout::new(temp_root),
        source_root: source_root.to_path_buf(),
        entry_file: String::from("main.go"),
        launch_args: vec![String::from("--addr"), String::from(":0")],
        build_timeout: Duration::from_secs(10),
        grace_period: Duration::from_secs(2),
        settle_delay: Duration::from_millis(500),
        confirm_window: Duration::from_millis(1_500),
        failed_workspace: FailedWorkspacePolicy::Cleanup,
    }
}

/// Lists workspace directories currently under `temp_root`.
pub fn workspace_dirs(temp_root: &Path) -> Vec<std::path::PathBuf> {
    let layout = WorkspaceLayout::new(temp_root);
    let mut dirs: Vec<_> = fs::read_dir(temp_root)
        .expect("read temp root")
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| layout.is_workspace_name(name))
        })
        .collect();
    dirs.sort();
    dirs
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    condition()
}
