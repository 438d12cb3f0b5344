//! Toolchain invocation for the two build stages.

mod errors;
mod orchestrator;

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

pub use errors::{BuildError, BuildStage};
#[cfg(test)]
pub(crate) use orchestrator::abandon_stage;
pub use orchestrator::{BuildOrchestrator, BuildResult};

/// Log target for build orchestration.
pub(crate) const BUILD_TARGET: &str = "sidecar_host::build";

/// Builds the commands for each build stage.
///
/// Implementations only describe the commands; working directory, pipes and
/// timeouts are applied by [`BuildOrchestrator`].
pub trait Toolchain: Send + Sync {
    /// Program name used in logs and errors.
    fn program(&self) -> String;

    /// Command that fetches module dependencies.
    fn resolve_command(&self) -> Command;

    /// Command that compiles `entry_file` into `output`.
    fn compile_command(&self, entry_file: &str, output: &Path) -> Command;
}

/// The Go toolchain: `go mod tidy` followed by `go build -o <output> <entry>`.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: OsString,
    goproxy: Option<String>,
}

impl GoToolchain {
    /// Uses `program` as the `go` executable and exports `goproxy` as
    /// `GOPROXY` when set.
    #[must_use]
    pub fn new(program: impl Into<OsString>, goproxy: Option<String>) -> Self {
        Self {
            program: program.into(),
            goproxy,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(proxy) = &self.goproxy {
            command.env("GOPROXY", proxy);
        }
        command
    }
}

impl Toolchain for GoToolchain {
    fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn resolve_command(&self) -> Command {
        let mut command = self.command();
        command.args(["mod", "tidy"]);
        command
    }

    fn compile_command(&self, entry_file: &str, output: &Path) -> Command {
        let mut command = self.command();
        command.arg("build").arg("-o").arg(output).arg(entry_file);
        command
    }
}
