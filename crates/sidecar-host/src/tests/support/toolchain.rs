//! Shell-script toolchain standing in for `go` in tests.

use std::path::Path;
use std::process::Command;

use crate::toolchain::Toolchain;

const SERVE_FOREVER: &str = "printf '#!/bin/sh\\nexec sleep 300\\n' > \"$OUTPUT\"";

/// Several pipe buffers' worth of lines on both streams.
pub const FLOOD: &str = "yes stdout-line | head -n 20000; yes stderr-line | head -n 20000 >&2";

/// Toolchain whose stages are `/bin/sh -c` scripts.
///
/// The compile script sees the output path as `$OUTPUT` and the entry file as
/// `$ENTRY`.
#[derive(Debug, Clone)]
pub struct ScriptToolchain {
    resolve: String,
    compile: String,
}

impl ScriptToolchain {
    /// Builds a toolchain from two scripts.
    pub fn new(resolve: &str, compile: &str) -> Self {
        Self {
            resolve: resolve.to_owned(),
            compile: compile.to_owned(),
        }
    }

    /// Produces an executable that never exits on its own.
    pub fn serving() -> Self {
        Self::new("echo resolving", SERVE_FOREVER)
    }

    /// Produces an executable that exits straight away.
    pub fn exiting() -> Self {
        Self::new(
            "true",
            "printf '#!/bin/sh\\necho starting\\nexit 3\\n' > \"$OUTPUT\"",
        )
    }

    /// Exits zero without writing the executable.
    pub fn no_artifact() -> Self {
        Self::new("true", "echo compiled nothing")
    }

    /// Both stages write far more output than a pipe buffer holds.
    pub fn noisy() -> Self {
        Self::new(FLOOD, &format!("{FLOOD}; {SERVE_FOREVER}"))
    }

    /// Dependency step that hangs well past any test timeout.
    pub fn hanging_resolve() -> Self {
        Self::new("sleep 30", SERVE_FOREVER)
    }

    /// Compile step that reports an error.
    pub fn failing_compile() -> Self {
        Self::new("true", "echo 'main.go:1: syntax error' >&2; exit 2")
    }

    fn shell(script: &str) -> Command {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(script);
        command
    }
}

impl Toolchain for ScriptToolchain {
    fn program(&self) -> String {
        String::from("/bin/sh")
    }

    fn resolve_command(&self) -> Command {
        Self::shell(&self.resolve)
    }

    fn compile_command(&self, entry_file: &str, output: &Path) -> Command {
        let mut command = Self::shell(&self.compile);
        command.env("OUTPUT", output).env("ENTRY", entry_file);
        command
    }
}
