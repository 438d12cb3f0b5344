//! Signal delivery to supervised process groups.

use std::process::Command;

#[cfg(unix)]
mod imp {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;
    use tracing::debug;

    use crate::process::PROCESS_TARGET;

    fn to_pid(pid: u32) -> Option<Pid> {
        i32::try_from(pid).ok().filter(|raw| *raw > 0).map(Pid::from_raw)
    }

    /// Reports whether `pid` names a live process.
    ///
    /// A process owned by another user still counts as alive.
    pub(crate) fn process_exists(pid: u32) -> bool {
        let Some(target) = to_pid(pid) else {
            return false;
        };
        match kill(target, None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn signal_group(pgid: u32, signal: Signal) -> bool {
        let Some(group) = to_pid(pgid) else {
            return false;
        };
        match killpg(group, signal) {
            Ok(()) => true,
            Err(Errno::ESRCH) => {
                debug!(target: PROCESS_TARGET, pgid, ?signal, "process group already gone");
                false
            }
            Err(errno) => {
                debug!(target: PROCESS_TARGET, pgid, ?signal, %errno, "failed to signal process group");
                false
            }
        }
    }

    /// Asks every process in the group to stop.
    pub(crate) fn request_stop(pgid: u32) -> bool {
        signal_group(pgid, Signal::SIGTERM)
    }

    /// Kills every process in the group.
    pub(crate) fn force_kill(pgid: u32) -> bool {
        signal_group(pgid, Signal::SIGKILL)
    }
}

#[cfg(not(unix))]
mod imp {
    pub(crate) const fn process_exists(_pid: u32) -> bool {
        false
    }

    // No cooperative stop signal exists for console-less children; the
    // caller falls through to `Child::kill`.
    pub(crate) const fn request_stop(_pgid: u32) -> bool {
        false
    }

    pub(crate) const fn force_kill(_pgid: u32) -> bool {
        false
    }
}

pub(crate) use imp::{force_kill, process_exists, request_stop};

/// Places the spawned child in a fresh process group so signals reach its
/// descendants too.
pub(crate) fn isolate_group(command: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = command;
    }
}
