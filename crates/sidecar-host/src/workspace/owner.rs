//! Marker recording which host process owns a workspace.
//!
//! The marker holds the owner's pid followed, where the platform exposes
//! it, by the process start time. A pid alone is not an identity: once the
//! owner dies the kernel may hand the same pid to an unrelated process.

use std::fs;
use std::io;
use std::path::Path;
use std::process;

use crate::process::signal;

pub(crate) const OWNER_FILE_NAME: &str = ".owner.pid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Owner {
    pid: u32,
    started: Option<u64>,
}

/// Marker content identifying `pid`.
pub(crate) fn marker_for(pid: u32) -> String {
    match start_time(pid) {
        Some(started) => format!("{pid} {started}\n"),
        None => format!("{pid}\n"),
    }
}

pub(super) fn write(workspace: &Path) -> io::Result<()> {
    fs::write(workspace.join(OWNER_FILE_NAME), marker_for(process::id()))
}

fn read(workspace: &Path) -> Option<Owner> {
    let content = fs::read_to_string(workspace.join(OWNER_FILE_NAME)).ok()?;
    parse(&content)
}

fn parse(content: &str) -> Option<Owner> {
    let mut fields = content.split_whitespace();
    let pid = fields.next()?.parse().ok()?;
    let started = match fields.next() {
        Some(field) => Some(field.parse().ok()?),
        None => None,
    };
    Some(Owner { pid, started })
}

/// Pid of another live process that owns `workspace`, if any.
///
/// Missing or unparsable markers, dead owners and this process all count as
/// no live owner, so the workspace is reclaimable. When the start time of
/// the named pid can be read it must match the recorded one; a reused pid
/// is treated as dead.
pub(super) fn live_foreign_owner(workspace: &Path) -> Option<u32> {
    read(workspace)
        .filter(|owner| owner.pid != process::id() && is_alive(*owner))
        .map(|owner| owner.pid)
}

fn is_alive(owner: Owner) -> bool {
    if !signal::process_exists(owner.pid) {
        return false;
    }
    match start_time(owner.pid) {
        Some(current) => owner.started == Some(current),
        None => true,
    }
}

/// Start time of `pid` in clock ticks since boot.
#[cfg(target_os = "linux")]
fn start_time(pid: u32) -> Option<u64> {
    let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // The command name may contain spaces and parentheses; fields resume
    // after the last closing parenthesis, starting with the state (field 3).
    let (_, rest) = stat.rsplit_once(')')?;
    rest.split_whitespace().nth(19)?.parse().ok()
}

#[cfg(not(target_os = "linux"))]
const fn start_time(_pid: u32) -> Option<u64> {
    None
}

