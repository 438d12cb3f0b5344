//! The one-line pointer file naming the most recent workspace.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;

/// Records `workspace` in the pointer file, replacing it atomically.
pub(super) fn write(pointer: &Path, workspace: &Path) -> io::Result<()> {
    let directory = pointer.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "pointer path did not have a parent directory",
        )
    })?;
    let mut file = Builder::new()
        .prefix(".soar-web-pointer")
        .tempfile_in(directory)?;
    writeln!(file, "{}", workspace.display())?;
    file.as_file().sync_all()?;
    file.persist(pointer).map_err(|error| error.error)?;
    Ok(())
}

/// Reads the recorded workspace path, if the pointer exists and is non-empty.
pub(super) fn read(pointer: &Path) -> Option<PathBuf> {
    let content = fs::read_to_string(pointer).ok()?;
    let recorded = content.lines().next()?.trim();
    (!recorded.is_empty()).then(|| PathBuf::from(recorded))
}

/// Whether the pointer currently names `workspace`.
pub(super) fn points_at(pointer: &Path, workspace: &Path) -> bool {
    read(pointer).is_some_and(|recorded| recorded == workspace)
}

/// Deletes the pointer; a missing pointer is not an error.
pub(super) fn remove(pointer: &Path) -> io::Result<()> {
    match fs::remove_file(pointer) {
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
