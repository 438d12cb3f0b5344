//! Recursive copy and bottom-up removal of directory trees.

use std::fs;
use std::io;
use std::path::Path;

use super::errors::WorkspaceError;

/// Copies every entry under `from` into `to`, preserving relative structure.
///
/// Symbolic links are recreated as links rather than followed, so a link
/// pointing back up the tree cannot recurse. Returns the number of files and
/// links copied.
pub(super) fn copy_tree(from: &Path, to: &Path) -> Result<u64, WorkspaceError> {
    let entries = fs::read_dir(from).map_err(|source| WorkspaceError::SourceUnreadable {
        path: from.to_path_buf(),
        source,
    })?;
    let mut copied = 0;
    for item in entries {
        let entry = item.map_err(|source| WorkspaceError::SourceUnreadable {
            path: from.to_path_buf(),
            source,
        })?;
        let source_path = entry.path();
        let target_path = to.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|source| WorkspaceError::SourceUnreadable {
                path: source_path.clone(),
                source,
            })?;
        let copy_error = |source| WorkspaceError::Copy {
            from: source_path.clone(),
            to: target_path.clone(),
            source,
        };
        if file_type.is_symlink() {
            copy_link(&source_path, &target_path).map_err(copy_error)?;
            copied += 1;
        } else if file_type.is_dir() {
            fs::create_dir_all(&target_path).map_err(copy_error)?;
            copied += copy_tree(&source_path, &target_path)?;
        } else {
            fs::copy(&source_path, &target_path).map_err(copy_error)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_link(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from)?;
    std::os::unix::fs::symlink(target, to)
}

#[cfg(not(unix))]
fn copy_link(from: &Path, to: &Path) -> io::Result<()> {
    if fs::metadata(from)?.is_dir() {
        return Err(io::Error::other("directory links are not copied on this platform"));
    }
    fs::copy(from, to).map(|_| ())
}

/// Removes `path` children-first, continuing past failures.
///
/// A missing path is not an error. Returns the first failure, if any, once
/// everything removable has been removed.
pub(super) fn remove_tree(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(error),
    };
    if !metadata.is_dir() {
        return ignore_missing(fs::remove_file(path));
    }

    let mut first_error = None;
    match fs::read_dir(path) {
        Ok(entries) => {
            for entry in entries {
                let outcome = entry.and_then(|dir_entry| remove_tree(&dir_entry.path()));
                if let Err(error) = outcome {
                    first_error.get_or_insert(error);
                }
            }
        }
        Err(error) => {
            first_error.get_or_insert(error);
        }
    }
    if let Err(error) = ignore_missing(fs::remove_dir(path)) {
        first_error.get_or_insert(error);
    }
    first_error.map_or(Ok(()), Err)
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
