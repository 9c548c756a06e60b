//! File system utilities for bundling.
//!
//! Every failure is reported as [`Error::AssemblyFailure`] with the step
//! passed in by the caller and the path that failed.

use crate::bundler::error::{AssemblyStep, Error, ErrorExt, Result};
use std::{io, path::Path};
use tokio::fs;

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path, step: AssemblyStep) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).fs_context(step, path),
    }
}

/// Makes a symbolic link to a directory.
#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a directory.
#[cfg(windows)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(unix)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(windows)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path, step: AssemblyStep) -> Result<()> {
    if !from.is_file() {
        return Err(Error::AssemblyFailure {
            step,
            path: from.to_path_buf(),
            error: io::Error::new(io::ErrorKind::NotFound, "source is not a regular file"),
        });
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir).await.fs_context(step, dest_dir)?;
    }
    fs::copy(from, to).await.fs_context(step, to)?;
    Ok(())
}

/// Recursively copies a directory from one path to another, creating any
/// parent directories of the destination path as necessary.
///
/// Preserves symlinks on platforms that support them.
pub async fn copy_dir(from: &Path, to: &Path, step: AssemblyStep) -> Result<()> {
    if !from.is_dir() {
        return Err(Error::AssemblyFailure {
            step,
            path: from.to_path_buf(),
            error: io::Error::new(io::ErrorKind::NotFound, "source is not a directory"),
        });
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await.fs_context(step, parent)?;
    }

    for entry in walkdir::WalkDir::new(from).sort_by_file_name() {
        let entry = entry?;
        let rel_path = entry.path().strip_prefix(from)?;
        let dest_path = to.join(rel_path);

        if entry.file_type().is_symlink() {
            let target = fs::read_link(entry.path())
                .await
                .fs_context(step, entry.path())?;
            if entry.path().is_dir() {
                symlink_dir(&target, &dest_path).fs_context(step, &dest_path)?;
            } else {
                symlink_file(&target, &dest_path).fs_context(step, &dest_path)?;
            }
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .await
                .fs_context(step, &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)
                .await
                .fs_context(step, &dest_path)?;
        }
    }

    Ok(())
}

/// Marks a file as executable (`0755`).
#[cfg(unix)]
pub async fn set_executable(path: &Path, step: AssemblyStep) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .fs_context(step, path)
}

/// Marks a file as executable (no-op off unix).
#[cfg(not(unix))]
pub async fn set_executable(_path: &Path, _step: AssemblyStep) -> Result<()> {
    Ok(())
}
