//! Scoped acquisition of a bundle output path.
//!
//! A bundle is assembled in a hidden sibling directory and renamed over the
//! output path only once every step has succeeded. Until [`StagedBundle::commit`]
//! runs, the previous bundle (if any) stays in place; a guard that is dropped
//! uncommitted removes its staging directory.

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use super::error::{AssemblyStep, ErrorExt, Result};
use crate::bail;
use super::utils::fs as bundle_fs;

/// RAII guard over a bundle being assembled.
#[derive(Debug)]
pub struct StagedBundle {
    staging: PathBuf,
    target: PathBuf,
    committed: bool,
    keep_on_failure: bool,
}

impl StagedBundle {
    /// Creates an empty staging directory next to `target`.
    ///
    /// With `keep_on_failure`, an uncommitted staging directory is left on
    /// disk for inspection instead of being removed.
    pub async fn acquire(target: &Path, keep_on_failure: bool) -> Result<Self> {
        let (parent, name) = match (target.parent(), target.file_name()) {
            (Some(parent), Some(name)) => (parent, name.to_string_lossy()),
            _ => bail!("bundle path {} has no parent directory", target.display()),
        };

        fs::create_dir_all(parent)
            .await
            .fs_context(AssemblyStep::Stage, parent)?;

        let staging = parent.join(format!(".{}.partial-{}", name, Uuid::new_v4()));
        fs::create_dir(&staging)
            .await
            .fs_context(AssemblyStep::Stage, &staging)?;

        log::debug!("Staging {} in {}", target.display(), staging.display());
        Ok(Self {
            staging,
            target: target.to_path_buf(),
            committed: false,
            keep_on_failure,
        })
    }

    /// Directory to assemble into; becomes the bundle root on commit.
    pub fn path(&self) -> &Path {
        &self.staging
    }

    /// Final bundle path.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Replaces any existing bundle with the staged one.
    ///
    /// The previous bundle is moved aside first and restored if the final
    /// rename fails.
    pub async fn commit(mut self) -> Result<PathBuf> {
        let backup = if fs::symlink_metadata(&self.target).await.is_ok() {
            let backup = self.staging.with_file_name(format!(
                ".{}.previous-{}",
                self.target
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                Uuid::new_v4()
            ));
            fs::rename(&self.target, &backup)
                .await
                .fs_context(AssemblyStep::RemoveExisting, &self.target)?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&self.staging, &self.target).await {
            if let Some(backup) = &backup
                && let Err(restore) = fs::rename(backup, &self.target).await
            {
                log::error!(
                    "Failed to restore previous bundle from {}: {}",
                    backup.display(),
                    restore
                );
            }
            return Err(e).fs_context(AssemblyStep::Commit, &self.target);
        }
        self.committed = true;

        if let Some(backup) = backup {
            if backup.is_dir() {
                bundle_fs::remove_dir_all(&backup, AssemblyStep::RemoveExisting).await?;
            } else {
                fs::remove_file(&backup)
                    .await
                    .fs_context(AssemblyStep::RemoveExisting, &backup)?;
            }
        }

        Ok(self.target.clone())
    }
}

impl Drop for StagedBundle {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if self.keep_on_failure {
            log::warn!(
                "Keeping partial bundle for inspection at {}",
                self.staging.display()
            );
            return;
        }
        // Best-effort; Drop must not fail
        if let Err(e) = std::fs::remove_dir_all(&self.staging)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            log::warn!(
                "Failed to clean up staging directory {}: {}",
                self.staging.display(),
                e
            );
        }
    }
}
