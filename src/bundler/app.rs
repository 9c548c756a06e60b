//! macOS application bundle (.app) assembly.
//!
//! Produces the standard layout:
//!
//! ```text
//! <Name>.app/
//!   Contents/
//!     Info.plist
//!     MacOS/
//!       <executable>
//!       <assets_dir>/...
//!     Resources/
//!       <icon>
//! ```
//!
//! Everything is written into a [`StagedBundle`]; the output path only ever
//! holds the previous bundle or the complete new one.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;

use super::descriptor::BundleDescriptor;
use super::error::{AssemblyStep, Error, ErrorExt, Result};
use super::resources::{self, ResourcePlan};
use super::settings::Settings;
use super::staging::StagedBundle;
use super::universal::MergedExecutable;
use super::utils::fs;

/// A committed application bundle.
#[derive(Clone, Debug, Serialize)]
pub struct AppBundle {
    /// Bundle root, `<out_dir>/<Name>.app`
    pub path: PathBuf,
    /// `Contents/MacOS/<executable>`
    pub executable: PathBuf,
    /// `Contents/Info.plist`
    pub info_plist: PathBuf,
    /// Copied resources, in copy order
    pub resources: Vec<PathBuf>,
}

/// Bundles the merged executable for the project described by `settings`.
///
/// Resources are resolved before anything is written, so an unmatched pattern
/// leaves the output directory exactly as it was.
pub async fn bundle_project(
    settings: &Settings,
    merged: &MergedExecutable,
) -> Result<AppBundle> {
    let plan = ResourcePlan::resolve(settings)?;
    let descriptor = BundleDescriptor::from_settings(settings.bundle());

    assemble(
        &settings.bundle_path(),
        merged,
        &descriptor,
        &plan,
        &settings.bundle().assets_dir,
        settings.keep_partial(),
    )
    .await
}

/// Assembles a bundle at `bundle_path` from already resolved inputs.
///
/// # Errors
///
/// - [`Error::ResourceConflict`] if the descriptor names an icon the plan does
///   not provide
/// - [`Error::AssemblyFailure`] naming the step and path of any filesystem
///   failure
pub async fn assemble(
    bundle_path: &Path,
    merged: &MergedExecutable,
    descriptor: &BundleDescriptor,
    plan: &ResourcePlan,
    assets_dir: &str,
    keep_partial: bool,
) -> Result<AppBundle> {
    if plan.icon_file_name().as_deref() != Some(descriptor.icon_file.as_str()) {
        return Err(Error::ResourceConflict(format!(
            "Info.plist names icon '{}' but the bundle would contain {}",
            descriptor.icon_file,
            plan.icon.display()
        )));
    }

    log::info!(
        "Bundling {} at {}",
        descriptor.name,
        bundle_path.display()
    );

    let staged = StagedBundle::acquire(bundle_path, keep_partial).await?;

    let contents_dir = staged.path().join("Contents");
    let macos_dir = contents_dir.join("MacOS");
    let resources_dir = contents_dir.join("Resources");

    for dir in [&macos_dir, &resources_dir] {
        tokio_fs::create_dir_all(dir)
            .await
            .fs_context(AssemblyStep::CreateSkeleton, dir)?;
    }

    let mut copied = resources::copy_into(std::slice::from_ref(&plan.icon), &resources_dir).await?;
    if !plan.assets.is_empty() {
        copied.extend(resources::copy_into(&plan.assets, &macos_dir.join(assets_dir)).await?);
    }

    let executable = macos_dir.join(&descriptor.executable);
    fs::copy_file(&merged.path, &executable, AssemblyStep::CopyExecutable).await?;
    fs::set_executable(&executable, AssemblyStep::CopyExecutable).await?;

    let info_plist = contents_dir.join("Info.plist");
    let xml = descriptor.render()?;
    tokio_fs::write(&info_plist, xml)
        .await
        .fs_context(AssemblyStep::WriteDescriptor, &info_plist)?;

    let staging_root = staged.path().to_path_buf();
    let path = staged.commit().await?;

    // Report final locations, not staging ones
    let relocate = |p: &Path| -> PathBuf {
        p.strip_prefix(&staging_root)
            .map(|rel| path.join(rel))
            .unwrap_or_else(|_| p.to_path_buf())
    };

    log::info!("✓ Created {}", path.display());

    Ok(AppBundle {
        executable: relocate(&executable),
        info_plist: relocate(&info_plist),
        resources: copied.iter().map(|p| relocate(p)).collect(),
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::arch::Arch;
    use crate::bundler::universal::FatSlice;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        merged: MergedExecutable,
        descriptor: BundleDescriptor,
        plan: ResourcePlan,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("icon.icns"), b"icns").unwrap();
        std::fs::write(assets.join("sprite1.png"), b"png").unwrap();

        let exe = dir.path().join("clicker-universal");
        std::fs::write(&exe, b"\xca\xfe\xba\xbe fake").unwrap();

        let merged = MergedExecutable {
            path: exe,
            slices: vec![FatSlice {
                arch: Arch::X86_64,
                cpu_type: Arch::X86_64.cpu_type(),
                cpu_subtype: Arch::X86_64.cpu_subtype(),
                offset: 0x1000,
                size: 4,
                align: 12,
            }],
        };

        let descriptor = BundleDescriptor::from_settings(&crate::bundler::BundleSettings {
            name: "Clicker".into(),
            identifier: "org.example.clicker".into(),
            version: "1.0.0".into(),
            executable: "clicker".into(),
            icon: PathBuf::from("assets/icon.icns"),
            ..Default::default()
        });

        let plan = ResourcePlan {
            icon: assets.join("icon.icns"),
            assets: vec![assets.join("sprite1.png")],
        };

        Fixture {
            dir,
            merged,
            descriptor,
            plan,
        }
    }

    #[tokio::test]
    async fn test_assemble_layout() {
        let f = fixture();
        let target = f.dir.path().join("out/Clicker.app");

        let bundle = assemble(&target, &f.merged, &f.descriptor, &f.plan, "assets", false)
            .await
            .unwrap();

        assert_eq!(bundle.path, target);
        assert_eq!(bundle.executable, target.join("Contents/MacOS/clicker"));
        assert!(bundle.executable.is_file());
        assert!(target.join("Contents/Info.plist").is_file());
        assert!(target.join("Contents/Resources/icon.icns").is_file());
        assert!(target.join("Contents/MacOS/assets/sprite1.png").is_file());
        assert!(bundle.resources.iter().all(|p| p.starts_with(&target)));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&bundle.executable)
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[tokio::test]
    async fn test_missing_executable_leaves_no_bundle() {
        let mut f = fixture();
        f.merged.path = f.dir.path().join("never-built");
        let out = f.dir.path().join("out");
        let target = out.join("Clicker.app");

        let err = assemble(&target, &f.merged, &f.descriptor, &f.plan, "assets", false)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::AssemblyFailure { step: AssemblyStep::CopyExecutable, .. }
        ));
        assert!(!target.exists());
        // Staging directory is gone as well
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_icon_mismatch_rejected_before_writing() {
        let mut f = fixture();
        f.descriptor.icon_file = "other.icns".into();
        let target = f.dir.path().join("out/Clicker.app");

        let err = assemble(&target, &f.merged, &f.descriptor, &f.plan, "assets", false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ResourceConflict(_)));
        assert!(!target.parent().unwrap().exists());
    }
}
