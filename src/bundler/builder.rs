//! Packaging orchestration.
//!
//! [`Packager`] runs the fixed pipeline for one project:
//!
//! 1. Render a build target per configured architecture
//! 2. Compile every target (concurrently unless disabled)
//! 3. Merge the executables into one fat binary
//! 4. Assemble `<Name>.app` around it
//! 5. Checksum the committed bundle
//!
//! Stages run strictly in order and the first failure ends the run.
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_universal::bundler::{Arch, BundleSettings, Packager, SettingsBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SettingsBuilder::new()
//!     .project_root(".")
//!     .bundle_settings(BundleSettings {
//!         name: "Clicker".into(),
//!         identifier: "org.example.clicker".into(),
//!         version: "1.0.0".into(),
//!         executable: "clicker".into(),
//!         icon: "assets/icon.icns".into(),
//!         ..Default::default()
//!     })
//!     .architectures(vec![Arch::X86_64, Arch::Arm64])
//!     .build()?;
//!
//! let packaged = Packager::new(settings).package().await?;
//! println!("{} ({} bytes)", packaged.path.display(), packaged.size);
//! println!("SHA256: {}", packaged.checksum);
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use super::app::{self, AppBundle};
use super::arch::Arch;
use super::compile;
use super::error::{AssemblyStep, ErrorExt, Result};
use super::settings::Settings;
use super::universal::{self, MergedExecutable};

/// Summary of a successful packaging run.
#[derive(Clone, Debug, Serialize)]
pub struct PackagedBundle {
    /// The committed `.app` directory
    pub path: PathBuf,
    /// Path of the executable inside the bundle
    pub executable: PathBuf,
    /// Architectures of the merged executable, in fat table order
    pub architectures: Vec<Arch>,
    /// Total size of all files in the bundle, in bytes
    pub size: u64,
    /// SHA-256 of the bundle tree
    pub checksum: String,
}

/// Runs the compile → merge → bundle pipeline.
#[derive(Debug)]
pub struct Packager {
    settings: Settings,
}

impl Packager {
    /// Creates a packager for validated settings.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Returns the packager settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs every stage and returns the committed bundle.
    ///
    /// Any stage error is returned unchanged; [`Error::stage`] tells which
    /// stage failed.
    ///
    /// [`Error::stage`]: super::Error::stage
    pub async fn package(&self) -> Result<PackagedBundle> {
        let merged = self.build_universal().await?;
        let bundle = self.assemble(&merged).await?;

        let (size, checksum) = calculate_directory_sha256(&bundle.path).await?;
        log::info!("Bundle checksum: {}", checksum);

        Ok(PackagedBundle {
            path: bundle.path,
            executable: bundle.executable,
            architectures: merged.architectures(),
            size,
            checksum,
        })
    }

    /// Compiles every architecture and merges the results.
    pub async fn build_universal(&self) -> Result<MergedExecutable> {
        let targets = compile::plan_targets(&self.settings)?;
        log::info!(
            "Building {} for {}",
            self.settings.bundle().executable,
            targets
                .iter()
                .map(|t| t.triple())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let artifacts = compile::build_all(&self.settings, &targets).await?;
        universal::create_universal_binary(&artifacts, &self.settings.merged_executable_path())
            .await
    }

    /// Assembles the application bundle around an existing merged executable.
    pub async fn assemble(&self, merged: &MergedExecutable) -> Result<AppBundle> {
        app::bundle_project(&self.settings, merged).await
    }
}

/// Calculates size and SHA-256 of a directory tree.
///
/// Files are visited in sorted path order; each contributes its relative
/// path followed by its content, so the digest covers both layout and data.
pub async fn calculate_directory_sha256(dir_path: &Path) -> Result<(u64, String)> {
    use sha2::{Digest, Sha256};

    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(dir_path).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            entries.push(entry.into_path());
        }
    }
    entries.sort();

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];
    let mut size = 0u64;

    for path in entries {
        let rel_path = path.strip_prefix(dir_path)?;
        hasher.update(rel_path.to_string_lossy().as_bytes());

        let mut file = tokio::fs::File::open(&path)
            .await
            .fs_context(AssemblyStep::Commit, &path)?;
        loop {
            let n = file
                .read(&mut buffer)
                .await
                .fs_context(AssemblyStep::Commit, &path)?;
            if n == 0 {
                break;
            }
            size += n as u64;
            hasher.update(&buffer[..n]);
        }
    }

    Ok((size, format!("{:x}", hasher.finalize())))
}
