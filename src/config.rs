//! `Bundle.toml` loading and command line overrides.
//!
//! The config file's directory is the project root: icon and resource
//! patterns, the toolchain working directory and the output directory all
//! resolve against it. Values given on the command line replace file values
//! before validation runs.

use path_absolutize::Absolutize;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::bundler::{
    Arch, BundleSettings, DEFAULT_ARGS, DEFAULT_ARTIFACT, DEFAULT_ASSETS_DIR, DEFAULT_PROGRAM,
    Settings, SettingsBuilder, ToolchainSettings,
};
use crate::error::{ConfigError, Result};

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Bundle.toml";

/// Architectures built when neither the file nor the command line names any.
pub const DEFAULT_ARCHITECTURES: [Arch; 2] = [Arch::X86_64, Arch::Arm64];

/// Parsed `Bundle.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleFile {
    /// `[bundle]`
    #[serde(default)]
    pub bundle: BundleSection,
    /// `[build]`
    #[serde(default)]
    pub build: BuildSection,
    /// `[output]`
    #[serde(default)]
    pub output: OutputSection,
}

/// `[bundle]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct BundleSection {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub identifier: Option<String>,
    pub version: Option<String>,
    pub short_version: Option<String>,
    pub executable: Option<String>,
    pub icon: Option<PathBuf>,
    #[serde(default)]
    pub resources: Vec<String>,
    pub assets_dir: Option<String>,
    pub minimum_system_version: Option<String>,
    pub category: Option<String>,
    pub copyright: Option<String>,
    pub development_region: Option<String>,
    pub high_resolution: Option<bool>,
}

/// `[build]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct BuildSection {
    pub architectures: Option<Vec<String>>,
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub artifact: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub parallel: Option<bool>,
}

/// `[output]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    /// Directory the `.app` is written to
    pub directory: Option<PathBuf>,
}

/// Values supplied on the command line.
///
/// `None` and empty lists leave the file value in place.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Explicit config file; a missing explicit file is an error
    pub config: Option<PathBuf>,
    /// Output directory, relative to the current directory
    pub output: Option<PathBuf>,
    /// Architecture names
    pub architectures: Vec<String>,
    /// Bundle version
    pub version: Option<String>,
    /// Bundle identifier
    pub identifier: Option<String>,
    /// Bundle name
    pub name: Option<String>,
    /// Reuse existing artifacts
    pub skip_build: bool,
    /// Build architectures one after another
    pub sequential: bool,
    /// Keep a failed staging directory
    pub keep_partial: bool,
}

impl BundleFile {
    /// Reads and parses a config file.
    pub fn read(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Loads the config file, applies overrides and validates the result.
///
/// Without `--config`, a missing `Bundle.toml` is tolerated so a project can
/// be packaged from command line values alone.
///
/// # Errors
///
/// - [`ConfigError`] for unreadable files, parse errors and invalid values
/// - [`crate::bundler::Error::UnsupportedArchitecture`] for an unknown
///   architecture name
pub fn load(overrides: &Overrides) -> Result<Settings> {
    let cwd = std::env::current_dir()?;

    let (config_path, explicit) = match &overrides.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let config_path = absolutize(&config_path, &cwd)?;

    let file = if explicit || config_path.is_file() {
        log::debug!("Loading config from {}", config_path.display());
        BundleFile::read(&config_path)?
    } else {
        log::debug!(
            "No {} found, using command line values only",
            config_path.display()
        );
        BundleFile::default()
    };

    let project_root = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.clone());

    resolve(file, overrides, &project_root, &cwd)
}

/// Merges a parsed file with overrides into validated [`Settings`].
pub fn resolve(
    file: BundleFile,
    overrides: &Overrides,
    project_root: &Path,
    cwd: &Path,
) -> Result<Settings> {
    let BundleFile {
        bundle,
        build,
        output,
    } = file;

    let name = overrides
        .name
        .clone()
        .or(bundle.name)
        .ok_or(ConfigError::Missing { key: "bundle.name" })?;
    let identifier = overrides
        .identifier
        .clone()
        .or(bundle.identifier)
        .ok_or(ConfigError::Missing { key: "bundle.identifier" })?;
    let version = overrides
        .version
        .clone()
        .or(bundle.version)
        .ok_or(ConfigError::Missing { key: "bundle.version" })?;
    let icon = bundle
        .icon
        .ok_or(ConfigError::Missing { key: "bundle.icon" })?;
    let executable = bundle
        .executable
        .unwrap_or_else(|| default_executable(&name));

    let bundle_settings = BundleSettings {
        name,
        display_name: bundle.display_name,
        identifier,
        version,
        short_version: bundle.short_version,
        executable,
        icon,
        resources: bundle.resources,
        assets_dir: bundle
            .assets_dir
            .unwrap_or_else(|| DEFAULT_ASSETS_DIR.to_string()),
        minimum_system_version: bundle.minimum_system_version,
        category: bundle.category,
        copyright: bundle.copyright,
        development_region: bundle.development_region,
        high_resolution: bundle.high_resolution.unwrap_or(true),
    };

    let working_dir = match build.working_dir {
        Some(dir) => absolutize(&dir, project_root)?,
        None => project_root.to_path_buf(),
    };
    let toolchain = ToolchainSettings {
        program: build.program.unwrap_or_else(|| DEFAULT_PROGRAM.to_string()),
        args: build
            .args
            .unwrap_or_else(|| DEFAULT_ARGS.iter().map(|s| s.to_string()).collect()),
        artifact: build
            .artifact
            .unwrap_or_else(|| DEFAULT_ARTIFACT.to_string()),
        working_dir,
        parallel: build.parallel.unwrap_or(true) && !overrides.sequential,
        skip_build: overrides.skip_build,
    };

    let architectures = if !overrides.architectures.is_empty() {
        parse_architectures(&overrides.architectures)?
    } else if let Some(names) = &build.architectures {
        parse_architectures(names)?
    } else {
        DEFAULT_ARCHITECTURES.to_vec()
    };

    let out_dir = match (&overrides.output, output.directory) {
        (Some(dir), _) => absolutize(dir, cwd)?,
        (None, Some(dir)) => absolutize(&dir, project_root)?,
        (None, None) => project_root.join("target/bundle"),
    };

    let settings = SettingsBuilder::new()
        .project_root(project_root)
        .out_dir(out_dir)
        .bundle_settings(bundle_settings)
        .toolchain_settings(toolchain)
        .architectures(architectures)
        .keep_partial(overrides.keep_partial)
        .build()?;

    Ok(settings)
}

/// Parses architecture names; unknown names are rejected as unsupported.
fn parse_architectures(names: &[String]) -> Result<Vec<Arch>> {
    names
        .iter()
        .map(|name| Arch::from_str(name).map_err(Into::into))
        .collect()
}

fn default_executable(name: &str) -> String {
    name.trim().to_lowercase().replace(char::is_whitespace, "-")
}

fn absolutize(path: &Path, base: &Path) -> Result<PathBuf> {
    Ok(path.absolutize_from(base)?.into_owned())
}
