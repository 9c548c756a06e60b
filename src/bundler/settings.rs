//! Configuration structures for packaging runs.
//!
//! [`Settings`] is the validated, immutable configuration every stage reads.
//! It is normally produced by [`crate::config::load`], which merges
//! `Bundle.toml` with command line overrides and hands the result to
//! [`SettingsBuilder`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::arch::Arch;

/// Default toolchain program.
pub const DEFAULT_PROGRAM: &str = "cargo";

/// Default toolchain arguments (handlebars templates).
pub const DEFAULT_ARGS: &[&str] = &[
    "build",
    "--release",
    "--target",
    "{{triple}}",
    "--bin",
    "{{bin}}",
];

/// Default artifact path template, relative to the working directory.
pub const DEFAULT_ARTIFACT: &str = "target/{{triple}}/release/{{bin}}";

/// Default destination for assets under `Contents/MacOS`.
pub const DEFAULT_ASSETS_DIR: &str = "assets";

/// Bundle identity and contents.
///
/// Maps to the `[bundle]` section of `Bundle.toml`.
#[derive(Clone, Debug)]
pub struct BundleSettings {
    /// Product name, used for `<name>.app` and `CFBundleName`.
    pub name: String,

    /// Name shown in Finder.
    ///
    /// Default: None (uses `name`)
    pub display_name: Option<String>,

    /// Reverse-domain bundle identifier, e.g. `org.example.clicker`.
    pub identifier: String,

    /// Build version (`CFBundleVersion`), semver.
    pub version: String,

    /// Marketing version (`CFBundleShortVersionString`).
    ///
    /// Default: None (uses `version`)
    pub short_version: Option<String>,

    /// Executable file name inside `Contents/MacOS`, also the cargo `--bin`.
    pub executable: String,

    /// Icon file, copied into `Contents/Resources`.
    pub icon: PathBuf,

    /// Glob patterns of runtime assets, copied into `Contents/MacOS/<assets_dir>`.
    pub resources: Vec<String>,

    /// Destination directory for assets, relative to `Contents/MacOS`.
    ///
    /// Default: `assets`
    pub assets_dir: String,

    /// `LSMinimumSystemVersion`.
    pub minimum_system_version: Option<String>,

    /// `LSApplicationCategoryType`, e.g. `public.app-category.games`.
    pub category: Option<String>,

    /// `NSHumanReadableCopyright`.
    pub copyright: Option<String>,

    /// `CFBundleDevelopmentRegion`.
    pub development_region: Option<String>,

    /// `NSHighResolutionCapable`.
    ///
    /// Default: true
    pub high_resolution: bool,
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            display_name: None,
            identifier: String::new(),
            version: String::new(),
            short_version: None,
            executable: String::new(),
            icon: PathBuf::new(),
            resources: Vec::new(),
            assets_dir: DEFAULT_ASSETS_DIR.to_string(),
            minimum_system_version: None,
            category: None,
            copyright: None,
            development_region: None,
            high_resolution: true,
        }
    }
}

/// How the application is compiled for each architecture.
///
/// Maps to the `[build]` section of `Bundle.toml`.
#[derive(Clone, Debug)]
pub struct ToolchainSettings {
    /// Program to run, resolved on `PATH`.
    pub program: String,

    /// Arguments, rendered per target with `{{triple}}`, `{{arch}}`, `{{bin}}`.
    pub args: Vec<String>,

    /// Artifact path template, relative to `working_dir` unless absolute.
    pub artifact: String,

    /// Directory the toolchain runs in.
    pub working_dir: PathBuf,

    /// Build targets concurrently.
    pub parallel: bool,

    /// Reuse existing artifacts without running the toolchain.
    pub skip_build: bool,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(),
            artifact: DEFAULT_ARTIFACT.to_string(),
            working_dir: PathBuf::from("."),
            parallel: true,
            skip_build: false,
        }
    }
}

/// Validated configuration for a packaging run.
#[derive(Clone, Debug)]
pub struct Settings {
    bundle: BundleSettings,
    toolchain: ToolchainSettings,
    architectures: Vec<Arch>,
    project_root: PathBuf,
    out_dir: PathBuf,
    keep_partial: bool,
}

impl Settings {
    /// Returns the bundle identity settings.
    pub fn bundle(&self) -> &BundleSettings {
        &self.bundle
    }

    /// Returns the toolchain settings.
    pub fn toolchain(&self) -> &ToolchainSettings {
        &self.toolchain
    }

    /// Returns the architectures to build, in configured order.
    pub fn architectures(&self) -> &[Arch] {
        &self.architectures
    }

    /// Returns the project root that relative paths resolve against.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Returns the directory the `.app` is written into.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Returns the final bundle path, `<out_dir>/<name>.app`.
    pub fn bundle_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}.app", self.bundle.name))
    }

    /// Returns where the merged executable is written before assembly.
    pub fn merged_executable_path(&self) -> PathBuf {
        self.out_dir
            .join("universal")
            .join(&self.bundle.executable)
    }

    /// Whether a failed staging directory is kept for inspection.
    pub fn keep_partial(&self) -> bool {
        self.keep_partial
    }
}

/// Builder for constructing [`Settings`].
///
/// `build()` runs every configuration check, so an invalid identifier or
/// version is rejected here and never reaches the pipeline stages.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_universal::bundler::{Arch, BundleSettings, SettingsBuilder};
///
/// # fn example() -> Result<(), kodegen_bundler_universal::ConfigError> {
/// let settings = SettingsBuilder::new()
///     .project_root(".")
///     .out_dir("target/bundle")
///     .bundle_settings(BundleSettings {
///         name: "Clicker".into(),
///         identifier: "org.example.clicker".into(),
///         version: "1.0.0".into(),
///         executable: "clicker".into(),
///         icon: "assets/icon.icns".into(),
///         ..Default::default()
///     })
///     .architectures(vec![Arch::X86_64, Arch::Arm64])
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    bundle: Option<BundleSettings>,
    toolchain: ToolchainSettings,
    architectures: Vec<Arch>,
    project_root: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    keep_partial: bool,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets bundle identity settings.
    ///
    /// # Required
    pub fn bundle_settings(mut self, settings: BundleSettings) -> Self {
        self.bundle = Some(settings);
        self
    }

    /// Sets toolchain settings.
    ///
    /// Default: `cargo build --release --target {{triple}} --bin {{bin}}`
    pub fn toolchain_settings(mut self, settings: ToolchainSettings) -> Self {
        self.toolchain = settings;
        self
    }

    /// Sets the architectures to build and merge.
    ///
    /// # Required
    pub fn architectures(mut self, architectures: Vec<Arch>) -> Self {
        self.architectures = architectures;
        self
    }

    /// Sets the project root.
    ///
    /// Default: current directory
    pub fn project_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.project_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the output directory.
    ///
    /// Default: `<project_root>/target/bundle`
    pub fn out_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.out_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keeps a failed staging directory instead of deleting it.
    pub fn keep_partial(mut self, keep: bool) -> Self {
        self.keep_partial = keep;
        self
    }

    /// Validates and builds the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for missing bundle settings, an empty or
    /// malformed identifier, name or executable, a non-semver version, an
    /// empty architecture list or duplicate architectures.
    pub fn build(self) -> Result<Settings, ConfigError> {
        let bundle = self.bundle.ok_or(ConfigError::Missing { key: "bundle" })?;

        validate_bundle(&bundle)?;
        validate_architectures(&self.architectures)?;

        let project_root = self.project_root.unwrap_or_else(|| PathBuf::from("."));
        let out_dir = self
            .out_dir
            .unwrap_or_else(|| project_root.join("target/bundle"));

        Ok(Settings {
            bundle,
            toolchain: self.toolchain,
            architectures: self.architectures,
            project_root,
            out_dir,
            keep_partial: self.keep_partial,
        })
    }
}

fn validate_bundle(bundle: &BundleSettings) -> Result<(), ConfigError> {
    if bundle.name.trim().is_empty() {
        return Err(ConfigError::Missing { key: "bundle.name" });
    }
    if bundle.name.contains('/') {
        return Err(invalid("bundle.name", &bundle.name, "must not contain '/'"));
    }

    validate_identifier(&bundle.identifier)?;

    if bundle.version.trim().is_empty() {
        return Err(ConfigError::Missing { key: "bundle.version" });
    }
    semver::Version::parse(&bundle.version).map_err(|source| ConfigError::Version {
        version: bundle.version.clone(),
        source,
    })?;

    if bundle.executable.trim().is_empty() {
        return Err(ConfigError::Missing { key: "bundle.executable" });
    }
    if bundle.executable.contains(['/', '\\']) {
        return Err(invalid(
            "bundle.executable",
            &bundle.executable,
            "must be a file name, not a path",
        ));
    }

    if bundle.icon.as_os_str().is_empty() {
        return Err(ConfigError::Missing { key: "bundle.icon" });
    }
    if bundle.icon.file_name().is_none() {
        return Err(invalid(
            "bundle.icon",
            &bundle.icon.display().to_string(),
            "must name a file",
        ));
    }
    if bundle.icon.to_string_lossy().contains(['*', '?', '[']) {
        return Err(invalid(
            "bundle.icon",
            &bundle.icon.display().to_string(),
            "must be a literal path, not a glob pattern",
        ));
    }

    let assets_dir = Path::new(&bundle.assets_dir);
    if assets_dir.is_absolute() || assets_dir.components().any(|c| c.as_os_str() == "..") {
        return Err(invalid(
            "bundle.assets_dir",
            &bundle.assets_dir,
            "must be a relative path inside Contents/MacOS",
        ));
    }

    Ok(())
}

/// Checks a reverse-domain identifier: two or more dot-separated segments of
/// ASCII alphanumerics and hyphens.
fn validate_identifier(identifier: &str) -> Result<(), ConfigError> {
    if identifier.trim().is_empty() {
        return Err(ConfigError::Missing { key: "bundle.identifier" });
    }

    let segments: Vec<&str> = identifier.split('.').collect();
    if segments.len() < 2 {
        return Err(invalid(
            "bundle.identifier",
            identifier,
            "expected reverse-domain form such as org.example.app",
        ));
    }
    for segment in segments {
        if segment.is_empty()
            || !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(invalid(
                "bundle.identifier",
                identifier,
                "segments may only contain A-Z, a-z, 0-9 and '-'",
            ));
        }
    }
    Ok(())
}

fn validate_architectures(architectures: &[Arch]) -> Result<(), ConfigError> {
    if architectures.is_empty() {
        return Err(ConfigError::Missing { key: "build.architectures" });
    }
    let mut seen = HashSet::new();
    for arch in architectures {
        if !seen.insert(arch) {
            return Err(invalid(
                "build.architectures",
                arch.name(),
                "listed more than once",
            ));
        }
    }
    Ok(())
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clicker() -> BundleSettings {
        BundleSettings {
            name: "Clicker".into(),
            identifier: "org.example.clicker".into(),
            version: "1.0.0".into(),
            executable: "clicker".into(),
            icon: PathBuf::from("assets/icon.icns"),
            assets_dir: DEFAULT_ASSETS_DIR.into(),
            high_resolution: true,
            ..Default::default()
        }
    }

    fn build(bundle: BundleSettings) -> Result<Settings, ConfigError> {
        SettingsBuilder::new()
            .project_root("/work/clicker")
            .bundle_settings(bundle)
            .architectures(vec![Arch::X86_64, Arch::Arm64])
            .build()
    }

    #[test]
    fn test_valid_settings_paths() {
        let settings = build(clicker()).unwrap();
        assert_eq!(
            settings.bundle_path(),
            PathBuf::from("/work/clicker/target/bundle/Clicker.app")
        );
        assert_eq!(
            settings.merged_executable_path(),
            PathBuf::from("/work/clicker/target/bundle/universal/clicker")
        );
        assert_eq!(settings.architectures(), &[Arch::X86_64, Arch::Arm64]);
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let mut bundle = clicker();
        bundle.identifier = String::new();
        assert!(matches!(
            build(bundle),
            Err(ConfigError::Missing { key: "bundle.identifier" })
        ));
    }

    #[test]
    fn test_malformed_identifiers_rejected() {
        for bad in ["clicker", "org..clicker", "org.example.click er", ".org.example"] {
            let mut bundle = clicker();
            bundle.identifier = bad.into();
            assert!(
                matches!(build(bundle), Err(ConfigError::Invalid { key: "bundle.identifier", .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_non_semver_version_rejected() {
        let mut bundle = clicker();
        bundle.version = "1.0".into();
        assert!(matches!(build(bundle), Err(ConfigError::Version { .. })));
    }

    #[test]
    fn test_executable_must_be_file_name() {
        let mut bundle = clicker();
        bundle.executable = "bin/clicker".into();
        assert!(matches!(
            build(bundle),
            Err(ConfigError::Invalid { key: "bundle.executable", .. })
        ));
    }

    #[test]
    fn test_icon_glob_rejected() {
        for bad in ["assets/*.icns", "assets/icon?.icns", "assets/[ab].icns"] {
            let mut bundle = clicker();
            bundle.icon = PathBuf::from(bad);
            assert!(
                matches!(build(bundle), Err(ConfigError::Invalid { key: "bundle.icon", .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_architecture_list_checks() {
        let empty = SettingsBuilder::new()
            .bundle_settings(clicker())
            .build();
        assert!(matches!(
            empty,
            Err(ConfigError::Missing { key: "build.architectures" })
        ));

        let duplicate = SettingsBuilder::new()
            .bundle_settings(clicker())
            .architectures(vec![Arch::Arm64, Arch::X86_64, Arch::Arm64])
            .build();
        assert!(matches!(
            duplicate,
            Err(ConfigError::Invalid { key: "build.architectures", .. })
        ));
    }

    #[test]
    fn test_assets_dir_must_stay_inside_bundle() {
        let mut bundle = clicker();
        bundle.assets_dir = "../escape".into();
        assert!(matches!(
            build(bundle),
            Err(ConfigError::Invalid { key: "bundle.assets_dir", .. })
        ));
    }
}
