//! Error types for packaging runs.
//!
//! This module defines the top-level error with exit codes and recovery suggestions.

use std::path::PathBuf;
use thiserror::Error;

use crate::bundler::Stage;

/// Result type alias for packaging operations
pub type Result<T> = std::result::Result<T, PackageError>;

/// Exit code for a successful run
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failures outside the known categories
pub const EXIT_OTHER: i32 = 1;
/// Exit code for configuration errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for toolchain (compile) failures
pub const EXIT_COMPILE: i32 = 3;
/// Exit code for fat binary (merge) failures
pub const EXIT_MERGE: i32 = 4;
/// Exit code for bundle assembly failures
pub const EXIT_ASSEMBLY: i32 = 5;

/// Main error type for packaging operations
#[derive(Error, Debug)]
pub enum PackageError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Bundler stage errors
    #[error("Bundler error: {0}")]
    Bundler(#[from] crate::bundler::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Configuration errors, raised while loading and validating settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has unexpected fields
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// TOML error
        #[source]
        source: toml::de::Error,
    },

    /// Required value absent from both config file and command line
    #[error("Missing required setting: {key}")]
    Missing {
        /// Setting name
        key: &'static str,
    },

    /// Value present but malformed
    #[error("Invalid value for {key} '{value}': {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// Offending value
        value: String,
        /// Reason for the error
        reason: String,
    },

    /// Version is not valid semver
    #[error("Invalid version '{version}': {source}")]
    Version {
        /// Version string
        version: String,
        /// Parsing error
        #[source]
        source: semver::Error,
    },
}

impl PackageError {
    /// Exit code for this error's category
    pub fn exit_code(&self) -> i32 {
        match self {
            PackageError::Config(_) => EXIT_CONFIG,
            PackageError::Bundler(e) => match e {
                // Malformed or conflicting patterns are configuration problems
                crate::bundler::Error::InvalidPattern { .. }
                | crate::bundler::Error::ResourceConflict(_) => EXIT_CONFIG,
                _ => match e.stage() {
                    Stage::Compile => EXIT_COMPILE,
                    Stage::Merge => EXIT_MERGE,
                    Stage::Assemble => EXIT_ASSEMBLY,
                },
            },
            _ => EXIT_OTHER,
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        use crate::bundler::Error as B;

        match self {
            PackageError::Config(ConfigError::Read { path, .. }) => vec![
                format!("Create {} or pass --config <file>", path.display()),
                "Alternatively pass --name, --identifier and --version on the command line"
                    .to_string(),
            ],
            PackageError::Config(ConfigError::Missing { key }) => vec![format!(
                "Set '{}' in the [bundle] or [build] section of the config file",
                key
            )],
            PackageError::Bundler(B::BuildFailure { arch, .. }) => vec![
                format!("Install the target: rustup target add {}", arch.target_triple()),
                "Run the build command manually to see the full compiler output".to_string(),
            ],
            PackageError::Bundler(B::MissingArtifact { arch, path }) => vec![
                format!("Build the {} slice first, expected at {}", arch, path.display()),
                "Drop --skip-build to let the bundler run the toolchain".to_string(),
            ],
            PackageError::Bundler(B::UnsupportedArchitecture(_)) => vec![format!(
                "Supported architectures: {}",
                crate::bundler::Arch::ALL
                    .iter()
                    .map(|a| a.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )],
            PackageError::Bundler(B::ResourceNotFound(pattern)) => vec![
                format!("Check that '{}' matches files relative to the project root", pattern),
                "Remove the pattern from [bundle].resources if the asset is gone".to_string(),
            ],
            PackageError::Bundler(B::ResourceConflict(_)) => vec![
                "Narrow the [bundle].resources patterns so every file name is unique"
                    .to_string(),
            ],
            PackageError::Bundler(B::AssemblyFailure { .. }) => vec![
                "Check free disk space and write permissions on the output directory".to_string(),
                "Rerun the full packaging command; partial bundles are never reused".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
