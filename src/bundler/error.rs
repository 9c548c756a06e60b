//! Error types for the packaging stages.
//!
//! Every stage of the pipeline (compile, merge, assemble) reports failures
//! through [`Error`]. Filesystem failures carry the bundling step and path
//! that caused them, attached through the [`ErrorExt`] trait.
//!
//! # Example
//!
//! ```no_run
//! # use std::path::Path;
//! use kodegen_bundler_universal::bundler::{AssemblyStep, ErrorExt, Result};
//!
//! fn create_skeleton(macos_dir: &Path) -> Result<()> {
//!     std::fs::create_dir_all(macos_dir)
//!         .fs_context(AssemblyStep::CreateSkeleton, macos_dir)?;
//!     Ok(())
//! }
//! ```

use std::{fmt, io, path::PathBuf};
use thiserror::Error as DeriveError;

use super::arch::Arch;

/// Steps of bundle assembly, reported in [`Error::AssemblyFailure`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssemblyStep {
    /// Creating the hidden staging directory next to the bundle.
    Stage,
    /// Creating `Contents/MacOS` and `Contents/Resources`.
    CreateSkeleton,
    /// Copying icon and asset files.
    CopyResources,
    /// Copying the merged executable into `Contents/MacOS`.
    CopyExecutable,
    /// Writing `Contents/Info.plist`.
    WriteDescriptor,
    /// Removing the previous bundle at the output path.
    RemoveExisting,
    /// Renaming the staging directory into place.
    Commit,
}

impl AssemblyStep {
    /// Returns the short name used in log and error output.
    pub fn name(&self) -> &'static str {
        match self {
            AssemblyStep::Stage => "stage",
            AssemblyStep::CreateSkeleton => "create skeleton",
            AssemblyStep::CopyResources => "copy resources",
            AssemblyStep::CopyExecutable => "copy executable",
            AssemblyStep::WriteDescriptor => "write descriptor",
            AssemblyStep::RemoveExisting => "remove existing bundle",
            AssemblyStep::Commit => "commit bundle",
        }
    }
}

impl fmt::Display for AssemblyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pipeline stage an [`Error`] belongs to.
///
/// Used by the CLI to pick a distinct exit code per failure category.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    /// Toolchain invocation.
    Compile,
    /// Fat binary creation.
    Merge,
    /// Bundle directory assembly (including resource copying).
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Compile => "compile",
            Stage::Merge => "merge",
            Stage::Assemble => "assemble",
        })
    }
}

/// Errors returned by the packaging stages.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// The toolchain failed for one architecture.
    ///
    /// Covers spawn failures, non-zero exits and a missing artifact after a
    /// reported success.
    #[error("build failed for {arch}: {reason}")]
    BuildFailure {
        /// Architecture whose build failed
        arch: Arch,
        /// Underlying cause
        reason: String,
    },

    /// A build task ended without reporting a result (panicked or was
    /// cancelled).
    #[error("build task failed: {0}")]
    BuildTask(String),

    /// An expected per-architecture executable is absent.
    #[error("missing build artifact for {arch} at {path}")]
    MissingArtifact {
        /// Architecture whose artifact is missing
        arch: Arch,
        /// Where the artifact was expected
        path: PathBuf,
    },

    /// Architecture name not recognized by the fat binary format.
    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    /// Two inputs claim the same architecture.
    #[error("architecture {0} supplied more than once")]
    DuplicateArchitecture(Arch),

    /// A slice does not fit the 32-bit offsets of the fat header.
    #[error("{arch} slice is {size} bytes, larger than a fat header can address")]
    SliceTooLarge {
        /// Architecture of the oversized slice
        arch: Arch,
        /// Slice size in bytes
        size: u64,
    },

    /// Written fat binary does not list the expected architectures.
    #[error("merged executable {path} failed verification: {reason}")]
    MergeVerification {
        /// Merged executable path
        path: PathBuf,
        /// What did not match
        reason: String,
    },

    /// A resource pattern matched zero files.
    #[error("no files match resource pattern '{0}'")]
    ResourceNotFound(String),

    /// A resource pattern is not valid glob syntax.
    #[error("invalid resource pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Parser error
        #[source]
        source: glob::PatternError,
    },

    /// Resolved resources cannot be laid out in one bundle, such as two
    /// files with the same name or an icon the descriptor does not name.
    #[error("{0}")]
    ResourceConflict(String),

    /// Filesystem failure during bundle assembly.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{step} failed at {path}: {error}")]
    AssemblyFailure {
        /// Assembly step that failed
        step: AssemblyStep,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// Failure reading or writing the merged executable.
    #[error("{context} {path}: {error}")]
    MergeIo {
        /// Operation being performed
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// Handlebars template parsing error (toolchain templates).
    #[error("{0}")]
    Template(#[from] handlebars::TemplateError),

    /// Handlebars template rendering error (toolchain templates).
    #[error("{0}")]
    Render(#[from] handlebars::RenderError),

    /// Property list serialization error.
    #[error("{0}")]
    Plist(#[from] plist::Error),

    /// Binary parsing error while verifying the fat header.
    #[error("binary parse error: {0}")]
    BinaryParse(#[from] goblin::error::Error),

    /// Error walking a directory tree.
    #[error("{0}")]
    Walkdir(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripPrefix(#[from] std::path::StripPrefixError),

    /// Generic I/O error.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Returns the pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Error::BuildFailure { .. }
            | Error::BuildTask(_)
            | Error::Template(_)
            | Error::Render(_) => Stage::Compile,
            Error::MissingArtifact { .. }
            | Error::UnsupportedArchitecture(_)
            | Error::DuplicateArchitecture(_)
            | Error::SliceTooLarge { .. }
            | Error::MergeVerification { .. }
            | Error::MergeIo { .. }
            | Error::BinaryParse(_) => Stage::Merge,
            _ => Stage::Assemble,
        }
    }
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait attaching an assembly step and path to I/O errors.
pub trait ErrorExt<T> {
    /// Wrap an I/O error as [`Error::AssemblyFailure`].
    fn fs_context(self, step: AssemblyStep, path: impl Into<PathBuf>) -> Result<T>;

    /// Wrap an I/O error as [`Error::MergeIo`].
    ///
    /// The `context` should be a present-tense verb phrase, e.g. "reading slice".
    fn merge_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, step: AssemblyStep, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::AssemblyFailure {
            step,
            path: path.into(),
            error,
        })
    }

    fn merge_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::MergeIo {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::GenericError`] and returns immediately.
///
/// ```ignore
/// bail!("operation failed");
/// bail!("invalid value: {}", value);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_classification() {
        let build = Error::BuildFailure {
            arch: Arch::X86_64,
            reason: "exit status 101".into(),
        };
        assert_eq!(build.stage(), Stage::Compile);

        let missing = Error::MissingArtifact {
            arch: Arch::Arm64,
            path: PathBuf::from("target/aarch64-apple-darwin/release/clicker"),
        };
        assert_eq!(missing.stage(), Stage::Merge);
        assert_eq!(Error::UnsupportedArchitecture("ppc".into()).stage(), Stage::Merge);
        assert_eq!(Error::ResourceNotFound("*.png".into()).stage(), Stage::Assemble);
        assert_eq!(
            Error::BuildTask("task 2 panicked".into()).stage(),
            Stage::Compile
        );
    }

    #[test]
    fn test_fs_context_carries_step_and_path() {
        let result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        let err = result
            .fs_context(AssemblyStep::CopyExecutable, "/tmp/Clicker.app/Contents/MacOS/clicker")
            .unwrap_err();

        match &err {
            Error::AssemblyFailure { step, path, .. } => {
                assert_eq!(*step, AssemblyStep::CopyExecutable);
                assert!(path.ends_with("MacOS/clicker"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("copy executable failed at"));
    }
}
