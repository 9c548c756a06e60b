//! Command line argument parsing and validation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

/// Universal macOS app bundler
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_universal",
    version,
    about = "Build a universal (multi-architecture) macOS .app bundle",
    long_about = "Compile an application once per architecture, merge the executables into
one fat binary and assemble a .app bundle with Info.plist and resources.

Usage:
  kodegen_bundler_universal package
  kodegen_bundler_universal package --arch x86_64 --arch arm64 --output dist
  kodegen_bundler_universal package --config games/clicker/Bundle.toml --version 1.2.0"
)]
pub struct Args {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Show verbose progress
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile, merge and bundle
    #[command(disable_version_flag = true)]
    Package(PackageArgs),
}

impl Command {
    /// Command name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Package(_) => "package",
        }
    }
}

/// Arguments of the `package` command. Each one overrides `Bundle.toml`.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct PackageArgs {
    /// Config file [default: Bundle.toml]
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory to write the .app into
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Architecture to include (repeatable): x86_64, arm64, arm64e, i386
    #[arg(long = "arch", value_name = "ARCH")]
    pub architectures: Vec<String>,

    /// Bundle version (semver)
    #[arg(long = "version", value_name = "SEMVER")]
    pub bundle_version: Option<String>,

    /// Bundle identifier, e.g. org.example.clicker
    #[arg(long, value_name = "ID")]
    pub identifier: Option<String>,

    /// Bundle name
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Use existing artifacts instead of running the toolchain
    #[arg(long)]
    pub skip_build: bool,

    /// Build one architecture at a time
    #[arg(long)]
    pub sequential: bool,

    /// Keep the staging directory when assembly fails
    #[arg(long)]
    pub keep_partial: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Package(package) => package.validate(),
        }
    }
}

impl PackageArgs {
    /// Rejects values clap accepts but the bundler never can.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(arch) = self.architectures.iter().find(|a| a.trim().is_empty()) {
            return Err(format!("empty --arch value '{}'", arch));
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("--name must not be empty".to_string());
        }
        Ok(())
    }
}

impl From<&PackageArgs> for Overrides {
    fn from(args: &PackageArgs) -> Self {
        Self {
            config: args.config.clone(),
            output: args.output.clone(),
            architectures: args.architectures.clone(),
            version: args.bundle_version.clone(),
            identifier: args.identifier.clone(),
            name: args.name.clone(),
            skip_build: args.skip_build,
            sequential: args.sequential,
            keep_partial: args.keep_partial,
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            output: super::OutputManager::new(verbose, quiet),
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.verbose, args.quiet)
    }
}
