//! Universal macOS application bundler.
//!
//! Compiles an executable once per architecture, merges the results into one
//! Mach-O fat binary and wraps it in a `.app` bundle with a generated
//! `Info.plist` and the project's static resources.
//!
//! # Configuration
//!
//! Bundling is configured through [`SettingsBuilder`], usually populated from
//! a `Bundle.toml` by [`crate::config`]:
//!
//! ```toml
//! [bundle]
//! name = "Clicker"
//! identifier = "org.example.clicker"
//! version = "1.0.0"
//! icon = "assets/icon.icns"
//! resources = ["assets/*.png"]
//!
//! [build]
//! architectures = ["x86_64", "arm64"]
//! ```
//!
//! # Stages
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Compile | `compile` | one [`BuildArtifact`] per architecture |
//! | Merge | `universal` | [`MergedExecutable`] |
//! | Assemble | `app` | [`AppBundle`] |
//!
//! [`Packager`] runs them in order.

#![warn(missing_docs)]

mod app;
mod arch;
mod builder;
mod compile;
mod descriptor;
mod error;
mod resources;
mod settings;
mod staging;
mod universal;
mod utils;

// Public re-exports
pub use app::{AppBundle, assemble, bundle_project};
pub use arch::Arch;
pub use builder::{PackagedBundle, Packager, calculate_directory_sha256};
pub use compile::{ArchitectureTarget, BuildArtifact, build_all, plan_targets};
pub use descriptor::BundleDescriptor;
pub use error::{AssemblyStep, Error, ErrorExt, Result, Stage};
pub use resources::{ResourcePlan, copy_into, copy_matching, resolve_patterns};
pub use settings::{
    BundleSettings, DEFAULT_ARGS, DEFAULT_ARTIFACT, DEFAULT_ASSETS_DIR, DEFAULT_PROGRAM, Settings,
    SettingsBuilder, ToolchainSettings,
};
pub use staging::StagedBundle;
pub use universal::{
    FAT_MAGIC, FatSlice, MergedExecutable, create_universal_binary, encode_header, layout,
    read_architectures,
};
