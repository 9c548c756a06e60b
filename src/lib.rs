//! # Kodegen Universal Bundler
//!
//! Builds universal (multi-architecture) macOS application bundles.
//!
//! One run compiles the application once per configured architecture,
//! merges the executables into a Mach-O fat binary and assembles
//! `<Name>.app` with a generated `Info.plist`, the icon and runtime assets.
//!
//! ## Features
//!
//! - **Configurable architectures**: `x86_64`, `arm64`, `arm64e`, `i386`
//! - **Concurrent builds**: one toolchain process per architecture
//! - **Pure Rust merging**: fat binaries without `lipo`, verified with goblin
//! - **Atomic output**: a bundle is staged and renamed into place, so a failed
//!   run never leaves a half-written `.app`
//!
//! ## Usage
//!
//! ```bash
//! kodegen_bundler_universal package
//! kodegen_bundler_universal package --arch x86_64 --arch arm64 --version 1.2.0
//! kodegen_bundler_universal package --skip-build --json
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod bundler;
pub mod cli;
pub mod config;
pub mod error;

// Re-export main types for public API
pub use bundler::{Arch, BundleSettings, PackagedBundle, Packager, Settings, SettingsBuilder};
pub use cli::Args;
pub use error::{ConfigError, PackageError, Result};
