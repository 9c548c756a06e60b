//! Per-architecture compilation.
//!
//! Runs the configured toolchain once per [`ArchitectureTarget`] and yields a
//! [`BuildArtifact`] for each. Targets have no data dependency on each other,
//! so by default they build concurrently; the caller only continues once every
//! build has finished. The first failure aborts the remaining builds (their
//! child processes are killed) and is returned as-is.

use handlebars::Handlebars;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::task::JoinSet;

use super::arch::Arch;
use super::error::{Error, Result};
use super::settings::{Settings, ToolchainSettings};

/// Number of trailing stderr lines kept in a [`Error::BuildFailure`].
const STDERR_TAIL_LINES: usize = 20;

/// One architecture the final bundle must support.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchitectureTarget {
    arch: Arch,
    triple: String,
    artifact_path: PathBuf,
}

impl ArchitectureTarget {
    /// Creates a target with an explicit triple and artifact path.
    pub fn new(arch: Arch, triple: impl Into<String>, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            arch,
            triple: triple.into(),
            artifact_path: artifact_path.into(),
        }
    }

    /// Returns the architecture.
    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Returns the canonical target identifier (Rust target triple).
    pub fn triple(&self) -> &str {
        &self.triple
    }

    /// Returns where the toolchain is expected to write the executable.
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }
}

/// Compiler output for one [`ArchitectureTarget`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BuildArtifact {
    /// Architecture the executable was built for
    pub arch: Arch,
    /// Target triple used for the build
    pub triple: String,
    /// Path to the executable
    pub path: PathBuf,
    /// Whether the file existed when the artifact was recorded
    pub exists: bool,
}

impl BuildArtifact {
    /// Records the artifact for `target`, checking whether the file exists.
    pub fn from_target(target: &ArchitectureTarget) -> Self {
        Self {
            arch: target.arch,
            triple: target.triple.clone(),
            path: target.artifact_path.clone(),
            exists: target.artifact_path.is_file(),
        }
    }
}

#[derive(Serialize)]
struct TemplateVars<'a> {
    triple: &'a str,
    arch: &'a str,
    bin: &'a str,
}

/// Renders the toolchain templates for each configured architecture.
///
/// Produces one [`ArchitectureTarget`] per entry of
/// [`Settings::architectures`], in configured order.
pub fn plan_targets(settings: &Settings) -> Result<Vec<ArchitectureTarget>> {
    let templates = Templates::new(settings.toolchain())?;
    settings
        .architectures()
        .iter()
        .map(|arch| {
            let vars = vars_for(*arch, &settings.bundle().executable);
            let artifact = templates.artifact(&vars)?;
            Ok(ArchitectureTarget::new(
                *arch,
                arch.target_triple(),
                resolve(&settings.toolchain().working_dir, &artifact),
            ))
        })
        .collect()
}

/// Builds every target and returns the artifacts in target order.
///
/// With `skip_build` set, the artifacts are recorded as they are on disk and
/// no toolchain runs; absent files surface later as
/// [`Error::MissingArtifact`].
///
/// # Errors
///
/// [`Error::BuildFailure`] for the first target whose toolchain cannot be
/// spawned, exits unsuccessfully or does not produce its artifact.
pub async fn build_all(settings: &Settings, targets: &[ArchitectureTarget]) -> Result<Vec<BuildArtifact>> {
    let toolchain = settings.toolchain();

    if toolchain.skip_build {
        log::info!("Skipping build, using existing artifacts");
        return Ok(targets
            .iter()
            .map(|target| {
                let artifact = BuildArtifact::from_target(target);
                if !artifact.exists {
                    log::warn!(
                        "No existing {} artifact at {}",
                        artifact.arch,
                        artifact.path.display()
                    );
                }
                artifact
            })
            .collect());
    }

    let Some(first) = targets.first() else {
        return Ok(Vec::new());
    };
    let program = resolve_program(toolchain, first.arch())?;

    let templates = Templates::new(toolchain)?;
    let commands = targets
        .iter()
        .map(|target| {
            let vars = TemplateVars {
                triple: target.triple(),
                arch: target.arch().name(),
                bin: &settings.bundle().executable,
            };
            Ok(BuildCommand {
                target: target.clone(),
                program: program.clone(),
                args: templates.args(&vars)?,
                working_dir: toolchain.working_dir.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if toolchain.parallel && commands.len() > 1 {
        build_concurrently(commands).await
    } else {
        let mut artifacts = Vec::with_capacity(commands.len());
        for command in commands {
            artifacts.push(command.run().await?);
        }
        Ok(artifacts)
    }
}

/// Spawns one task per target and joins them all before returning.
async fn build_concurrently(commands: Vec<BuildCommand>) -> Result<Vec<BuildArtifact>> {
    log::info!("Building {} targets concurrently", commands.len());

    let mut results: Vec<Option<BuildArtifact>> = vec![None; commands.len()];
    let mut tasks = JoinSet::new();
    for (index, command) in commands.into_iter().enumerate() {
        tasks.spawn(async move { (index, command.run().await) });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(artifact))) => results[index] = Some(artifact),
            Ok((_, Err(e))) => {
                // Dropping an aborted task drops its child, which kills it
                tasks.abort_all();
                return Err(e);
            }
            Err(join_error) => {
                tasks.abort_all();
                return Err(Error::BuildTask(join_error.to_string()));
            }
        }
    }

    Ok(results.into_iter().flatten().collect())
}

/// A fully rendered toolchain invocation for one target.
#[derive(Debug)]
struct BuildCommand {
    target: ArchitectureTarget,
    program: PathBuf,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl BuildCommand {
    async fn run(self) -> Result<BuildArtifact> {
        let arch = self.target.arch();
        log::info!(
            "Building {} ({}): {} {}",
            arch,
            self.target.triple(),
            self.program.display(),
            self.args.join(" ")
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::BuildFailure {
                arch,
                reason: format!("failed to run {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(Error::BuildFailure {
                arch,
                reason: format!("toolchain exited with {}\n{}", output.status, tail),
            });
        }

        let artifact = BuildArtifact::from_target(&self.target);
        if !artifact.exists {
            return Err(Error::BuildFailure {
                arch,
                reason: format!(
                    "toolchain succeeded but {} was not produced",
                    artifact.path.display()
                ),
            });
        }

        log::info!("✓ {} built: {}", arch, artifact.path.display());
        Ok(artifact)
    }
}

/// Compiled toolchain templates.
struct Templates {
    registry: Handlebars<'static>,
    arg_count: usize,
}

impl Templates {
    fn new(toolchain: &ToolchainSettings) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);

        registry.register_template_string("artifact", &toolchain.artifact)?;
        for (index, arg) in toolchain.args.iter().enumerate() {
            registry.register_template_string(&format!("arg{index}"), arg)?;
        }

        Ok(Self {
            registry,
            arg_count: toolchain.args.len(),
        })
    }

    fn artifact(&self, vars: &TemplateVars<'_>) -> Result<String> {
        Ok(self.registry.render("artifact", vars)?)
    }

    fn args(&self, vars: &TemplateVars<'_>) -> Result<Vec<String>> {
        (0..self.arg_count)
            .map(|index| Ok(self.registry.render(&format!("arg{index}"), vars)?))
            .collect()
    }
}

fn vars_for(arch: Arch, bin: &str) -> TemplateVars<'_> {
    TemplateVars {
        triple: arch.target_triple(),
        arch: arch.name(),
        bin,
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Finds the toolchain program: on `PATH` for bare names, relative to the
/// working directory otherwise.
fn resolve_program(toolchain: &ToolchainSettings, arch: Arch) -> Result<PathBuf> {
    let program = Path::new(&toolchain.program);
    if program.components().count() > 1 {
        let candidate = resolve(&toolchain.working_dir, &toolchain.program);
        if candidate.is_file() {
            return Ok(candidate);
        }
        return Err(Error::BuildFailure {
            arch,
            reason: format!("toolchain program {} not found", candidate.display()),
        });
    }

    which::which(program).map_err(|e| Error::BuildFailure {
        arch,
        reason: format!("toolchain program '{}' not found on PATH: {e}", toolchain.program),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::settings::{BundleSettings, SettingsBuilder};

    fn settings(toolchain: ToolchainSettings) -> Settings {
        SettingsBuilder::new()
            .bundle_settings(BundleSettings {
                name: "Clicker".into(),
                identifier: "org.example.clicker".into(),
                version: "1.0.0".into(),
                executable: "clicker".into(),
                icon: "icon.icns".into(),
                ..Default::default()
            })
            .toolchain_settings(toolchain)
            .architectures(vec![Arch::X86_64, Arch::Arm64])
            .build()
            .unwrap()
    }

    #[test]
    fn test_plan_targets_renders_default_artifact_paths() {
        let toolchain = ToolchainSettings {
            working_dir: PathBuf::from("/work/clicker"),
            ..Default::default()
        };
        let targets = plan_targets(&settings(toolchain)).unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].arch(), Arch::X86_64);
        assert_eq!(targets[0].triple(), "x86_64-apple-darwin");
        assert_eq!(
            targets[0].artifact_path(),
            Path::new("/work/clicker/target/x86_64-apple-darwin/release/clicker")
        );
        assert_eq!(
            targets[1].artifact_path(),
            Path::new("/work/clicker/target/aarch64-apple-darwin/release/clicker")
        );
    }

    #[test]
    fn test_default_args_render_per_target() {
        let toolchain = ToolchainSettings::default();
        let templates = Templates::new(&toolchain).unwrap();
        let args = templates.args(&vars_for(Arch::Arm64, "clicker")).unwrap();
        assert_eq!(
            args,
            vec!["build", "--release", "--target", "aarch64-apple-darwin", "--bin", "clicker"]
        );
    }

    #[test]
    fn test_unknown_template_variable_is_rejected() {
        let toolchain = ToolchainSettings {
            artifact: "target/{{profile}}/{{bin}}".into(),
            ..Default::default()
        };
        assert!(matches!(
            plan_targets(&settings(toolchain)),
            Err(Error::Render(_))
        ));
    }

    #[tokio::test]
    async fn test_skip_build_records_missing_artifacts() {
        let toolchain = ToolchainSettings {
            working_dir: PathBuf::from("/nonexistent/project"),
            skip_build: true,
            ..Default::default()
        };
        let settings = settings(toolchain);
        let targets = plan_targets(&settings).unwrap();
        let artifacts = build_all(&settings, &targets).await.unwrap();

        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.iter().all(|a| !a.exists));
    }

    #[tokio::test]
    async fn test_missing_program_is_build_failure() {
        let toolchain = ToolchainSettings {
            program: "definitely-not-a-real-toolchain-binary".into(),
            ..Default::default()
        };
        let settings = settings(toolchain);
        let targets = plan_targets(&settings).unwrap();

        let err = build_all(&settings, &targets).await.unwrap_err();
        assert!(matches!(err, Error::BuildFailure { arch: Arch::X86_64, .. }));
    }
}
