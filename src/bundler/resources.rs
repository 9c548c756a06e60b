//! Static resource resolution and copying.
//!
//! Patterns are resolved before anything is written, so a pattern that matches
//! nothing stops the run while the output path is still untouched.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::error::{AssemblyStep, Error, Result};
use crate::bail;
use super::settings::Settings;
use super::utils::fs;

/// Resources of one bundle, resolved to concrete source files.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourcePlan {
    /// Icon file, copied into `Contents/Resources`
    pub icon: PathBuf,
    /// Asset files and directories, copied into `Contents/MacOS/<assets_dir>`
    pub assets: Vec<PathBuf>,
}

impl ResourcePlan {
    /// Resolves the icon and asset patterns of `settings` against the
    /// project root.
    ///
    /// Matches under the output directory (earlier bundles, staging
    /// directories and the merged executable) are skipped.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceNotFound`] for the first pattern (icon included) that
    /// matches nothing.
    pub fn resolve(settings: &Settings) -> Result<Self> {
        let root = settings.project_root();
        let bundle = settings.bundle();

        let icon_pattern = bundle.icon.to_string_lossy().into_owned();
        let out_dir = Some(settings.out_dir());
        let icon = resolve_patterns(root, std::slice::from_ref(&icon_pattern), out_dir)?
            .into_iter()
            .find(|path| path.is_file())
            .ok_or(Error::ResourceNotFound(icon_pattern))?;

        let assets = resolve_patterns(root, &bundle.resources, out_dir)?;
        Ok(Self { icon, assets })
    }

    /// File name the icon has inside the bundle.
    pub fn icon_file_name(&self) -> Option<String> {
        self.icon
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Expands glob patterns relative to `source_dir`.
///
/// Returns the matched paths sorted and de-duplicated. Paths inside
/// `exclude` are dropped and do not count as matches.
///
/// # Errors
///
/// - [`Error::InvalidPattern`] for malformed glob syntax
/// - [`Error::ResourceNotFound`] for a pattern with zero matches
/// - [`Error::ResourceConflict`] if two matches would land on the same file
///   name
pub fn resolve_patterns(
    source_dir: &Path,
    patterns: &[String],
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&source_dir.to_string_lossy());
    let mut matched = BTreeSet::new();

    for pattern in patterns {
        let full = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            format!("{}/{}", base.trim_end_matches('/'), pattern)
        };

        let paths = glob::glob(&full).map_err(|source| Error::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;

        let mut count = 0usize;
        for entry in paths {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                Error::AssemblyFailure {
                    step: AssemblyStep::CopyResources,
                    path,
                    error: e.into_error(),
                }
            })?;
            if exclude.is_some_and(|dir| path.starts_with(dir)) {
                continue;
            }
            matched.insert(path);
            count += 1;
        }

        if count == 0 {
            return Err(Error::ResourceNotFound(pattern.clone()));
        }
        log::debug!("Resource pattern '{}' matched {} path(s)", pattern, count);
    }

    let mut names = BTreeSet::new();
    for path in &matched {
        if let Some(name) = path.file_name()
            && !names.insert(name.to_os_string())
        {
            return Err(Error::ResourceConflict(format!(
                "more than one resource is named {}",
                name.to_string_lossy()
            )));
        }
    }

    Ok(matched.into_iter().collect())
}

/// Copies files (or directory trees) into `dest_dir`, keeping their names.
///
/// Returns the destination paths in input order.
pub async fn copy_into(sources: &[PathBuf], dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut copied = Vec::with_capacity(sources.len());
    for source in sources {
        let Some(name) = source.file_name() else {
            bail!("resource {} has no file name", source.display());
        };
        let destination = dest_dir.join(name);

        if source.is_dir() {
            fs::copy_dir(source, &destination, AssemblyStep::CopyResources).await?;
        } else {
            fs::copy_file(source, &destination, AssemblyStep::CopyResources).await?;
        }
        log::debug!("Copied {} -> {}", source.display(), destination.display());
        copied.push(destination);
    }
    Ok(copied)
}

/// Copies every file matching `patterns` (relative to `source_dir`) into
/// `dest_dir`, preserving file names.
///
/// # Errors
///
/// [`Error::ResourceNotFound`] if any pattern matches zero files; nothing is
/// copied in that case.
pub async fn copy_matching(
    source_dir: &Path,
    patterns: &[String],
    dest_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let sources = resolve_patterns(source_dir, patterns, None)?;
    copy_into(&sources, dest_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("icon.icns"), b"icns").unwrap();
        std::fs::write(assets.join("sprite1.png"), b"png1").unwrap();
        std::fs::write(assets.join("sprite2.png"), b"png2").unwrap();
        dir
    }

    #[test]
    fn test_resolve_sorted_and_deduplicated() {
        let dir = project();
        let paths = resolve_patterns(
            dir.path(),
            &["assets/*.png".into(), "assets/sprite1.png".into()],
            None,
        )
        .unwrap();

        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["sprite1.png", "sprite2.png"]);
    }

    #[test]
    fn test_zero_matches_is_resource_not_found() {
        let dir = project();
        let err = resolve_patterns(dir.path(), &["assets/*.png".into(), "music/*.ogg".into()], None)
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(ref p) if p == "music/*.ogg"));
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = project();
        let err = resolve_patterns(dir.path(), &["assets/[".into()], None).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_matches_in_excluded_dir_are_skipped() {
        let dir = project();
        let previous = dir.path().join("target/bundle/Clicker.app/Contents/MacOS/assets");
        std::fs::create_dir_all(&previous).unwrap();
        std::fs::write(previous.join("sprite1.png"), b"png1").unwrap();

        let exclude = dir.path().join("target/bundle");
        let paths = resolve_patterns(dir.path(), &["**/*.png".into()], Some(&exclude)).unwrap();
        assert_eq!(
            paths,
            vec![
                dir.path().join("assets/sprite1.png"),
                dir.path().join("assets/sprite2.png")
            ]
        );

        // Without the exclusion the old bundle's copy collides by name
        let err = resolve_patterns(dir.path(), &["**/*.png".into()], None).unwrap_err();
        assert!(matches!(err, Error::ResourceConflict(_)));
    }

    #[test]
    fn test_only_excluded_matches_is_resource_not_found() {
        let dir = project();
        let out = dir.path().join("dist");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("notes.txt"), b"x").unwrap();

        let err = resolve_patterns(dir.path(), &["dist/*.txt".into()], Some(&out)).unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(ref p) if p == "dist/*.txt"));
    }

    #[tokio::test]
    async fn test_copy_matching_preserves_names() {
        let dir = project();
        let dest = dir.path().join("out");
        let copied = copy_matching(dir.path(), &["assets/sprite*.png".into()], &dest)
            .await
            .unwrap();

        assert_eq!(copied, vec![dest.join("sprite1.png"), dest.join("sprite2.png")]);
        assert_eq!(std::fs::read(dest.join("sprite2.png")).unwrap(), b"png2");
    }

    #[tokio::test]
    async fn test_copy_matching_copies_nothing_on_missing_pattern() {
        let dir = project();
        let dest = dir.path().join("out");
        let result =
            copy_matching(dir.path(), &["assets/*.png".into(), "fonts/*.ttf".into()], &dest).await;

        assert!(matches!(result, Err(Error::ResourceNotFound(_))));
        assert!(!dest.exists());
    }
}
