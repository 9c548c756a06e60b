//! `package` command: compile, merge and bundle.

use crate::bundler::Packager;
use crate::cli::{PackageArgs, RuntimeConfig};
use crate::config::{self, Overrides};
use crate::error::{EXIT_SUCCESS, Result};

/// Runs the full pipeline and prints the result.
pub(super) async fn execute_package(args: &PackageArgs, config: &RuntimeConfig) -> Result<i32> {
    // Keep stdout for the JSON document alone
    let json_output;
    let output = if args.json {
        json_output = config.output().with_progress_on_stderr();
        &json_output
    } else {
        config.output()
    };

    let settings = config::load(&Overrides::from(args))?;
    output.verbose(&format!(
        "Project root: {}",
        settings.project_root().display()
    ));
    output.progress(&format!(
        "Packaging {} {} for {}",
        settings.bundle().name,
        settings.bundle().version,
        settings
            .architectures()
            .iter()
            .map(|a| a.name())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    if settings.toolchain().skip_build {
        output.warn("Skipping build, using existing artifacts");
    }

    let packaged = Packager::new(settings).package().await?;

    if args.json {
        output.raw(&serde_json::to_string_pretty(&packaged)?);
    } else {
        output.success(&format!("Created {}", packaged.path.display()));
        output.indent(&format!(
            "Architectures: {}",
            packaged
                .architectures
                .iter()
                .map(|a| a.name())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        output.indent(&format!("Size: {} bytes", packaged.size));
        output.indent(&format!("SHA256: {}", packaged.checksum));
    }

    Ok(EXIT_SUCCESS)
}
