//! Command execution.
//!
//! Every command returns the process exit code. Failures are reported here
//! once, with their stage, cause and recovery suggestions.

mod package;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::{EXIT_CONFIG, PackageError, Result};

use package::execute_package;

/// Execute the command selected by `args`
pub async fn execute_command(args: Args) -> Result<i32> {
    let config = RuntimeConfig::from(&args);

    if let Err(validation_error) = args.validate() {
        config
            .output()
            .error(&format!("Invalid arguments: {}", validation_error));
        return Ok(EXIT_CONFIG);
    }

    let result = match &args.command {
        Command::Package(package) => execute_package(package, &config).await,
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            report_failure(&config, args.command.name(), &e);
            Ok(e.exit_code())
        }
    }
}

fn report_failure(config: &RuntimeConfig, command: &str, error: &PackageError) {
    let output = config.output();

    match error {
        PackageError::Bundler(e) => output.error(&format!(
            "Command '{}' failed during {} stage: {}",
            command,
            e.stage(),
            e
        )),
        _ => output.error(&format!("Command '{}' failed: {}", command, error)),
    }

    let suggestions = error.recovery_suggestions();
    if !suggestions.is_empty() {
        output.error_detail("");
        output.error_detail("💡 Recovery suggestions:");
        for suggestion in suggestions {
            output.error_detail(&format!("  • {}", suggestion));
        }
    }
}
