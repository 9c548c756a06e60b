//! kodegen_bundler_universal - universal macOS .app bundles from one command.

use kodegen_bundler_universal::cli;
use kodegen_bundler_universal::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false, false);
            output.error(&format!("Fatal error: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.error_detail("💡 Recovery suggestions:");
                for suggestion in suggestions {
                    output.error_detail(&suggestion);
                }
            }

            process::exit(e.exit_code());
        }
    }
}
