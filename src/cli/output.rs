//! Colored terminal output for packaging runs
//!
//! Progress goes to stdout and respects `--quiet`; errors always go to stderr.
//! When stdout carries machine-readable output, progress moves to stderr too.

use std::io::Write;
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    verbose: bool,
    quiet: bool,
    progress_on_stderr: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        if self.progress_on_stderr {
            self.with_progress_on_stderr()
        } else {
            Self::new(self.verbose, self.quiet)
        }
    }
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
            progress_on_stderr: false,
        }
    }

    /// Copy of this manager that prints progress to stderr, keeping stdout
    /// for [`OutputManager::raw`]
    pub fn with_progress_on_stderr(&self) -> Self {
        Self {
            bufwtr: BufferWriter::stderr(ColorChoice::Auto),
            verbose: self.verbose,
            quiet: self.quiet,
            progress_on_stderr: true,
        }
    }

    fn tagged(&self, buffer: &mut Buffer, color: Color, tag: &str, message: &str) {
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(buffer, "{}", tag);
        let _ = buffer.reset();
        let _ = writeln!(buffer, " {}", message);
    }

    fn emit(&self, color: Color, tag: &str, message: &str) {
        if self.quiet {
            return;
        }
        let mut buffer = self.bufwtr.buffer();
        self.tagged(&mut buffer, color, tag, message);
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        self.emit(Color::Cyan, "ℹ", message);
    }

    /// Print a stage progress message
    pub fn progress(&self, message: &str) {
        self.emit(Color::Magenta, "⋯", message);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        self.emit(Color::Green, "✓", message);
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        self.emit(Color::Yellow, "⚠", message);
    }

    /// Print a verbose message (only in verbose mode)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            self.emit(Color::Blue, "→", message);
        }
    }

    /// Print an error message to stderr (always shown)
    pub fn error(&self, message: &str) {
        let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        self.tagged(&mut buffer, Color::Red, "✗", message);
        if bufwtr.print(&buffer).is_err() {
            // Stderr failed - fallback to stdout as last resort
            println!("[STDERR ERROR] ✗ {}", message);
        }
    }

    /// Print indented text to stderr, below an error
    pub fn error_detail(&self, message: &str) {
        eprintln!("    {}", message);
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) {
        if !self.quiet {
            let mut buffer = self.bufwtr.buffer();
            let _ = writeln!(&mut buffer, "    {}", message);
            let _ = self.bufwtr.print(&buffer);
        }
    }

    /// Print machine-readable output to stdout, uncolored; ignores quiet mode
    pub fn raw(&self, message: &str) {
        let bufwtr = BufferWriter::stdout(ColorChoice::Never);
        let mut buffer = bufwtr.buffer();
        let _ = writeln!(&mut buffer, "{}", message);
        let _ = bufwtr.print(&buffer);
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
