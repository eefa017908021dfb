//! The one-line banner printed before a command runs.

use std::io::{self, Write};

pub const ICON_RUNNER: &str = "\u{1F3C3}";

const SECONDARY_START: &str = "\x1b[2m";
const STYLE_RESET: &str = "\x1b[0m";

/// Wraps `text` in the dim "secondary" style.
pub fn secondary(text: &str) -> String {
    format!("{}{}{}", SECONDARY_START, text, STYLE_RESET)
}

/// `<icon> <program> <dim arguments>`, without a trailing newline.
pub fn format_banner(program: &str, args: &[String]) -> String {
    format!("{} {} {}", ICON_RUNNER, program, secondary(&args.join(" ")))
}

/// Writes the banner line to stdout and flushes it, so it is never
/// reordered after output of the child that shares the stream.
pub fn print_banner(program: &str, args: &[String]) {
    let line = format_banner(program, args);
    let mut stdout = io::stdout().lock();

    if let Err(_e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
        #[cfg(feature = "tracing")]
        tracing::warn!(error = %_e, "Failed to write command banner");
    }
}
