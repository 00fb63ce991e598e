//! Diagnostic output with a tagged, colored prefix.
//!
//! Every notable event during a bridge run emits exactly one line here:
//! which CMS config file was used (or that none was found), which collections
//! were kept or ignored, and which content files could not be classified.
//! Lines go to stderr so piping `config` output to a file stays clean.
//!
//! # Usage
//! ```ignore
//! log!(info; "processed {} collection with {} files", name, count);
//! log!(warn; "no config file found at {}", path.display());
//! ```

use colored::Colorize;

/// Prefix attached to every diagnostic line.
const TAG: &str = "cloudcannon:";

/// Emit an informational line.
pub fn info(message: &str) {
    eprintln!("{} {}", TAG.cyan().bold(), message);
}

/// Emit a warning line.
pub fn warn(message: &str) {
    eprintln!("{} {}", TAG.yellow().bold(), message);
}

/// Log a message at the given level with the plugin prefix.
///
/// # Usage
/// ```ignore
/// log!(info; "message with {} formatting", args);
/// log!(warn; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    (info; $($arg:tt)*) => {{
        $crate::logger::info(&format!($($arg)*))
    }};
    (warn; $($arg:tt)*) => {{
        $crate::logger::warn(&format!($($arg)*))
    }};
}
