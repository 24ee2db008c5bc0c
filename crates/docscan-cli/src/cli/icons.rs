//! Status icons for console output.

use console::{style, StyledObject};

/// Archived, tool found, check passed.
pub fn success() -> StyledObject<&'static str> {
    style("✓").green()
}

/// Deferred or optional component missing.
pub fn warn() -> StyledObject<&'static str> {
    style("!").yellow()
}

/// Failed run or required component missing.
pub fn error() -> StyledObject<&'static str> {
    style("✗").red()
}

pub fn dim_arrow() -> StyledObject<&'static str> {
    style("→").dim()
}
