//! Subcommand handlers.

pub mod check;
pub mod run;

use std::io::{self, IsTerminal};

use crate::cli::ColorMode;

/// Determine whether to emit ANSI colors.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}
