//! CLI command implementations

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub mod backup;
pub mod check;
pub mod install;
pub mod logs;
pub mod stack;
pub mod uninstall;

/// Steady-tick spinner in the house style.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
