//! Terminal confirmation prompt.

use colored::Colorize;
use corral_core::Confirmer;
use std::io::{self, Write};

/// Asks `[y/N]` questions on stdin. Anything but an explicit `y` declines.
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} {} [y/N]: ", "⚠".yellow().bold(), prompt);
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return false;
        }
        input.trim().eq_ignore_ascii_case("y")
    }
}
