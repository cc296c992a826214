//! Environment preflight command.

use crate::context::AppContext;
use anyhow::{bail, Result};
use colored::Colorize;
use corral_core::EnvironmentChecker;
use std::path::Path;

pub async fn check() -> Result<()> {
    let ctx = AppContext::init().await?;
    let checker = EnvironmentChecker::new(
        ctx.engine.as_ref(),
        &ctx.registry,
        &ctx.compose_files,
        Path::new(&ctx.config.data_dir),
    );
    let report = checker.run().await;

    for check in &report.checks {
        if check.passed {
            println!("{} {}: {}", "✓".green().bold(), check.name.bold(), check.details);
        } else {
            println!("{} {}: {}", "✗".red().bold(), check.name.bold(), check.details);
            if let Some(suggestion) = &check.suggestion {
                println!("    {}", suggestion.dimmed());
            }
        }
    }

    if !report.all_passed() {
        let failed = report.checks.iter().filter(|c| !c.passed).count();
        bail!("{} check(s) failed", failed);
    }
    println!();
    println!("{} Environment looks good", "✓".green().bold());
    Ok(())
}
