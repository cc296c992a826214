//! Uninstall command.

use crate::commands::spinner;
use crate::context::AppContext;
use crate::prompt::StdinConfirmer;
use anyhow::Result;
use colored::Colorize;
use corral_core::{paths, CleanupOptions, Confirmer, ResourceCleanupEngine};
use std::sync::Arc;

pub async fn uninstall(
    remove_images: bool,
    remove_volumes: bool,
    remove_config: bool,
    all: bool,
    force: bool,
) -> Result<()> {
    let ctx = AppContext::init().await?;

    if !force
        && !StdinConfirmer
            .confirm("This removes the stack's containers and networks. Continue?")
    {
        println!("Aborted.");
        return Ok(());
    }

    let engine = ResourceCleanupEngine::new(
        ctx.engine.clone(),
        ctx.lifecycle.clone(),
        paths::config_dir(),
        Arc::new(StdinConfirmer),
    );
    let opts = CleanupOptions {
        remove_images,
        remove_volumes,
        remove_config,
        remove_everything: all,
        force,
    };

    let sp = spinner("Removing stack resources...");
    let report = engine.cleanup(opts).await;
    sp.finish_and_clear();
    let report = report?;

    println!(
        "{} Removed {} container(s), {} network(s), {} image(s), {} volume(s)",
        "✓".green().bold(),
        report.containers_removed,
        report.networks_removed,
        report.images_removed,
        report.volumes_removed,
    );
    if report.config_removed {
        println!("{} Configuration directory removed", "✓".green().bold());
    }
    if report.volumes_declined {
        println!("{}", "Volumes were kept at your request".dimmed());
    }
    Ok(())
}
