//! Backup and restore commands.

use crate::commands::spinner;
use crate::context::AppContext;
use crate::prompt::StdinConfirmer;
use anyhow::{bail, Result};
use colored::Colorize;
use corral_core::{
    paths, BackupConfig, BackupOrchestrator, RestoreOptions, RestoreOrchestrator, RestoreOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub async fn backup(
    output: Option<PathBuf>,
    no_volumes: bool,
    no_config: bool,
    no_extensions: bool,
    exclude: Vec<String>,
) -> Result<()> {
    let ctx = AppContext::init().await?;

    let opts = BackupConfig {
        include_volumes: !no_volumes,
        include_config: !no_config,
        include_extensions: !no_extensions,
        exclude_patterns: exclude,
        ..BackupConfig::default()
    };

    let orchestrator = BackupOrchestrator::new(
        ctx.engine.clone(),
        ctx.lifecycle.clone(),
        paths::config_dir(),
        ctx.config.extensions.clone(),
        Some(ctx.platform),
    );
    let bundle_dir = output.unwrap_or_else(|| {
        BackupOrchestrator::default_bundle_dir(Path::new(&ctx.config.backup_dir))
    });

    let sp = spinner("Creating backup bundle...");
    let report = orchestrator.create_backup(&bundle_dir, opts).await;
    sp.finish_and_clear();
    let report = report?;

    println!("{} Backup written: {}", "✓".green().bold(), report.bundle_dir.display());
    println!(
        "  {} volume(s), {} config file(s), {}",
        report.manifest.volumes.len(),
        report.manifest.config_files.len(),
        format_size(report.manifest.size_bytes.unwrap_or(0)).dimmed()
    );

    for volume in &report.volume_failures {
        println!("{} Volume not archived: {}", "✗".red().bold(), volume.bold());
    }
    for file in &report.config_failures {
        println!("{} Config file not snapshotted: {}", "✗".red().bold(), file.bold());
    }
    if !report.success() {
        bail!("backup completed with failures");
    }
    Ok(())
}

pub async fn restore(dir: &Path, validate_only: bool, force: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    let orchestrator = RestoreOrchestrator::new(
        ctx.engine.clone(),
        ctx.lifecycle.clone(),
        paths::config_dir(),
        ctx.extensions.clone(),
        Arc::new(StdinConfirmer),
    );

    let opts = RestoreOptions { validate_only, force };
    let outcome = orchestrator.restore(dir, opts).await?;

    match outcome {
        RestoreOutcome::Validated => {
            println!("{} Bundle is valid: {}", "✓".green().bold(), dir.display());
        }
        RestoreOutcome::Cancelled { reason } => {
            println!("Aborted: {}", reason);
        }
        RestoreOutcome::Restored {
            restored_volumes,
            failed_volumes,
            extension_failures,
            warnings,
            ..
        } => {
            println!(
                "{} Restore complete: {} volume(s) restored",
                "✓".green().bold(),
                restored_volumes.len()
            );
            for volume in &failed_volumes {
                println!("{} Volume restore failed: {}", "✗".red().bold(), volume.bold());
            }
            for ext in &extension_failures {
                println!("{} Extension not refreshed: {}", "⚠".yellow().bold(), ext.bold());
            }
            for warning in &warnings {
                println!("{} {}", "⚠".yellow().bold(), warning);
            }
            if !failed_volumes.is_empty() {
                bail!("{} volume(s) could not be restored", failed_volumes.len());
            }
        }
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    let mb = bytes as f64 / 1024.0 / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else {
        format!("{:.1} MB", mb)
    }
}
