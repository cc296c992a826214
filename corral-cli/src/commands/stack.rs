//! Stack lifecycle commands: start, stop, restart, update, status.

use crate::commands::spinner;
use crate::context::AppContext;
use anyhow::{bail, Result};
use colored::Colorize;
use corral_core::{HealthState, StartOutcome, UpdateOptions, UpdateOutcome};
use tabled::{settings::Style, Table, Tabled};

pub async fn start(update: bool) -> Result<()> {
    let ctx = AppContext::init().await?;
    println!("{} Platform: {}", "→".cyan().bold(), ctx.platform.to_string().bold());

    let sp = spinner("Starting the stack (this may take a while)...");
    let outcome = ctx.lifecycle.start(update).await?;
    sp.finish_and_clear();

    report_start(&outcome)?;
    Ok(())
}

pub async fn stop() -> Result<()> {
    let ctx = AppContext::init().await?;

    let sp = spinner("Stopping the stack...");
    let result = ctx.lifecycle.stop().await;
    sp.finish_and_clear();

    result?;
    println!("{} Stack stopped", "✓".green().bold());
    Ok(())
}

pub async fn restart(update: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    let sp = spinner("Restarting the stack...");
    let outcome = ctx.lifecycle.restart(update).await;
    sp.finish_and_clear();

    report_start(&outcome?)?;
    Ok(())
}

pub async fn update(services: bool, extensions: bool, restart: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    let opts = UpdateOptions {
        services_only: services,
        extensions_only: extensions,
        force_restart: restart,
        called_from_start_restart: false,
    };

    let sp = spinner("Updating images...");
    let outcome = ctx.lifecycle.update(opts).await;
    sp.finish_and_clear();

    match outcome? {
        UpdateOutcome::RestartRequired => {
            bail!("the stack is running; pass --restart to stop and restart it during the update")
        }
        UpdateOutcome::Completed { extension_failures, native_failures, restarted } => {
            if restarted {
                println!("{} Stack updated and restarted", "✓".green().bold());
            } else {
                println!("{} Images updated", "✓".green().bold());
            }
            for ext in &extension_failures {
                println!("{} Extension update failed: {}", "✗".red().bold(), ext.bold());
            }
            for service in &native_failures {
                println!("{} Failed to restart: {}", "✗".red().bold(), service.bold());
            }
            if !extension_failures.is_empty() || !native_failures.is_empty() {
                bail!(
                    "update completed with {} failure(s)",
                    extension_failures.len() + native_failures.len()
                );
            }
        }
    }
    Ok(())
}

pub async fn status(json: bool) -> Result<()> {
    let ctx = AppContext::init().await?;
    let statuses = ctx.lifecycle.status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "SERVICE")]
        name: String,
        #[tabled(rename = "KIND")]
        kind: String,
        #[tabled(rename = "STATE")]
        state: String,
        #[tabled(rename = "HEALTH")]
        health: String,
        #[tabled(rename = "PORTS")]
        ports: String,
        #[tabled(rename = "CPU")]
        cpu: String,
        #[tabled(rename = "MEMORY")]
        memory: String,
    }

    let rows: Vec<StatusRow> = statuses
        .iter()
        .map(|s| StatusRow {
            name: s.name.clone(),
            kind: s.kind.to_string(),
            state: if s.is_running {
                s.lifecycle_state.green().to_string()
            } else {
                s.lifecycle_state.red().to_string()
            },
            health: match s.health {
                HealthState::Healthy => "healthy".green().to_string(),
                HealthState::Unhealthy => "unhealthy".red().to_string(),
                HealthState::Unknown => "unknown".dimmed().to_string(),
            },
            ports: s
                .ports
                .iter()
                .map(|(container, host)| match host {
                    Some(host) => format!("{}->{}", host, container),
                    None => container.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            cpu: s
                .resource_usage
                .cpu_percent
                .map(|v| format!("{:.1}%", v))
                .unwrap_or_else(|| "-".to_string()),
            memory: s
                .resource_usage
                .memory_mb
                .map(|v| format!("{:.0} MB", v))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    Ok(())
}

fn report_start(outcome: &StartOutcome) -> Result<()> {
    match outcome {
        StartOutcome::AlreadyRunning => {
            println!("{} Stack already running", "✓".green().bold());
        }
        StartOutcome::Started { native_failures } if native_failures.is_empty() => {
            println!("{} Stack started", "✓".green().bold());
        }
        StartOutcome::Started { native_failures } => {
            for service in native_failures {
                println!("{} Failed to start: {}", "✗".red().bold(), service.bold());
            }
            bail!("{} service(s) failed to start", native_failures.len());
        }
    }
    Ok(())
}
