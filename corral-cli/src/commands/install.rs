//! First-time setup: write the default configuration and environment file.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use corral_core::{paths, platform, ContainerEngine, DockerEngine, EnvFile, StackConfig};

pub async fn install(force: bool) -> Result<()> {
    let config_path = paths::config_path();
    if config_path.exists() && !force {
        bail!(
            "configuration already exists at {}; pass --force to overwrite it",
            config_path.display()
        );
    }

    let engine = DockerEngine::detect("corral").await;
    engine.ping().await.context("the container engine must be running to install")?;

    let detected = platform::detect(&engine).await;
    println!("{} Platform: {}", "→".cyan().bold(), detected.to_string().bold());

    let config = StackConfig::default();
    config.save(&config_path)?;
    println!("{} Wrote {}", "✓".green().bold(), config_path.display());

    // A fresh install gets a fresh secret key.
    let env = EnvFile::default();
    env.save(&paths::env_path())?;
    println!("{} Wrote {}", "✓".green().bold(), paths::env_path().display());

    for dir in [paths::backups_dir(), paths::compose_dir()] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("could not create {}", dir.display()))?;
    }

    println!();
    println!("Services configured:");
    for service in &config.services {
        println!("  {} {}", "•".dimmed(), service.name.bold());
    }
    println!();
    println!(
        "{}",
        "Place your compose files in the config directory, then run `corral start`.".dimmed()
    );
    Ok(())
}
