use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod prompt;

#[derive(Parser)]
#[command(name = "corral")]
#[command(about = "Lifecycle CLI for a local model-serving stack", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration and environment file
    Install {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Start the stack
    Start {
        /// Pull newest images before starting
        #[arg(short, long)]
        update: bool,
    },

    /// Stop the stack
    Stop,

    /// Restart the stack
    Restart {
        /// Pull newest images during the restart
        #[arg(short, long)]
        update: bool,
    },

    /// Show per-service status
    Status {
        /// Emit structured JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run environment preflight checks
    Check,

    /// Show service logs
    Logs {
        /// Service name (all services when omitted)
        service: Option<String>,

        /// Keep following new lines
        #[arg(short, long)]
        follow: bool,

        /// Number of trailing lines to show
        #[arg(short, long, default_value = "100")]
        tail: usize,
    },

    /// Pull newest service and extension images
    Update {
        /// Update core services only
        #[arg(long)]
        services: bool,

        /// Update extensions only
        #[arg(long)]
        extensions: bool,

        /// Allow stopping and restarting a running stack
        #[arg(short, long)]
        restart: bool,
    },

    /// Create a backup bundle
    Backup {
        /// Bundle directory (defaults to a timestamped directory under
        /// the configured backup dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip volume archives
        #[arg(long)]
        no_volumes: bool,

        /// Skip the configuration snapshot
        #[arg(long)]
        no_config: bool,

        /// Skip recording enabled extensions
        #[arg(long)]
        no_extensions: bool,

        /// Skip volumes whose name contains this substring (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Restore a backup bundle
    Restore {
        /// Bundle directory
        dir: PathBuf,

        /// Validate the bundle and exit without restoring anything
        #[arg(long)]
        validate_only: bool,

        /// Skip confirmation prompts
        #[arg(short, long)]
        force: bool,
    },

    /// Remove the stack and its resources
    Uninstall {
        /// Also remove stack images
        #[arg(long)]
        remove_images: bool,

        /// Also remove stack volumes (destroys models and data)
        #[arg(long)]
        remove_volumes: bool,

        /// Also remove the configuration directory
        #[arg(long)]
        remove_config: bool,

        /// Remove everything (implies volumes and config)
        #[arg(long)]
        all: bool,

        /// Skip confirmation prompts
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("CORRAL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Install { force } => commands::install::install(force).await?,

        Commands::Start { update } => commands::stack::start(update).await?,

        Commands::Stop => commands::stack::stop().await?,

        Commands::Restart { update } => commands::stack::restart(update).await?,

        Commands::Status { json } => commands::stack::status(json).await?,

        Commands::Check => commands::check::check().await?,

        Commands::Logs { service, follow, tail } => {
            commands::logs::logs(service.as_deref(), follow, tail).await?
        }

        Commands::Update { services, extensions, restart } => {
            commands::stack::update(services, extensions, restart).await?
        }

        Commands::Backup { output, no_volumes, no_config, no_extensions, exclude } => {
            commands::backup::backup(output, no_volumes, no_config, no_extensions, exclude)
                .await?
        }

        Commands::Restore { dir, validate_only, force } => {
            commands::backup::restore(&dir, validate_only, force).await?
        }

        Commands::Uninstall { remove_images, remove_volumes, remove_config, all, force } => {
            commands::uninstall::uninstall(remove_images, remove_volumes, remove_config, all, force)
                .await?
        }
    }

    Ok(())
}
