//! Container engine abstraction.
//!
//! The orchestration core never talks to a container runtime directly; it
//! sequences calls to a [`ContainerEngine`] collaborator. The real client
//! ([`DockerEngine`]) shells out to `docker` / `docker compose`; tests
//! substitute a mock.

use crate::error::Result;
use crate::logs::LogStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

mod docker;

pub use docker::DockerEngine;

/// Label carried by every stack-managed container and network.
pub const COMPONENT_LABEL: &str = "sh.corral.component";

/// The engine's own project-grouping label. Volumes are discovered via
/// this label because the engine applies it more reliably than a custom one.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Captured output of an engine invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runtime-capability information reported by the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    /// Advertised runtimes (e.g. "runc", "nvidia").
    pub runtimes: Vec<String>,
    pub server_version: String,
}

impl EngineInfo {
    /// Whether a GPU-capable runtime is advertised.
    #[must_use]
    pub fn has_gpu_runtime(&self) -> bool {
        self.runtimes.iter().any(|r| r.contains("nvidia"))
    }
}

/// Summary of a container as reported by the engine.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    /// Engine lifecycle state string ("running", "exited", ...).
    pub state: String,
    pub running: bool,
    pub labels: HashMap<String, String>,
    /// container port -> published host port (None when unpublished).
    pub ports: BTreeMap<u16, Option<u16>>,
}

impl ContainerSummary {
    /// Compose service name this container belongs to, if labeled.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.labels.get("com.docker.compose.service").map(String::as_str)
    }
}

/// Summary of an engine-managed network.
#[derive(Debug, Clone)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
}

/// Summary of an engine-managed volume.
#[derive(Debug, Clone)]
pub struct VolumeSummary {
    pub name: String,
}

/// Summary of an engine-managed image.
#[derive(Debug, Clone)]
pub struct ImageSummary {
    pub id: String,
    pub reference: String,
}

/// Point-in-time resource usage for one container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
}

/// Container engine collaborator.
///
/// Compose operations accept an ordered list of compose-file paths plus an
/// optional service-name subset (empty slice means all services).
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Check that the engine is reachable at all.
    async fn ping(&self) -> Result<()>;

    /// Query runtime-capability information.
    async fn info(&self) -> Result<EngineInfo>;

    /// Create and start services (`up -d`).
    async fn compose_up(&self, files: &[PathBuf], services: &[String]) -> Result<CommandOutput>;

    /// Stop services without removing their containers.
    async fn compose_stop(&self, files: &[PathBuf], services: &[String]) -> Result<CommandOutput>;

    /// Stop and remove containers and networks.
    async fn compose_down(&self, files: &[PathBuf]) -> Result<CommandOutput>;

    /// Pull the newest images for services.
    async fn compose_pull(&self, files: &[PathBuf], services: &[String]) -> Result<CommandOutput>;

    /// Stream service log lines.
    async fn compose_logs(
        &self,
        files: &[PathBuf],
        services: &[String],
        follow: bool,
        tail: usize,
    ) -> Result<LogStream>;

    /// Enumerate containers carrying the given `key=value` label.
    async fn list_containers(&self, label: &str) -> Result<Vec<ContainerSummary>>;

    /// Enumerate networks carrying the given `key=value` label.
    async fn list_networks(&self, label: &str) -> Result<Vec<NetworkSummary>>;

    /// Enumerate volumes carrying the given `key=value` label.
    async fn list_volumes(&self, label: &str) -> Result<Vec<VolumeSummary>>;

    /// Enumerate images carrying the given `key=value` label.
    async fn list_images(&self, label: &str) -> Result<Vec<ImageSummary>>;

    /// Remove a container.
    async fn remove_container(&self, id: &str, force: bool) -> Result<()>;

    /// Remove a network.
    async fn remove_network(&self, id: &str) -> Result<()>;

    /// Remove a volume.
    async fn remove_volume(&self, name: &str) -> Result<()>;

    /// Remove an image.
    async fn remove_image(&self, id: &str) -> Result<()>;

    /// Resource-usage snapshot for one container.
    async fn container_stats(&self, id: &str) -> Result<ResourceUsage>;

    /// Archive a volume's contents into a `.tar.gz` file at `dest`.
    async fn archive_volume(&self, volume: &str, dest: &Path) -> Result<()>;

    /// Recreate a volume from a `.tar.gz` archive.
    async fn restore_volume(&self, volume: &str, archive: &Path) -> Result<()>;

    /// Engine name (for logging).
    fn name(&self) -> &str;
}
