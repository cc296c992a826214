//! Label-based resource cleanup (uninstall).
//!
//! Discovery is purely label-based: containers and networks are found via
//! the stack's own component label, volumes via the engine's project
//! grouping label (volumes cannot always carry the custom one). Running
//! twice on an already-cleaned stack succeeds both times; nothing left to
//! remove is a valid terminal state.

use crate::confirm::Confirmer;
use crate::engine::ContainerEngine;
use crate::error::{CorralError, Result};
use crate::lifecycle::LifecycleOrchestrator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What an uninstall is allowed to remove beyond containers and networks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    pub remove_images: bool,
    pub remove_volumes: bool,
    pub remove_config: bool,
    /// Remove everything. Forces `remove_volumes` and `remove_config` on,
    /// regardless of their individual settings.
    pub remove_everything: bool,
    /// Skip the volume-removal confirmation gate.
    pub force: bool,
}

impl CleanupOptions {
    fn volumes(&self) -> bool {
        self.remove_everything || self.remove_volumes
    }

    fn config(&self) -> bool {
        self.remove_everything || self.remove_config
    }
}

/// Counts of what a cleanup run removed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub containers_removed: usize,
    pub networks_removed: usize,
    pub images_removed: usize,
    pub volumes_removed: usize,
    pub config_removed: bool,
    /// The operator declined volume removal; everything else still ran.
    pub volumes_declined: bool,
}

/// Removes every stack-labeled resource.
pub struct ResourceCleanupEngine {
    engine: Arc<dyn ContainerEngine>,
    lifecycle: Arc<LifecycleOrchestrator>,
    config_dir: PathBuf,
    confirmer: Arc<dyn Confirmer>,
}

impl ResourceCleanupEngine {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        lifecycle: Arc<LifecycleOrchestrator>,
        config_dir: PathBuf,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        Self { engine, lifecycle, config_dir, confirmer }
    }

    /// Run the cleanup. Idempotent: an already-clean stack reports success
    /// with zero counts.
    #[instrument(skip(self, opts))]
    pub async fn cleanup(&self, opts: CleanupOptions) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        if self.lifecycle.is_running().await? {
            info!("Stopping running stack before cleanup");
            if let Err(e) = self.lifecycle.stop().await {
                // Containers are force-removed next, so a failed stop is
                // reported but does not abort the cleanup.
                warn!(error = %e, "Stop failed, proceeding with forced removal");
            }
        }

        let label = self.lifecycle.stack_label();

        for container in self.engine.list_containers(&label).await? {
            self.engine.remove_container(&container.id, true).await?;
            info!(container = %container.name, "Container removed");
            report.containers_removed += 1;
        }

        for network in self.engine.list_networks(&label).await? {
            self.engine.remove_network(&network.id).await?;
            info!(network = %network.name, "Network removed");
            report.networks_removed += 1;
        }

        if opts.remove_images {
            for image in self.engine.list_images(&label).await? {
                self.engine.remove_image(&image.id).await?;
                info!(image = %image.reference, "Image removed");
                report.images_removed += 1;
            }
        }

        if opts.volumes() {
            let volumes = self.engine.list_volumes(&self.lifecycle.volume_label()).await?;
            let confirmed = volumes.is_empty()
                || opts.force
                || self.confirmer.confirm(
                    "Volumes hold models and application data and cannot be recovered. Remove them?",
                );
            if confirmed {
                for volume in volumes {
                    self.engine.remove_volume(&volume.name).await?;
                    info!(volume = %volume.name, "Volume removed");
                    report.volumes_removed += 1;
                }
            } else {
                info!("Volume removal declined");
                report.volumes_declined = true;
            }
        }

        if opts.config() && self.config_dir.is_dir() {
            std::fs::remove_dir_all(&self.config_dir)
                .map_err(|e| CorralError::Io { path: self.config_dir.clone(), source: e })?;
            info!(dir = %self.config_dir.display(), "Configuration directory removed");
            report.config_removed = true;
        }

        Ok(report)
    }
}
