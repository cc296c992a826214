//! Backup bundle restoration.
//!
//! Restore is manifest-first and fail-fast: an unparsable manifest or a
//! structurally incomplete bundle aborts before anything is touched.
//! Validate-only mode stops after validation and never mutates state.
//! Destructive gates (stopping a running stack, overwriting existing
//! configuration) require either a force flag or operator confirmation.

use crate::backup::{BackupManifest, CONFIG_DIR};
use crate::config::{ConfigSource, StackConfig};
use crate::confirm::Confirmer;
use crate::engine::ContainerEngine;
use crate::error::{CorralError, Result};
use crate::lifecycle::LifecycleOrchestrator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Flags controlling a restore run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    /// Validate the bundle and stop; never mutate anything.
    pub validate_only: bool,
    /// Skip the confirmation gates.
    pub force: bool,
}

/// Result of a restore run.
#[derive(Debug)]
pub enum RestoreOutcome {
    /// Validate-only mode: the bundle is structurally sound.
    Validated,
    /// The operator declined a confirmation gate. Nothing was mutated
    /// beyond what the declined step would have required.
    Cancelled { reason: String },
    /// Restore ran to completion.
    Restored {
        /// Volumes successfully restored from their archives.
        restored_volumes: Vec<String>,
        /// Volumes whose restore failed. Partial restore is still useful,
        /// so these do not abort the run.
        failed_volumes: Vec<String>,
        /// Extensions whose image pull failed (best-effort step).
        extension_failures: Vec<String>,
        /// Post-restore verification warnings.
        warnings: Vec<String>,
        /// Reloaded configuration, when config files were restored.
        config: Option<StackConfig>,
    },
}

impl RestoreOutcome {
    /// Overall success flag.
    #[must_use]
    pub fn success(&self) -> bool {
        match self {
            Self::Validated => true,
            Self::Cancelled { .. } => false,
            Self::Restored { failed_volumes, .. } => failed_volumes.is_empty(),
        }
    }
}

/// Consumes backup bundles produced by the backup orchestrator.
pub struct RestoreOrchestrator {
    engine: Arc<dyn ContainerEngine>,
    lifecycle: Arc<LifecycleOrchestrator>,
    config_dir: PathBuf,
    /// Extension compose files, for the best-effort re-pull step.
    extensions: Vec<(String, PathBuf)>,
    confirmer: Arc<dyn Confirmer>,
}

impl RestoreOrchestrator {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        lifecycle: Arc<LifecycleOrchestrator>,
        config_dir: PathBuf,
        extensions: Vec<(String, PathBuf)>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        Self { engine, lifecycle, config_dir, extensions, confirmer }
    }

    /// Restore a bundle.
    #[instrument(skip(self, opts))]
    pub async fn restore(&self, bundle_dir: &Path, opts: RestoreOptions) -> Result<RestoreOutcome> {
        let manifest = BackupManifest::load(bundle_dir)?;
        manifest.verify_checksum()?;
        manifest.validate_bundle(bundle_dir)?;

        if opts.validate_only {
            info!(bundle = %bundle_dir.display(), "Bundle validated");
            return Ok(RestoreOutcome::Validated);
        }

        if self.lifecycle.is_running().await? {
            if !opts.force
                && !self
                    .confirmer
                    .confirm("The stack is running and must be stopped to restore. Stop it?")
            {
                return Ok(RestoreOutcome::Cancelled {
                    reason: "stack is running; restore declined".to_string(),
                });
            }
            self.lifecycle.stop().await?;
        }

        let config = if manifest.config_files.is_empty() {
            info!("Bundle carries no configuration snapshot");
            None
        } else {
            match self.restore_config(bundle_dir, &manifest, opts.force)? {
                Some(config) => Some(config),
                None => {
                    return Ok(RestoreOutcome::Cancelled {
                        reason: "existing configuration kept; restore declined".to_string(),
                    })
                }
            }
        };

        let mut restored_volumes = Vec::new();
        let mut failed_volumes = Vec::new();
        for volume in &manifest.volumes {
            let archive = BackupManifest::volume_archive(bundle_dir, volume);
            match self.engine.restore_volume(volume, &archive).await {
                Ok(()) => {
                    info!(volume = %volume, "Volume restored");
                    restored_volumes.push(volume.clone());
                }
                Err(e) => {
                    warn!(volume = %volume, error = %e, "Volume restore failed, continuing");
                    failed_volumes.push(volume.clone());
                }
            }
        }

        let extension_failures = self.restore_extensions(&manifest).await;
        let warnings = self.verify_volumes(&manifest).await;

        Ok(RestoreOutcome::Restored {
            restored_volumes,
            failed_volumes,
            extension_failures,
            warnings,
            config,
        })
    }

    /// Copy config files back and reload them. Returns `None` when the
    /// operator declined the overwrite gate, `Some` otherwise.
    fn restore_config(
        &self,
        bundle_dir: &Path,
        manifest: &BackupManifest,
        force: bool,
    ) -> Result<Option<StackConfig>> {
        let would_overwrite =
            manifest.config_files.iter().any(|f| self.config_dir.join(f).is_file());
        if would_overwrite
            && !force
            && !self.confirmer.confirm("Existing configuration files will be overwritten. Continue?")
        {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.config_dir)
            .map_err(|e| CorralError::Io { path: self.config_dir.clone(), source: e })?;
        let snapshot_dir = bundle_dir.join(CONFIG_DIR);
        for file in &manifest.config_files {
            let source = snapshot_dir.join(file);
            let dest = self.config_dir.join(file);
            std::fs::copy(&source, &dest)
                .map_err(|e| CorralError::Io { path: dest.clone(), source: e })?;
            info!(file = %file, "Configuration file restored");
        }

        // Reload so subsequent operations see the restored state.
        let (config, source) = StackConfig::load(&self.config_dir.join("corral.json"));
        if source == ConfigSource::Defaults && manifest.config_files.iter().any(|f| f == "corral.json")
        {
            return Err(CorralError::RestoreFailed {
                reason: "restored corral.json did not parse".to_string(),
            });
        }
        Ok(Some(config))
    }

    /// Best-effort re-pull of recorded extensions. Failures are collected,
    /// never fatal.
    async fn restore_extensions(&self, manifest: &BackupManifest) -> Vec<String> {
        let mut failures = Vec::new();
        for name in &manifest.extensions {
            let Some((_, file)) = self.extensions.iter().find(|(n, _)| n == name) else {
                warn!(extension = %name, "Recorded extension is no longer configured");
                failures.push(name.clone());
                continue;
            };
            match self.engine.compose_pull(&[file.clone()], &[]).await {
                Ok(output) if output.success => {
                    info!(extension = %name, "Extension images pulled");
                }
                Ok(output) => {
                    warn!(extension = %name, stderr = %output.stderr.trim(), "Extension pull failed");
                    failures.push(name.clone());
                }
                Err(e) => {
                    warn!(extension = %name, error = %e, "Extension pull failed");
                    failures.push(name.clone());
                }
            }
        }
        failures
    }

    /// Post-restore verification: every manifest-listed volume should now
    /// exist. Missing ones are warnings; partial restore is still useful.
    async fn verify_volumes(&self, manifest: &BackupManifest) -> Vec<String> {
        let existing = match self.engine.list_volumes(&self.lifecycle.volume_label()).await {
            Ok(volumes) => volumes,
            Err(e) => {
                return vec![format!("could not verify restored volumes: {}", e)];
            }
        };
        manifest
            .volumes
            .iter()
            .filter(|v| !existing.iter().any(|e| &e.name == *v))
            .map(|v| format!("volume {} was not found after restore", v))
            .collect()
    }
}
