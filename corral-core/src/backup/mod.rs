//! Backup bundle creation.
//!
//! A backup is a directory bundle: `backup_manifest.json` at the root,
//! `volumes/<name>.tar.gz` per archived volume, and `config/` holding the
//! raw configuration snapshot. Steps run in a fixed order and keep going
//! past individual failures; a backup should capture as much as possible
//! rather than stop at the first error.

use crate::engine::ContainerEngine;
use crate::error::{CorralError, Result};
use crate::lifecycle::LifecycleOrchestrator;
use crate::platform::PlatformKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub mod manifest;
pub mod restore;

pub use manifest::{BackupConfig, BackupManifest, CONFIG_DIR, MANIFEST_FILE, VOLUMES_DIR};
pub use restore::{RestoreOptions, RestoreOrchestrator, RestoreOutcome};

/// Configuration files snapshotted into a bundle, in copy order.
pub const CONFIG_FILES: &[&str] = &["corral.json", ".env"];

/// Best-effort stack-state snapshot written next to the manifest.
pub const STATE_SNAPSHOT_FILE: &str = "stack_state.json";

/// Result of a backup run.
#[derive(Debug)]
pub struct BackupReport {
    pub bundle_dir: PathBuf,
    pub manifest: BackupManifest,
    /// Volumes that could not be archived. Their names are absent from the
    /// manifest, so restore never expects them.
    pub volume_failures: Vec<String>,
    /// Config files that could not be snapshotted.
    pub config_failures: Vec<String>,
}

impl BackupReport {
    /// Overall success flag: false if anything was asked for but missed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.volume_failures.is_empty() && self.config_failures.is_empty()
    }
}

/// Produces self-describing backup bundles.
pub struct BackupOrchestrator {
    engine: Arc<dyn ContainerEngine>,
    lifecycle: Arc<LifecycleOrchestrator>,
    config_dir: PathBuf,
    extensions: Vec<String>,
    platform: Option<PlatformKind>,
}

impl BackupOrchestrator {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        lifecycle: Arc<LifecycleOrchestrator>,
        config_dir: PathBuf,
        extensions: Vec<String>,
        platform: Option<PlatformKind>,
    ) -> Self {
        Self { engine, lifecycle, config_dir, extensions, platform }
    }

    /// Timestamped bundle directory under the configured backup root.
    #[must_use]
    pub fn default_bundle_dir(backups_dir: &Path) -> PathBuf {
        let stamp = chrono::Local::now().format("backup_%Y%m%d_%H%M%S");
        backups_dir.join(stamp.to_string())
    }

    /// Create a backup bundle at `bundle_dir`.
    #[instrument(skip(self, opts))]
    pub async fn create_backup(
        &self,
        bundle_dir: &Path,
        opts: BackupConfig,
    ) -> Result<BackupReport> {
        std::fs::create_dir_all(bundle_dir)
            .map_err(|e| CorralError::Io { path: bundle_dir.to_path_buf(), source: e })?;

        let mut manifest = BackupManifest::new(self.platform, opts.clone());
        let mut volume_failures = Vec::new();
        let mut config_failures = Vec::new();

        if opts.include_volumes {
            self.archive_volumes(bundle_dir, &opts, &mut manifest, &mut volume_failures)
                .await?;
        }

        if opts.include_config {
            self.snapshot_config(bundle_dir, &mut manifest, &mut config_failures);
        }

        if opts.include_extensions {
            // Intent only: extension images are re-pulled on restore, so the
            // manifest records names but no archives are produced.
            manifest.extensions = self.extensions.clone();
        }

        self.snapshot_state(bundle_dir).await;

        // Measure after a first write so the recorded size covers the
        // manifest file as well, then rewrite with the size stamped in.
        manifest.save(bundle_dir)?;
        manifest.size_bytes = Some(dir_size(bundle_dir));
        manifest.save(bundle_dir)?;

        // Self-check: the bundle must validate the same way a restore will
        // see it before success is reported.
        let reread = BackupManifest::load(bundle_dir)?;
        reread.verify_checksum()?;
        reread.validate_bundle(bundle_dir)?;

        info!(
            bundle = %bundle_dir.display(),
            volumes = manifest.volumes.len(),
            failed = volume_failures.len(),
            "Backup bundle written"
        );
        Ok(BackupReport {
            bundle_dir: bundle_dir.to_path_buf(),
            manifest,
            volume_failures,
            config_failures,
        })
    }

    async fn archive_volumes(
        &self,
        bundle_dir: &Path,
        opts: &BackupConfig,
        manifest: &mut BackupManifest,
        failures: &mut Vec<String>,
    ) -> Result<()> {
        let volumes = self.engine.list_volumes(&self.lifecycle.volume_label()).await?;

        let volumes_dir = bundle_dir.join(VOLUMES_DIR);
        if let Err(e) = std::fs::create_dir_all(&volumes_dir) {
            warn!(path = %volumes_dir.display(), error = %e, "Volume archiving skipped, continuing");
            failures.extend(
                volumes.into_iter().filter(|v| !opts.excludes(&v.name)).map(|v| v.name),
            );
            return Ok(());
        }

        for volume in volumes {
            if opts.excludes(&volume.name) {
                info!(volume = %volume.name, "Volume excluded from backup");
                continue;
            }
            let dest = BackupManifest::volume_archive(bundle_dir, &volume.name);
            match self.engine.archive_volume(&volume.name, &dest).await {
                Ok(()) => {
                    info!(volume = %volume.name, "Volume archived");
                    manifest.volumes.push(volume.name);
                }
                Err(e) => {
                    warn!(volume = %volume.name, error = %e, "Volume archive failed, continuing");
                    failures.push(volume.name);
                }
            }
        }
        Ok(())
    }

    fn snapshot_config(
        &self,
        bundle_dir: &Path,
        manifest: &mut BackupManifest,
        failures: &mut Vec<String>,
    ) {
        let snapshot_dir = bundle_dir.join(CONFIG_DIR);
        if let Err(e) = std::fs::create_dir_all(&snapshot_dir) {
            warn!(path = %snapshot_dir.display(), error = %e, "Config snapshot skipped, continuing");
            failures.extend(
                CONFIG_FILES
                    .iter()
                    .filter(|f| self.config_dir.join(f).is_file())
                    .map(|f| (*f).to_string()),
            );
            return;
        }

        for file in CONFIG_FILES {
            let source = self.config_dir.join(file);
            if !source.is_file() {
                continue;
            }
            match std::fs::copy(&source, snapshot_dir.join(file)) {
                Ok(_) => manifest.config_files.push((*file).to_string()),
                Err(e) => {
                    warn!(file, error = %e, "Config snapshot failed, continuing");
                    failures.push((*file).to_string());
                }
            }
        }
    }

    async fn snapshot_state(&self, bundle_dir: &Path) {
        // Best-effort only. A stopped engine must not fail the backup.
        let statuses = match self.lifecycle.status().await {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(error = %e, "Skipping stack-state snapshot");
                return;
            }
        };
        match serde_json::to_string_pretty(&statuses) {
            Ok(content) => {
                if let Err(e) = std::fs::write(bundle_dir.join(STATE_SNAPSHOT_FILE), content) {
                    warn!(error = %e, "Could not write stack-state snapshot");
                }
            }
            Err(e) => warn!(error = %e, "Could not serialize stack-state snapshot"),
        }
    }
}

/// Recursive size in bytes of everything under `path`.
fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}
