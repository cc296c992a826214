//! Backup bundle manifest.
//!
//! The manifest at the bundle root is the single source of truth for what
//! the bundle is expected to contain. Its declared `volumes` and
//! `config_files` lists drive structural validation; anything on disk the
//! manifest does not mention is ignored.

use crate::error::{CorralError, Result};
use crate::platform::PlatformKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// File name of the manifest at the bundle root.
pub const MANIFEST_FILE: &str = "backup_manifest.json";

/// Directory of per-volume archives inside a bundle.
pub const VOLUMES_DIR: &str = "volumes";

/// Directory of configuration snapshots inside a bundle.
pub const CONFIG_DIR: &str = "config";

/// Options recorded into the manifest so a restore knows what the backup
/// was asked to capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub include_volumes: bool,
    pub include_config: bool,
    pub include_extensions: bool,
    /// Archive compression scheme. Only "gzip" is produced today.
    pub compression: String,
    /// Reserved; bundles are never encrypted today.
    pub encryption: Option<String>,
    /// Volume names matching any of these substrings are skipped.
    pub exclude_patterns: Vec<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            include_volumes: true,
            include_config: true,
            include_extensions: true,
            compression: "gzip".to_string(),
            encryption: None,
            exclude_patterns: Vec::new(),
        }
    }
}

impl BackupConfig {
    /// Whether a volume name is excluded by the configured patterns.
    #[must_use]
    pub fn excludes(&self, volume: &str) -> bool {
        self.exclude_patterns.iter().any(|p| volume.contains(p.as_str()))
    }
}

/// Self-describing manifest written at the root of every backup bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    /// Unique identifier of this backup.
    pub backup_id: String,

    /// Creation time, RFC 3339.
    pub created_at: String,

    /// Version of the stack definition that was backed up.
    pub stack_version: String,

    /// Version of the CLI that produced the bundle.
    pub cli_version: String,

    /// Platform the backup was taken on.
    pub platform: Option<PlatformKind>,

    /// What the backup was asked to capture.
    pub backup_config: BackupConfig,

    /// Volumes successfully archived into `volumes/<name>.tar.gz`.
    pub volumes: Vec<String>,

    /// Configuration files snapshotted into `config/`.
    pub config_files: Vec<String>,

    /// Extensions enabled at backup time. Recorded as intent only; their
    /// images are re-pulled on restore rather than archived.
    pub extensions: Vec<String>,

    /// SHA-256 over the manifest content with this field blanked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Aggregate bundle size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl BackupManifest {
    pub fn new(platform: Option<PlatformKind>, backup_config: BackupConfig) -> Self {
        Self {
            backup_id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            stack_version: env!("CARGO_PKG_VERSION").to_string(),
            cli_version: env!("CARGO_PKG_VERSION").to_string(),
            platform,
            backup_config,
            volumes: Vec::new(),
            config_files: Vec::new(),
            extensions: Vec::new(),
            checksum: None,
            size_bytes: None,
        }
    }

    /// Load and parse the manifest from a bundle directory. A missing or
    /// malformed manifest is a hard error; nothing is restorable without it.
    pub fn load(bundle_dir: &Path) -> Result<Self> {
        let path = bundle_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CorralError::InvalidManifest { path: path.clone(), reason: e.to_string() }
        })?;
        serde_json::from_str(&content)
            .map_err(|e| CorralError::InvalidManifest { path, reason: e.to_string() })
    }

    /// Write the manifest to the bundle root, computing the checksum over
    /// the serialized content with the checksum field blanked.
    pub fn save(&mut self, bundle_dir: &Path) -> Result<()> {
        self.checksum = None;
        let unsigned = serde_json::to_string_pretty(self)
            .map_err(|e| CorralError::Internal(format!("manifest serialization: {}", e)))?;
        self.checksum = Some(hex_digest(unsigned.as_bytes()));

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CorralError::Internal(format!("manifest serialization: {}", e)))?;
        let path = bundle_dir.join(MANIFEST_FILE);
        std::fs::write(&path, content).map_err(|e| CorralError::Io { path, source: e })
    }

    /// Verify the stored checksum against a recomputation. A manifest
    /// without a checksum passes; older bundles did not carry one.
    pub fn verify_checksum(&self) -> Result<()> {
        let Some(stored) = &self.checksum else {
            return Ok(());
        };
        let mut unsigned = self.clone();
        unsigned.checksum = None;
        let content = serde_json::to_string_pretty(&unsigned)
            .map_err(|e| CorralError::Internal(format!("manifest serialization: {}", e)))?;
        let computed = hex_digest(content.as_bytes());
        if &computed != stored {
            return Err(CorralError::Validation {
                reason: format!(
                    "manifest checksum mismatch: expected {}, computed {}",
                    stored, computed
                ),
            });
        }
        Ok(())
    }

    /// Path of a volume's archive inside a bundle.
    #[must_use]
    pub fn volume_archive(bundle_dir: &Path, volume: &str) -> std::path::PathBuf {
        bundle_dir.join(VOLUMES_DIR).join(format!("{}.tar.gz", volume))
    }

    /// Structural validation of the bundle against this manifest: every
    /// listed volume must have a readable archive, and the config snapshot
    /// directory must exist when config files are listed. A mismatch is a
    /// validation failure, never just a warning.
    pub fn validate_bundle(&self, bundle_dir: &Path) -> Result<()> {
        for volume in &self.volumes {
            let archive = Self::volume_archive(bundle_dir, volume);
            if !archive.is_file() {
                return Err(CorralError::MissingBackupComponent {
                    component: format!("volume archive {}/{}.tar.gz", VOLUMES_DIR, volume),
                });
            }
            validate_archive(&archive)?;
        }

        if !self.config_files.is_empty() {
            let config_dir = bundle_dir.join(CONFIG_DIR);
            if !config_dir.is_dir() {
                return Err(CorralError::MissingBackupComponent {
                    component: format!("{}/ directory", CONFIG_DIR),
                });
            }
            for file in &self.config_files {
                if !config_dir.join(file).is_file() {
                    return Err(CorralError::MissingBackupComponent {
                        component: format!("{}/{}", CONFIG_DIR, file),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Check that an archive is a readable gzip tar. Entry headers are walked
/// without extracting any file contents to disk.
fn validate_archive(path: &Path) -> Result<()> {
    let file = std::fs::File::open(path)
        .map_err(|e| CorralError::Io { path: path.to_path_buf(), source: e })?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let entries = archive.entries().map_err(|e| CorralError::Validation {
        reason: format!("{} is not a readable archive: {}", path.display(), e),
    })?;
    for entry in entries {
        entry.map_err(|e| CorralError::Validation {
            reason: format!("{} is corrupt: {}", path.display(), e),
        })?;
    }
    Ok(())
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest() -> BackupManifest {
        BackupManifest::new(Some(PlatformKind::GenericCpu), BackupConfig::default())
    }

    fn write_archive(bundle_dir: &Path, volume: &str) {
        let path = BackupManifest::volume_archive(bundle_dir, volume);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_path("data.bin").unwrap();
        header.set_size(4);
        header.set_cksum();
        builder.append(&header, &b"demo"[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_manifest_round_trip_with_checksum() {
        let dir = TempDir::new().unwrap();
        let mut m = manifest();
        m.volumes.push("corral_models".to_string());
        m.save(dir.path()).unwrap();

        let loaded = BackupManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.volumes, vec!["corral_models".to_string()]);
        assert!(loaded.checksum.is_some());
        loaded.verify_checksum().unwrap();
    }

    #[test]
    fn test_tampered_manifest_fails_checksum() {
        let dir = TempDir::new().unwrap();
        let mut m = manifest();
        m.save(dir.path()).unwrap();

        let mut loaded = BackupManifest::load(dir.path()).unwrap();
        loaded.volumes.push("injected".to_string());
        assert!(loaded.verify_checksum().is_err());
    }

    #[test]
    fn test_missing_manifest_is_invalid() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            BackupManifest::load(dir.path()),
            Err(CorralError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_malformed_manifest_is_invalid() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "{ nope").unwrap();
        assert!(matches!(
            BackupManifest::load(dir.path()),
            Err(CorralError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_validation_catches_missing_volume_archive() {
        let dir = TempDir::new().unwrap();
        write_archive(dir.path(), "a");

        let mut m = manifest();
        m.volumes = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            m.validate_bundle(dir.path()),
            Err(CorralError::MissingBackupComponent { .. })
        ));
    }

    #[test]
    fn test_validation_accepts_complete_bundle() {
        let dir = TempDir::new().unwrap();
        write_archive(dir.path(), "a");

        let mut m = manifest();
        m.volumes = vec!["a".to_string()];
        m.validate_bundle(dir.path()).unwrap();
    }

    #[test]
    fn test_validation_rejects_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(VOLUMES_DIR)).unwrap();
        std::fs::write(dir.path().join(VOLUMES_DIR).join("a.tar.gz"), b"not gzip").unwrap();

        let mut m = manifest();
        m.volumes = vec!["a".to_string()];
        assert!(matches!(m.validate_bundle(dir.path()), Err(CorralError::Validation { .. })));
    }

    #[test]
    fn test_validation_requires_config_dir_when_files_listed() {
        let dir = TempDir::new().unwrap();
        let mut m = manifest();
        m.config_files = vec!["corral.json".to_string()];
        assert!(m.validate_bundle(dir.path()).is_err());

        std::fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        std::fs::write(dir.path().join(CONFIG_DIR).join("corral.json"), b"{}").unwrap();
        m.validate_bundle(dir.path()).unwrap();
    }

    #[test]
    fn test_exclude_patterns() {
        let config = BackupConfig {
            exclude_patterns: vec!["cache".to_string()],
            ..BackupConfig::default()
        };
        assert!(config.excludes("corral_cache_layer"));
        assert!(!config.excludes("corral_models"));
    }
}
