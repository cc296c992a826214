//! Configuration management.
//!
//! Two files make up the persistent configuration:
//! - `corral.json` — the structured stack definition (services, compose
//!   files, per-platform overrides, data/backup directories)
//! - `.env` — an environment-style key/value file holding the compose
//!   project name and a generated secret key
//!
//! Loading either file never aborts the program: a missing or unparsable
//! file falls back to in-memory defaults, and the fallback is reported to
//! the caller so it can decide whether to persist the defaults.

use crate::error::{CorralError, Result};
use crate::paths;
use crate::platform::PlatformKind;
use crate::registry::ServiceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Where a loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from the file on disk.
    File,
    /// File was missing or unparsable; in-memory defaults were used.
    Defaults,
}

impl ConfigSource {
    /// True when the loader had to fall back to defaults.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Defaults)
    }
}

/// A service declared in the stack definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Service name (matches the compose service name).
    pub name: String,

    /// Deployment kind before platform detection runs.
    pub kind: ServiceKind,

    /// Optional health-check endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,
}

/// Configuration for the native-capable model server process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeProcessConfig {
    /// Command used to start the process.
    pub command: String,

    /// Arguments passed to the command.
    pub args: Vec<String>,

    /// Substring used to find the process in the process table.
    pub process_pattern: String,

    /// Log file the process writes to.
    pub log_file: String,
}

impl Default for NativeProcessConfig {
    fn default() -> Self {
        Self {
            command: "model-server".to_string(),
            args: vec!["serve".to_string()],
            process_pattern: "model-server serve".to_string(),
            log_file: "~/.model-server/server.log".to_string(),
        }
    }
}

/// Persistent stack configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Services in the stack.
    pub services: Vec<ServiceEntry>,

    /// Base compose files, in the order they are passed to the engine.
    pub compose_files: Vec<String>,

    /// Per-platform additional compose file, keyed by platform name.
    pub platform_compose: BTreeMap<String, String>,

    /// Enabled extensions, each backed by a compose file under
    /// `extensions/<name>/docker-compose.yml`.
    pub extensions: Vec<String>,

    /// Native process settings for the model server.
    pub native: NativeProcessConfig,

    /// Data directory for the stack.
    pub data_dir: String,

    /// Default directory for backup bundles.
    pub backup_dir: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            services: vec![
                ServiceEntry {
                    name: "model-server".to_string(),
                    kind: ServiceKind::Containerized,
                    health_check_url: Some("http://127.0.0.1:11434/".to_string()),
                },
                ServiceEntry {
                    name: "web-ui".to_string(),
                    kind: ServiceKind::Containerized,
                    health_check_url: Some("http://127.0.0.1:3000/health".to_string()),
                },
                ServiceEntry {
                    name: "proxy".to_string(),
                    kind: ServiceKind::Containerized,
                    health_check_url: None,
                },
            ],
            compose_files: vec!["docker-compose.yml".to_string()],
            platform_compose: BTreeMap::from([
                ("gpu".to_string(), "docker-compose.gpu.yml".to_string()),
                ("apple-silicon".to_string(), "docker-compose.apple.yml".to_string()),
            ]),
            extensions: Vec::new(),
            native: NativeProcessConfig::default(),
            data_dir: paths::data_dir().to_string_lossy().to_string(),
            backup_dir: paths::backups_dir().to_string_lossy().to_string(),
        }
    }
}

impl StackConfig {
    /// Load the stack configuration, falling back to defaults if the file
    /// is missing or malformed. The returned source tells the caller
    /// whether a fallback occurred.
    pub fn load(path: &Path) -> (Self, ConfigSource) {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return (Self::default(), ConfigSource::Defaults),
        };

        match serde_json::from_str(&content) {
            Ok(config) => (config, ConfigSource::File),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unparsable config, using defaults");
                (Self::default(), ConfigSource::Defaults)
            }
        }
    }

    /// Save the configuration to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CorralError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            CorralError::InvalidConfig { reason: format!("Failed to serialize config: {}", e) }
        })?;
        std::fs::write(path, content)
            .map_err(|e| CorralError::Io { path: path.to_path_buf(), source: e })
    }

    /// Compose files to pass to the engine for the given platform:
    /// the base files plus any per-platform override, resolved against
    /// the compose directory.
    pub fn compose_files_for(&self, platform: PlatformKind, compose_dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> =
            self.compose_files.iter().map(|f| compose_dir.join(f)).collect();
        if let Some(extra) = self.platform_compose.get(platform.as_str()) {
            files.push(compose_dir.join(extra));
        }
        files
    }

    /// Compose file backing an extension.
    pub fn extension_compose_file(&self, extension: &str, compose_dir: &Path) -> PathBuf {
        compose_dir.join("extensions").join(extension).join("docker-compose.yml")
    }
}

/// Environment-style key/value file (`.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvFile {
    /// Compose project name; doubles as the engine's grouping label value.
    pub project_name: String,

    /// Generated secret key shared by the stack's services.
    pub secret_key: String,
}

impl Default for EnvFile {
    fn default() -> Self {
        Self { project_name: "corral".to_string(), secret_key: generate_secret_key() }
    }
}

impl EnvFile {
    /// Load the env file, falling back to defaults (with a freshly
    /// generated secret key) if it is missing or malformed.
    pub fn load(path: &Path) -> (Self, ConfigSource) {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return (Self::default(), ConfigSource::Defaults),
        };

        let mut project_name = None;
        let mut secret_key = None;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "PROJECT_NAME" => project_name = Some(value.trim().to_string()),
                    "SECRET_KEY" => secret_key = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }

        match (project_name, secret_key) {
            (Some(project_name), Some(secret_key)) => {
                (Self { project_name, secret_key }, ConfigSource::File)
            }
            _ => {
                warn!(path = %path.display(), "Incomplete env file, using defaults");
                (Self::default(), ConfigSource::Defaults)
            }
        }
    }

    /// Save the env file to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CorralError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let content =
            format!("PROJECT_NAME={}\nSECRET_KEY={}\n", self.project_name, self.secret_key);
        std::fs::write(path, content)
            .map_err(|e| CorralError::Io { path: path.to_path_buf(), source: e })
    }
}

/// Generate a new secret key for the stack.
pub fn generate_secret_key() -> String {
    format!("sk-{}", uuid::Uuid::new_v4().simple())
}
