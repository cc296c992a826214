//! Centralized path configuration for corral.
//!
//! All data paths go through this module so the CLI and the orchestration
//! core agree on where configuration, compose files, and backups live.

use std::path::PathBuf;

/// Get the corral data directory.
///
/// Resolution order:
/// 1. `CORRAL_DATA_DIR` environment variable
/// 2. `~/.corral` in the user's home directory
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CORRAL_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::home_dir().map(|h| h.join(".corral")).unwrap_or_else(|| PathBuf::from(".corral"))
}

/// Get the configuration directory (structured config + env file).
pub fn config_dir() -> PathBuf {
    data_dir().join("config")
}

/// Get the path to the structured configuration file.
pub fn config_path() -> PathBuf {
    config_dir().join("corral.json")
}

/// Get the path to the environment-style key/value file.
pub fn env_path() -> PathBuf {
    config_dir().join(".env")
}

/// Get the default backups directory.
pub fn backups_dir() -> PathBuf {
    data_dir().join("backups")
}

/// Get the directory containing compose files for the stack.
pub fn compose_dir() -> PathBuf {
    config_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_consistency() {
        let base = data_dir();
        assert!(config_dir().starts_with(&base));
        assert!(config_path().starts_with(&base));
        assert!(backups_dir().starts_with(&base));
    }
}
