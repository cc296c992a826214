//! Host process implementation of [`NativeService`].

use super::NativeService;
use crate::config::NativeProcessConfig;
use crate::error::{CorralError, Result};
use crate::logs::LogStream;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Manages a native service through OS process inspection (`pgrep` /
/// `pkill`) and log-file tailing.
pub struct HostProcessService {
    name: String,
    config: NativeProcessConfig,
}

impl HostProcessService {
    pub fn new(name: impl Into<String>, config: NativeProcessConfig) -> Self {
        Self { name: name.into(), config }
    }

    fn log_path(&self) -> PathBuf {
        let raw = &self.config.log_file;
        if let Some(rest) = raw.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(raw)
    }
}

#[async_trait]
impl NativeService for HostProcessService {
    fn service_name(&self) -> &str {
        &self.name
    }

    async fn is_running(&self) -> bool {
        Command::new("pgrep")
            .args(["-f", &self.config.process_pattern])
            .stdout(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[instrument(skip(self), fields(service = %self.name))]
    async fn start(&self) -> Result<()> {
        if self.is_running().await {
            debug!("Native service already running");
            return Ok(());
        }

        let log_path = self.log_path();
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CorralError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let log_file = std::fs::File::create(&log_path)
            .map_err(|e| CorralError::Io { path: log_path.clone(), source: e })?;
        let log_err = log_file
            .try_clone()
            .map_err(|e| CorralError::Io { path: log_path.clone(), source: e })?;

        info!(command = %self.config.command, "Starting native service");

        // Dropping the Child handle leaves the server process running;
        // tokio only reaps children spawned with kill_on_drop.
        Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| CorralError::NativeStartFailed {
                service: self.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(service = %self.name))]
    async fn stop(&self) -> Result<()> {
        let status = Command::new("pkill")
            .args(["-f", &self.config.process_pattern])
            .status()
            .await
            .map_err(|e| CorralError::NativeStopFailed {
                service: self.name.clone(),
                reason: e.to_string(),
            })?;

        // pkill exits 1 when no process matched, which is the stopped
        // state we wanted anyway.
        match status.code() {
            Some(0) | Some(1) => Ok(()),
            code => Err(CorralError::NativeStopFailed {
                service: self.name.clone(),
                reason: format!("pkill exited with {:?}", code),
            }),
        }
    }

    async fn logs(&self, follow: bool, tail: usize) -> Result<LogStream> {
        let log_path = self.log_path();

        if follow {
            let child = Command::new("tail")
                .args(["-n", &tail.to_string(), "-f"])
                .arg(&log_path)
                .stdout(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| CorralError::Io { path: log_path.clone(), source: e })?;
            return LogStream::from_child(child);
        }

        let content = tokio::fs::read_to_string(&log_path)
            .await
            .map_err(|e| CorralError::Io { path: log_path.clone(), source: e })?;
        let lines: Vec<String> = content.lines().map(String::from).collect();
        let start = lines.len().saturating_sub(tail);
        Ok(LogStream::from_lines(lines[start..].to_vec()))
    }
}
