//! Docker engine client.
//!
//! Shells out to `docker` / `docker compose` and parses `--format json`
//! output. Prefers the standalone `docker-compose` binary when present,
//! falling back to the `docker compose` plugin.

use super::{
    CommandOutput, ContainerEngine, ContainerSummary, EngineInfo, ImageSummary, NetworkSummary,
    ResourceUsage, VolumeSummary,
};
use crate::error::{CorralError, Result};
use crate::logs::LogStream;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Real container engine client backed by the Docker CLI.
pub struct DockerEngine {
    /// Compose project name (`-p` flag and grouping label value).
    project: String,
    compose_cmd: String,
    compose_prefix: Vec<String>,
}

impl DockerEngine {
    /// Create a client, detecting which compose command is available.
    pub async fn detect(project: impl Into<String>) -> Self {
        let check = Command::new("which").arg("docker-compose").output().await;
        let standalone = check.map(|o| o.status.success()).unwrap_or(false);

        let (compose_cmd, compose_prefix) = if standalone {
            ("docker-compose".to_string(), vec![])
        } else {
            ("docker".to_string(), vec!["compose".to_string()])
        };

        debug!(cmd = %compose_cmd, "Detected compose command");
        Self { project: project.into(), compose_cmd, compose_prefix }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!(program, ?args, "Running engine command");
        let output = Command::new(program).args(args).output().await.map_err(|e| {
            CorralError::EngineUnavailable { reason: format!("failed to run {}: {}", program, e) }
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run a command whose failure is an error, not a reportable result.
    async fn run_checked(&self, program: &str, args: &[String]) -> Result<String> {
        let output = self.run(program, args).await?;
        if !output.success {
            return Err(CorralError::EngineCommandFailed {
                command: format!("{} {}", program, args.join(" ")),
                reason: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn compose_args(&self, files: &[PathBuf], subcommand: &[&str]) -> Vec<String> {
        let mut args = self.compose_prefix.clone();
        for file in files {
            args.push("-f".to_string());
            args.push(file.to_string_lossy().to_string());
        }
        args.push("-p".to_string());
        args.push(self.project.clone());
        args.extend(subcommand.iter().map(|s| s.to_string()));
        args
    }

    async fn compose(
        &self,
        files: &[PathBuf],
        subcommand: &[&str],
        services: &[String],
    ) -> Result<CommandOutput> {
        let mut args = self.compose_args(files, subcommand);
        args.extend(services.iter().cloned());
        self.run(&self.compose_cmd, &args).await
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Ports")]
    ports: String,
    #[serde(rename = "Labels")]
    labels: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct NetworkLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct VolumeLine {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ImageLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Repository")]
    repository: String,
    #[serde(rename = "Tag")]
    tag: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StatsLine {
    #[serde(rename = "CPUPerc")]
    cpu_perc: String,
    #[serde(rename = "MemUsage")]
    mem_usage: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct InfoLine {
    #[serde(rename = "Runtimes")]
    runtimes: HashMap<String, serde_json::Value>,
    #[serde(rename = "ServerVersion")]
    server_version: String,
}

/// Parse a Docker `Labels` string ("k=v,k=v") into a map.
fn parse_labels(labels: &str) -> HashMap<String, String> {
    labels
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Parse a Docker `Ports` string into container-port -> host-port.
///
/// Examples: "0.0.0.0:3000->3000/tcp", "8080/tcp" (unpublished).
fn parse_ports(ports: &str) -> BTreeMap<u16, Option<u16>> {
    let mut map = BTreeMap::new();
    for entry in ports.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if let Some((host_part, container_part)) = entry.split_once("->") {
            let container = container_part.split('/').next().and_then(|p| p.parse().ok());
            let host = host_part.rsplit(':').next().and_then(|p| p.parse().ok());
            if let Some(container) = container {
                // Keep the published mapping if both IPv4 and IPv6 lines exist.
                let slot = map.entry(container).or_insert(None);
                if slot.is_none() {
                    *slot = host;
                }
            }
        } else {
            let container = entry.split('/').next().and_then(|p| p.parse().ok());
            if let Some(container) = container {
                map.entry(container).or_insert(None);
            }
        }
    }
    map
}

/// Parse "10.5MiB / 1.9GiB" into megabytes used.
fn parse_mem_usage(mem: &str) -> Option<f64> {
    let used = mem.split('/').next()?.trim();
    let split = used.find(|c: char| c.is_ascii_alphabetic())?;
    let (value, unit) = used.split_at(split);
    let value: f64 = value.trim().parse().ok()?;
    match unit.trim() {
        "B" => Some(value / 1_048_576.0),
        "KiB" | "kB" => Some(value / 1024.0),
        "MiB" | "MB" => Some(value),
        "GiB" | "GB" => Some(value * 1024.0),
        _ => None,
    }
}

fn parse_json_lines<T: serde::de::DeserializeOwned>(stdout: &str) -> Vec<T> {
    stdout.lines().filter(|l| !l.trim().is_empty()).filter_map(|l| serde_json::from_str(l).ok()).collect()
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    #[instrument(skip(self))]
    async fn ping(&self) -> Result<()> {
        let args = vec!["version".to_string(), "--format".to_string(), "{{.Server.Version}}".to_string()];
        let output = self.run("docker", &args).await?;
        if !output.success {
            return Err(CorralError::EngineUnavailable { reason: output.stderr.trim().to_string() });
        }
        Ok(())
    }

    async fn info(&self) -> Result<EngineInfo> {
        let args =
            vec!["info".to_string(), "--format".to_string(), "{{json .}}".to_string()];
        let stdout = self.run_checked("docker", &args).await?;
        let info: InfoLine = serde_json::from_str(stdout.trim()).map_err(|e| {
            CorralError::EngineCommandFailed {
                command: "docker info".to_string(),
                reason: format!("unparsable output: {}", e),
            }
        })?;
        Ok(EngineInfo {
            runtimes: info.runtimes.into_keys().collect(),
            server_version: info.server_version,
        })
    }

    #[instrument(skip(self, files))]
    async fn compose_up(&self, files: &[PathBuf], services: &[String]) -> Result<CommandOutput> {
        self.compose(files, &["up", "-d"], services).await
    }

    #[instrument(skip(self, files))]
    async fn compose_stop(&self, files: &[PathBuf], services: &[String]) -> Result<CommandOutput> {
        self.compose(files, &["stop"], services).await
    }

    #[instrument(skip(self, files))]
    async fn compose_down(&self, files: &[PathBuf]) -> Result<CommandOutput> {
        self.compose(files, &["down", "--remove-orphans"], &[]).await
    }

    #[instrument(skip(self, files))]
    async fn compose_pull(&self, files: &[PathBuf], services: &[String]) -> Result<CommandOutput> {
        self.compose(files, &["pull"], services).await
    }

    async fn compose_logs(
        &self,
        files: &[PathBuf],
        services: &[String],
        follow: bool,
        tail: usize,
    ) -> Result<LogStream> {
        let tail_arg = tail.to_string();
        let mut subcommand = vec!["logs", "--tail", &tail_arg];
        if follow {
            subcommand.push("-f");
        }
        let mut args = self.compose_args(files, &subcommand);
        args.extend(services.iter().cloned());

        let child = Command::new(&self.compose_cmd)
            .args(&args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CorralError::EngineUnavailable {
                reason: format!("failed to run {}: {}", self.compose_cmd, e),
            })?;
        LogStream::from_child(child)
    }

    async fn list_containers(&self, label: &str) -> Result<Vec<ContainerSummary>> {
        let args = vec![
            "ps".to_string(),
            "-a".to_string(),
            "--filter".to_string(),
            format!("label={}", label),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        let stdout = self.run_checked("docker", &args).await?;
        Ok(parse_json_lines::<PsLine>(&stdout)
            .into_iter()
            .map(|line| ContainerSummary {
                id: line.id,
                name: line.names,
                running: line.state == "running",
                state: line.state,
                labels: parse_labels(&line.labels),
                ports: parse_ports(&line.ports),
            })
            .collect())
    }

    async fn list_networks(&self, label: &str) -> Result<Vec<NetworkSummary>> {
        let args = vec![
            "network".to_string(),
            "ls".to_string(),
            "--filter".to_string(),
            format!("label={}", label),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        let stdout = self.run_checked("docker", &args).await?;
        Ok(parse_json_lines::<NetworkLine>(&stdout)
            .into_iter()
            .map(|line| NetworkSummary { id: line.id, name: line.name })
            .collect())
    }

    async fn list_volumes(&self, label: &str) -> Result<Vec<VolumeSummary>> {
        let args = vec![
            "volume".to_string(),
            "ls".to_string(),
            "--filter".to_string(),
            format!("label={}", label),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        let stdout = self.run_checked("docker", &args).await?;
        Ok(parse_json_lines::<VolumeLine>(&stdout)
            .into_iter()
            .map(|line| VolumeSummary { name: line.name })
            .collect())
    }

    async fn list_images(&self, label: &str) -> Result<Vec<ImageSummary>> {
        let args = vec![
            "images".to_string(),
            "--filter".to_string(),
            format!("label={}", label),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        let stdout = self.run_checked("docker", &args).await?;
        Ok(parse_json_lines::<ImageLine>(&stdout)
            .into_iter()
            .map(|line| ImageSummary {
                id: line.id,
                reference: format!("{}:{}", line.repository, line.tag),
            })
            .collect())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let mut args = vec!["rm".to_string()];
        if force {
            args.push("-f".to_string());
        }
        args.push(id.to_string());
        self.run_checked("docker", &args).await.map(|_| ())
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        let args = vec!["network".to_string(), "rm".to_string(), id.to_string()];
        self.run_checked("docker", &args).await.map(|_| ())
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        let args = vec!["volume".to_string(), "rm".to_string(), name.to_string()];
        self.run_checked("docker", &args).await.map(|_| ())
    }

    async fn remove_image(&self, id: &str) -> Result<()> {
        let args = vec!["rmi".to_string(), id.to_string()];
        self.run_checked("docker", &args).await.map(|_| ())
    }

    async fn container_stats(&self, id: &str) -> Result<ResourceUsage> {
        let args = vec![
            "stats".to_string(),
            "--no-stream".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
            id.to_string(),
        ];
        let stdout = self.run_checked("docker", &args).await?;
        let line: StatsLine = serde_json::from_str(stdout.trim()).unwrap_or_default();
        Ok(ResourceUsage {
            cpu_percent: line.cpu_perc.trim_end_matches('%').parse().ok(),
            memory_mb: parse_mem_usage(&line.mem_usage),
        })
    }

    /// Archive a volume via a throwaway helper container, since volume
    /// contents are only reachable from inside the engine.
    #[instrument(skip(self, dest))]
    async fn archive_volume(&self, volume: &str, dest: &Path) -> Result<()> {
        let dest_dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let file_name = dest
            .file_name()
            .ok_or_else(|| CorralError::Validation {
                reason: format!("invalid archive path {:?}", dest),
            })?
            .to_string_lossy()
            .to_string();

        let args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/data:ro", volume),
            "-v".to_string(),
            format!("{}:/backup", dest_dir.display()),
            "alpine".to_string(),
            "tar".to_string(),
            "czf".to_string(),
            format!("/backup/{}", file_name),
            "-C".to_string(),
            "/data".to_string(),
            ".".to_string(),
        ];
        self.run_checked("docker", &args).await.map(|_| ())
    }

    #[instrument(skip(self, archive))]
    async fn restore_volume(&self, volume: &str, archive: &Path) -> Result<()> {
        let src_dir = archive.parent().unwrap_or_else(|| Path::new("."));
        let file_name = archive
            .file_name()
            .ok_or_else(|| CorralError::Validation {
                reason: format!("invalid archive path {:?}", archive),
            })?
            .to_string_lossy()
            .to_string();

        let create = vec!["volume".to_string(), "create".to_string(), volume.to_string()];
        self.run_checked("docker", &create).await?;

        let args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/data", volume),
            "-v".to_string(),
            format!("{}:/backup:ro", src_dir.display()),
            "alpine".to_string(),
            "tar".to_string(),
            "xzf".to_string(),
            format!("/backup/{}", file_name),
            "-C".to_string(),
            "/data".to_string(),
        ];
        self.run_checked("docker", &args).await.map(|_| ())
    }

    fn name(&self) -> &str {
        "docker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels("a=1,sh.corral.component=stack, b = 2");
        assert_eq!(labels.get("a").map(String::as_str), Some("1"));
        assert_eq!(labels.get("sh.corral.component").map(String::as_str), Some("stack"));
        assert_eq!(labels.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_parse_ports_published() {
        let ports = parse_ports("0.0.0.0:3000->3000/tcp, :::3000->3000/tcp");
        assert_eq!(ports.get(&3000), Some(&Some(3000)));
    }

    #[test]
    fn test_parse_ports_unpublished() {
        let ports = parse_ports("11434/tcp");
        assert_eq!(ports.get(&11434), Some(&None));
    }

    #[test]
    fn test_parse_ports_mixed() {
        let ports = parse_ports("0.0.0.0:8080->80/tcp, 11434/tcp");
        assert_eq!(ports.get(&80), Some(&Some(8080)));
        assert_eq!(ports.get(&11434), Some(&None));
    }

    #[test]
    fn test_parse_mem_usage() {
        assert_eq!(parse_mem_usage("512MiB / 2GiB"), Some(512.0));
        assert_eq!(parse_mem_usage("2GiB / 8GiB"), Some(2048.0));
        assert_eq!(parse_mem_usage("1024KiB / 1GiB"), Some(1.0));
        assert_eq!(parse_mem_usage("garbage"), None);
    }
}
