//! Shared mock collaborators for integration tests.
//!
//! The mock engine keeps an in-memory picture of containers and volumes
//! and records every call, so tests can assert both outcomes and the
//! exact sequence of engine operations.

use async_trait::async_trait;
use corral_core::engine::{
    CommandOutput, ContainerEngine, ContainerSummary, EngineInfo, ImageSummary, NetworkSummary,
    ResourceUsage, VolumeSummary,
};
use corral_core::error::{CorralError, Result};
use corral_core::logs::LogStream;
use corral_core::native::NativeService;
use corral_core::{HealthChecker, LifecycleOrchestrator, PlatformKind, ServiceRegistry, StackConfig};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const PROJECT: &str = "corral-test";

#[derive(Default)]
pub struct EngineState {
    /// (service name, running) pairs; containers survive a stop.
    pub containers: Vec<(String, bool)>,
    pub networks: Vec<String>,
    pub volumes: Vec<String>,
    pub images: Vec<String>,
    pub calls: Vec<String>,
    /// Volume names whose archive step fails.
    pub fail_archive: Vec<String>,
    /// Compose-file substrings whose pull fails.
    pub fail_pull: Vec<String>,
}

pub struct MockEngine {
    pub state: Mutex<EngineState>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { state: Mutex::new(EngineState::default()) })
    }

    pub fn with_state(state: EngineState) -> Arc<Self> {
        Arc::new(Self { state: Mutex::new(state) })
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn volumes(&self) -> Vec<String> {
        self.state.lock().unwrap().volumes.clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn info(&self) -> Result<EngineInfo> {
        Ok(EngineInfo { runtimes: vec!["runc".to_string()], server_version: "test".to_string() })
    }

    async fn compose_up(&self, _files: &[PathBuf], services: &[String]) -> Result<CommandOutput> {
        self.record("up");
        let mut state = self.state.lock().unwrap();
        for service in services {
            match state.containers.iter_mut().find(|(name, _)| name == service) {
                Some(entry) => entry.1 = true,
                None => state.containers.push((service.clone(), true)),
            }
        }
        Ok(CommandOutput { success: true, ..CommandOutput::default() })
    }

    async fn compose_stop(&self, _files: &[PathBuf], _services: &[String]) -> Result<CommandOutput> {
        self.record("stop");
        let mut state = self.state.lock().unwrap();
        for entry in &mut state.containers {
            entry.1 = false;
        }
        Ok(CommandOutput { success: true, ..CommandOutput::default() })
    }

    async fn compose_down(&self, _files: &[PathBuf]) -> Result<CommandOutput> {
        self.record("down");
        self.state.lock().unwrap().containers.clear();
        Ok(CommandOutput { success: true, ..CommandOutput::default() })
    }

    async fn compose_pull(&self, files: &[PathBuf], _services: &[String]) -> Result<CommandOutput> {
        let state_fail = {
            let state = self.state.lock().unwrap();
            files.iter().any(|f| {
                let name = f.to_string_lossy();
                state.fail_pull.iter().any(|p| name.contains(p.as_str()))
            })
        };
        self.record(format!(
            "pull:{}",
            files
                .iter()
                .filter_map(|f| f.file_name())
                .map(|f| f.to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join(",")
        ));
        if state_fail {
            return Ok(CommandOutput {
                success: false,
                stderr: "pull failed".to_string(),
                ..CommandOutput::default()
            });
        }
        Ok(CommandOutput { success: true, ..CommandOutput::default() })
    }

    async fn compose_logs(
        &self,
        _files: &[PathBuf],
        _services: &[String],
        _follow: bool,
        _tail: usize,
    ) -> Result<LogStream> {
        self.record("logs");
        Ok(LogStream::from_lines(vec!["log line".to_string()]))
    }

    async fn list_containers(&self, _label: &str) -> Result<Vec<ContainerSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .map(|(service, running)| ContainerSummary {
                id: service.clone(),
                name: format!("{}-{}-1", PROJECT, service),
                state: if *running { "running" } else { "exited" }.to_string(),
                running: *running,
                labels: HashMap::from([(
                    "com.docker.compose.service".to_string(),
                    service.clone(),
                )]),
                ports: BTreeMap::new(),
            })
            .collect())
    }

    async fn list_networks(&self, _label: &str) -> Result<Vec<NetworkSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .networks
            .iter()
            .map(|name| NetworkSummary { id: name.clone(), name: name.clone() })
            .collect())
    }

    async fn list_volumes(&self, _label: &str) -> Result<Vec<VolumeSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state.volumes.iter().map(|name| VolumeSummary { name: name.clone() }).collect())
    }

    async fn list_images(&self, _label: &str) -> Result<Vec<ImageSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .images
            .iter()
            .map(|name| ImageSummary { id: name.clone(), reference: name.clone() })
            .collect())
    }

    async fn remove_container(&self, id: &str, _force: bool) -> Result<()> {
        self.record(format!("rm-container:{}", id));
        self.state.lock().unwrap().containers.retain(|(name, _)| name != id);
        Ok(())
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.record(format!("rm-network:{}", id));
        self.state.lock().unwrap().networks.retain(|name| name != id);
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        self.record(format!("rm-volume:{}", name));
        self.state.lock().unwrap().volumes.retain(|v| v != name);
        Ok(())
    }

    async fn remove_image(&self, id: &str) -> Result<()> {
        self.record(format!("rm-image:{}", id));
        self.state.lock().unwrap().images.retain(|name| name != id);
        Ok(())
    }

    async fn container_stats(&self, _id: &str) -> Result<ResourceUsage> {
        Ok(ResourceUsage { cpu_percent: Some(1.0), memory_mb: Some(64.0) })
    }

    async fn archive_volume(&self, volume: &str, dest: &Path) -> Result<()> {
        let fails = self.state.lock().unwrap().fail_archive.iter().any(|v| v == volume);
        self.record(format!("archive:{}", volume));
        if fails {
            return Err(CorralError::EngineCommandFailed {
                command: "archive".to_string(),
                reason: format!("cannot archive {}", volume),
            });
        }
        write_tar_gz(dest);
        Ok(())
    }

    async fn restore_volume(&self, volume: &str, archive: &Path) -> Result<()> {
        self.record(format!("restore:{}", volume));
        assert!(archive.is_file(), "restore expects the archive to exist");
        let mut state = self.state.lock().unwrap();
        if !state.volumes.iter().any(|v| v == volume) {
            state.volumes.push(volume.to_string());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Write a small valid gzip tar at `dest`.
pub fn write_tar_gz(dest: &Path) {
    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
    let file = std::fs::File::create(dest).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_path("data.bin").unwrap();
    header.set_size(4);
    header.set_cksum();
    builder.append(&header, &b"demo"[..]).unwrap();
    builder.into_inner().unwrap().finish().unwrap();
}

pub struct MockNative {
    name: String,
    running: Mutex<bool>,
    fail_start: bool,
}

impl MockNative {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self { name: name.to_string(), running: Mutex::new(false), fail_start: false })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self { name: name.to_string(), running: Mutex::new(false), fail_start: true })
    }
}

#[async_trait]
impl NativeService for MockNative {
    fn service_name(&self) -> &str {
        &self.name
    }

    async fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }

    async fn start(&self) -> Result<()> {
        if self.fail_start {
            return Err(CorralError::NativeStartFailed {
                service: self.name.clone(),
                reason: "mock failure".to_string(),
            });
        }
        *self.running.lock().unwrap() = true;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        *self.running.lock().unwrap() = false;
        Ok(())
    }

    async fn logs(&self, _follow: bool, _tail: usize) -> Result<LogStream> {
        Ok(LogStream::from_lines(vec!["native log line".to_string()]))
    }
}

pub fn registry(platform: PlatformKind) -> ServiceRegistry {
    let mut registry = ServiceRegistry::from_config(&StackConfig::default());
    registry.apply_platform(platform).unwrap();
    registry
}

pub fn lifecycle(
    engine: Arc<MockEngine>,
    natives: Vec<Arc<dyn NativeService>>,
    platform: PlatformKind,
) -> Arc<LifecycleOrchestrator> {
    lifecycle_with_extensions(engine, natives, platform, Vec::new())
}

pub fn lifecycle_with_extensions(
    engine: Arc<MockEngine>,
    natives: Vec<Arc<dyn NativeService>>,
    platform: PlatformKind,
    extensions: Vec<(String, PathBuf)>,
) -> Arc<LifecycleOrchestrator> {
    Arc::new(LifecycleOrchestrator::new(
        registry(platform),
        engine as Arc<dyn ContainerEngine>,
        natives,
        HealthChecker::new(),
        vec![PathBuf::from("docker-compose.yml")],
        extensions,
        PROJECT,
    ))
}
