//! Stack lifecycle orchestration.
//!
//! The start/stop/restart/update state machine. Containerized services are
//! sequenced through the container engine in one compose call; native
//! services are started and stopped individually, with per-service failures
//! aggregated rather than aborting the siblings.

use crate::engine::{ContainerEngine, ContainerSummary, COMPONENT_LABEL, COMPOSE_PROJECT_LABEL};
use crate::error::{CorralError, Result};
use crate::health::{HealthChecker, HealthState};
use crate::logs::LogStream;
use crate::native::NativeService;
use crate::registry::{ServiceKind, ServiceRegistry};
use crate::types::ServiceStatus;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Poll interval for [`LifecycleOrchestrator::wait_healthy`].
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Aggregate state of the stack. Conceptual only, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Stopped,
    Running,
    PartiallyRunning,
}

impl std::fmt::Display for StackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::PartiallyRunning => "partially running",
        };
        write!(f, "{}", s)
    }
}

/// Result of a start operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The stack was already running; nothing was mutated.
    AlreadyRunning,
    /// Services were started. Native services that failed to come up are
    /// listed; siblings were still attempted.
    Started { native_failures: Vec<String> },
}

impl StartOutcome {
    /// Overall success flag: false if any individual start failed.
    #[must_use]
    pub fn success(&self) -> bool {
        match self {
            Self::AlreadyRunning => true,
            Self::Started { native_failures } => native_failures.is_empty(),
        }
    }
}

/// Flags controlling an update operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Update core services only (mutually exclusive with
    /// `extensions_only`).
    pub services_only: bool,
    /// Update extensions only.
    pub extensions_only: bool,
    /// Allow updating a running stack.
    pub force_restart: bool,
    /// Inline mode: invoked from within start/restart, so images are
    /// pulled without an extra stop/start cycle.
    pub called_from_start_restart: bool,
}

/// Result of an update operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The stack is running and no force flag was given; nothing was
    /// mutated. The caller must re-invoke with explicit confirmation.
    RestartRequired,
    /// Update ran. Extensions that failed to update are listed; their
    /// failure blocked neither siblings nor the core update. When the
    /// update restarted the stack, native services that failed to come
    /// back up are listed too.
    Completed {
        extension_failures: Vec<String>,
        native_failures: Vec<String>,
        restarted: bool,
    },
}

impl UpdateOutcome {
    /// Overall success flag.
    #[must_use]
    pub fn success(&self) -> bool {
        match self {
            Self::RestartRequired => false,
            Self::Completed { extension_failures, native_failures, .. } => {
                extension_failures.is_empty() && native_failures.is_empty()
            }
        }
    }
}

/// The start/stop/restart/update state machine.
pub struct LifecycleOrchestrator {
    registry: ServiceRegistry,
    engine: Arc<dyn ContainerEngine>,
    natives: Vec<Arc<dyn NativeService>>,
    health: HealthChecker,
    compose_files: Vec<PathBuf>,
    /// Enabled extensions and their compose files.
    extensions: Vec<(String, PathBuf)>,
    project: String,
}

impl LifecycleOrchestrator {
    pub fn new(
        registry: ServiceRegistry,
        engine: Arc<dyn ContainerEngine>,
        natives: Vec<Arc<dyn NativeService>>,
        health: HealthChecker,
        compose_files: Vec<PathBuf>,
        extensions: Vec<(String, PathBuf)>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            engine,
            natives,
            health,
            compose_files,
            extensions,
            project: project.into(),
        }
    }

    /// The registry this orchestrator reads from.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Label filter for stack-managed containers and networks.
    #[must_use]
    pub fn stack_label(&self) -> String {
        COMPONENT_LABEL.to_string()
    }

    /// Label filter for stack volumes (the engine's own grouping label,
    /// which is applied more reliably than the custom one).
    #[must_use]
    pub fn volume_label(&self) -> String {
        format!("{}={}", COMPOSE_PROJECT_LABEL, self.project)
    }

    fn containerized_names(&self) -> Vec<String> {
        self.registry.containerized().map(|s| s.name.clone()).collect()
    }

    fn native_for(&self, name: &str) -> Option<&Arc<dyn NativeService>> {
        self.natives.iter().find(|n| n.service_name() == name)
    }

    /// Whether any part of the stack is running: a labeled container in
    /// the running state, or a native service reporting itself alive.
    pub async fn is_running(&self) -> Result<bool> {
        let containers = self.engine.list_containers(&self.stack_label()).await?;
        if containers.iter().any(|c| c.running) {
            return Ok(true);
        }
        for native in &self.natives {
            if native.is_running().await {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Aggregate stack state across all registered services.
    pub async fn stack_state(&self) -> Result<StackState> {
        let containers = self.engine.list_containers(&self.stack_label()).await?;
        let mut running = 0usize;
        let mut total = 0usize;

        for service in self.registry.services() {
            match service.kind {
                ServiceKind::Containerized => {
                    total += 1;
                    if find_container(&containers, &service.name).map(|c| c.running)
                        == Some(true)
                    {
                        running += 1;
                    }
                }
                ServiceKind::NativeProcess => {
                    total += 1;
                    if let Some(native) = self.native_for(&service.name) {
                        if native.is_running().await {
                            running += 1;
                        }
                    }
                }
                // Remote endpoints are not ours to run.
                ServiceKind::RemoteEndpoint => {}
            }
        }

        Ok(if running == 0 {
            StackState::Stopped
        } else if running == total {
            StackState::Running
        } else {
            StackState::PartiallyRunning
        })
    }

    /// Start the stack. Idempotent: a second start on a running stack
    /// performs no engine mutation and reports `AlreadyRunning`.
    ///
    /// With `update` set, the newest service images are pulled inline
    /// before startup, without an extra stop/start cycle.
    #[instrument(skip(self))]
    pub async fn start(&self, update: bool) -> Result<StartOutcome> {
        if self.is_running().await? {
            info!("Stack already running, nothing to do");
            return Ok(StartOutcome::AlreadyRunning);
        }

        if update {
            let opts = UpdateOptions {
                force_restart: true,
                called_from_start_restart: true,
                ..UpdateOptions::default()
            };
            match self.update(opts).await? {
                UpdateOutcome::Completed { extension_failures, .. } => {
                    for ext in extension_failures {
                        warn!(extension = %ext, "Extension update failed, continuing start");
                    }
                }
                UpdateOutcome::RestartRequired => {
                    // Unreachable: inline mode always forces.
                }
            }
        }

        let native_failures = self.start_services().await?;
        Ok(StartOutcome::Started { native_failures })
    }

    /// Bring every service up. Returns the names of native services that
    /// failed to start; shared by `start` and the standalone update cycle
    /// so neither path recurses into the other.
    async fn start_services(&self) -> Result<Vec<String>> {
        let services = self.containerized_names();
        if !services.is_empty() {
            info!(count = services.len(), "Starting containerized services");
            let output = self.engine.compose_up(&self.compose_files, &services).await?;
            if !output.success {
                return Err(CorralError::EngineCommandFailed {
                    command: "compose up".to_string(),
                    reason: output.stderr.trim().to_string(),
                });
            }
        }

        // Native starts are independent: one failure does not block the
        // others, but it does flip the overall success flag.
        let mut native_failures = Vec::new();
        for service in self.registry.native() {
            let Some(native) = self.native_for(&service.name) else {
                warn!(service = %service.name, "No native collaborator registered");
                native_failures.push(service.name.clone());
                continue;
            };
            if let Err(e) = native.start().await {
                warn!(service = %service.name, error = %e, "Native service failed to start");
                native_failures.push(service.name.clone());
            }
        }

        info!(failed = native_failures.len(), "Stack start complete");
        Ok(native_failures)
    }

    /// Stop the stack. Always attempted, even when nothing appears to be
    /// running; stopping a stopped stack is a successful no-op.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping containerized services");
        let output = self.engine.compose_stop(&self.compose_files, &[]).await?;
        if !output.success {
            return Err(CorralError::StopFailed { reason: output.stderr.trim().to_string() });
        }

        // All natives are attempted before failures are reported.
        let mut failures = Vec::new();
        for native in &self.natives {
            if let Err(e) = native.stop().await {
                warn!(service = %native.service_name(), error = %e, "Native stop failed");
                failures.push(format!("{}: {}", native.service_name(), e));
            }
        }

        if !failures.is_empty() {
            return Err(CorralError::StopFailed { reason: failures.join("; ") });
        }
        Ok(())
    }

    /// Restart the stack. The stop phase must complete; a stop failure
    /// aborts the restart before any start is attempted.
    #[instrument(skip(self))]
    pub async fn restart(&self, update: bool) -> Result<StartOutcome> {
        self.stop().await?;
        self.start(update).await
    }

    /// Update service images and extensions.
    #[instrument(skip(self))]
    pub async fn update(&self, opts: UpdateOptions) -> Result<UpdateOutcome> {
        if opts.services_only && opts.extensions_only {
            return Err(CorralError::Validation {
                reason: "--services and --extensions are mutually exclusive".to_string(),
            });
        }

        let running = self.is_running().await?;
        if running && !opts.force_restart {
            info!("Stack is running and no restart was authorized");
            return Ok(UpdateOutcome::RestartRequired);
        }

        // Standalone update of a running stack cycles it; inline update
        // (called from start/restart) pulls without the extra cycle.
        let standalone_cycle = running && !opts.called_from_start_restart;
        if standalone_cycle {
            self.stop().await?;
        }

        if !opts.extensions_only {
            let services = self.containerized_names();
            info!(count = services.len(), "Pulling newest service images");
            let output = self.engine.compose_pull(&self.compose_files, &services).await?;
            if !output.success {
                return Err(CorralError::EngineCommandFailed {
                    command: "compose pull".to_string(),
                    reason: output.stderr.trim().to_string(),
                });
            }
        }

        // Extensions update independently of each other and of the core.
        let mut extension_failures = Vec::new();
        if !opts.services_only {
            for (name, file) in &self.extensions {
                let result = self.engine.compose_pull(&[file.clone()], &[]).await;
                match result {
                    Ok(output) if output.success => {
                        info!(extension = %name, "Extension updated");
                    }
                    Ok(output) => {
                        warn!(extension = %name, stderr = %output.stderr.trim(), "Extension update failed");
                        extension_failures.push(name.clone());
                    }
                    Err(e) => {
                        warn!(extension = %name, error = %e, "Extension update failed");
                        extension_failures.push(name.clone());
                    }
                }
            }
        }

        let native_failures =
            if standalone_cycle { self.start_services().await? } else { Vec::new() };

        Ok(UpdateOutcome::Completed {
            extension_failures,
            native_failures,
            restarted: standalone_cycle,
        })
    }

    /// Compute fresh statuses for every registered service.
    pub async fn status(&self) -> Result<Vec<ServiceStatus>> {
        let containers = self.engine.list_containers(&self.stack_label()).await?;
        let mut statuses = Vec::with_capacity(self.registry.services().len());

        for service in self.registry.services() {
            let health = self.health.check(service).await;
            let status = match service.kind {
                ServiceKind::Containerized => match find_container(&containers, &service.name) {
                    Some(container) => {
                        let usage = if container.running {
                            self.engine
                                .container_stats(&container.id)
                                .await
                                .unwrap_or_default()
                        } else {
                            Default::default()
                        };
                        ServiceStatus {
                            name: service.name.clone(),
                            kind: service.kind,
                            is_running: container.running,
                            lifecycle_state: container.state.clone(),
                            health,
                            ports: container.ports.clone(),
                            resource_usage: usage,
                        }
                    }
                    None => ServiceStatus {
                        name: service.name.clone(),
                        kind: service.kind,
                        is_running: false,
                        lifecycle_state: "not created".to_string(),
                        health,
                        ports: Default::default(),
                        resource_usage: Default::default(),
                    },
                },
                ServiceKind::NativeProcess => {
                    let is_running = match self.native_for(&service.name) {
                        Some(native) => native.is_running().await,
                        None => false,
                    };
                    ServiceStatus {
                        name: service.name.clone(),
                        kind: service.kind,
                        is_running,
                        lifecycle_state: if is_running { "running" } else { "stopped" }
                            .to_string(),
                        health,
                        ports: Default::default(),
                        resource_usage: Default::default(),
                    }
                }
                ServiceKind::RemoteEndpoint => ServiceStatus {
                    name: service.name.clone(),
                    kind: service.kind,
                    is_running: health == HealthState::Healthy,
                    lifecycle_state: "remote".to_string(),
                    health,
                    ports: Default::default(),
                    resource_usage: Default::default(),
                },
            };
            statuses.push(status);
        }

        Ok(statuses)
    }

    /// Poll a service's health until it reports healthy or the timeout
    /// elapses. Returns whether the service came up in time.
    pub async fn wait_healthy(&self, service_name: &str, timeout: Duration) -> Result<bool> {
        let service = self
            .registry
            .get(service_name)
            .ok_or_else(|| CorralError::UnknownService { service: service_name.to_string() })?
            .clone();

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.health.check(&service).await == HealthState::Healthy {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    /// Stream logs for one service, or for all containerized services when
    /// no name is given.
    pub async fn logs(
        &self,
        service: Option<&str>,
        follow: bool,
        tail: usize,
    ) -> Result<LogStream> {
        match service {
            Some(name) => {
                let descriptor = self
                    .registry
                    .get(name)
                    .ok_or_else(|| CorralError::UnknownService { service: name.to_string() })?;
                match descriptor.kind {
                    ServiceKind::NativeProcess => {
                        let native = self.native_for(name).ok_or_else(|| {
                            CorralError::UnknownService { service: name.to_string() }
                        })?;
                        native.logs(follow, tail).await
                    }
                    ServiceKind::Containerized => {
                        self.engine
                            .compose_logs(
                                &self.compose_files,
                                &[name.to_string()],
                                follow,
                                tail,
                            )
                            .await
                    }
                    ServiceKind::RemoteEndpoint => Err(CorralError::Validation {
                        reason: format!("{} is a remote endpoint; logs are not local", name),
                    }),
                }
            }
            None => self.engine.compose_logs(&self.compose_files, &[], follow, tail).await,
        }
    }
}

fn find_container<'a>(
    containers: &'a [ContainerSummary],
    service: &str,
) -> Option<&'a ContainerSummary> {
    containers
        .iter()
        .find(|c| c.service_name() == Some(service) || c.name.contains(service))
}
