//! Shared command wiring.
//!
//! Every command builds the same graph: load configuration, detect the
//! engine and platform, apply the platform to the registry, and hand the
//! collaborators to the orchestrators.

use anyhow::Result;
use colored::Colorize;
use corral_core::engine::ContainerEngine;
use corral_core::native::{HostProcessService, NativeService};
use corral_core::{
    paths, platform, ConfigSource, DockerEngine, EnvFile, HealthChecker, LifecycleOrchestrator,
    PlatformKind, ServiceRegistry, StackConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

pub struct AppContext {
    pub config: StackConfig,
    pub config_source: ConfigSource,
    pub env: EnvFile,
    pub platform: PlatformKind,
    pub registry: ServiceRegistry,
    pub engine: Arc<dyn ContainerEngine>,
    pub lifecycle: Arc<LifecycleOrchestrator>,
    pub compose_files: Vec<PathBuf>,
    pub extensions: Vec<(String, PathBuf)>,
}

impl AppContext {
    pub async fn init() -> Result<Self> {
        let (config, config_source) = StackConfig::load(&paths::config_path());
        if config_source.is_fallback() {
            println!(
                "{}",
                "Using default configuration (run `corral install` to persist it)".dimmed()
            );
        }
        let (env, _) = EnvFile::load(&paths::env_path());

        let engine: Arc<dyn ContainerEngine> =
            Arc::new(DockerEngine::detect(env.project_name.clone()).await);
        let platform = platform::detect(engine.as_ref()).await;

        let mut registry = ServiceRegistry::from_config(&config);
        registry.apply_platform(platform)?;

        let compose_files = config.compose_files_for(platform, &paths::compose_dir());
        let extensions: Vec<(String, PathBuf)> = config
            .extensions
            .iter()
            .map(|name| {
                (name.clone(), config.extension_compose_file(name, &paths::compose_dir()))
            })
            .collect();

        let natives: Vec<Arc<dyn NativeService>> = registry
            .native()
            .map(|service| {
                Arc::new(HostProcessService::new(service.name.clone(), config.native.clone()))
                    as Arc<dyn NativeService>
            })
            .collect();

        let lifecycle = Arc::new(LifecycleOrchestrator::new(
            registry.clone(),
            engine.clone(),
            natives,
            HealthChecker::new(),
            compose_files.clone(),
            extensions.clone(),
            env.project_name.clone(),
        ));

        Ok(Self {
            config,
            config_source,
            env,
            platform,
            registry,
            engine,
            lifecycle,
            compose_files,
            extensions,
        })
    }
}
