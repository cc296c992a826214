//! Corral Core Library
//!
//! Orchestration engine for the corral model-serving stack: platform
//! detection, service registry, lifecycle state machine, backup/restore,
//! and label-based resource cleanup.

pub mod backup;
pub mod checks;
pub mod cleanup;
pub mod config;
pub mod confirm;
pub mod engine;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod logs;
pub mod native;
pub mod paths;
pub mod platform;
pub mod registry;
pub mod types;

// Re-export commonly used items
pub use backup::{
    BackupConfig, BackupManifest, BackupOrchestrator, BackupReport, RestoreOptions,
    RestoreOrchestrator, RestoreOutcome,
};
pub use checks::{CheckReport, EnvironmentCheck, EnvironmentChecker};
pub use cleanup::{CleanupOptions, CleanupReport, ResourceCleanupEngine};
pub use config::{ConfigSource, EnvFile, StackConfig};
pub use confirm::{AlwaysConfirm, Confirmer, NeverConfirm};
pub use engine::{ContainerEngine, DockerEngine};
pub use error::{CorralError, Result};
pub use health::{HealthChecker, HealthState};
pub use lifecycle::{
    LifecycleOrchestrator, StackState, StartOutcome, UpdateOptions, UpdateOutcome,
};
pub use logs::{LogEnd, LogStream};
pub use native::{HostProcessService, NativeService};
pub use platform::PlatformKind;
pub use registry::{ServiceDescriptor, ServiceKind, ServiceRegistry};
pub use types::ServiceStatus;
