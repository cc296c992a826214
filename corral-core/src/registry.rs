//! Service registry.
//!
//! Holds the declarative list of services and their deployment kinds.
//! Platform detection may rewrite a descriptor's kind exactly once, at
//! startup; descriptors are immutable afterwards.

use crate::config::StackConfig;
use crate::error::{CorralError, Result};
use crate::platform::PlatformKind;
use serde::{Deserialize, Serialize};
use tracing::info;

/// The service that can run as a native OS process on Apple Silicon.
pub const NATIVE_CAPABLE_SERVICE: &str = "model-server";

/// Fixed localhost health endpoint for the native model server.
pub const NATIVE_HEALTH_URL: &str = "http://127.0.0.1:11434/";

/// How a service is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    /// Managed through the container engine.
    Containerized,
    /// Runs as a platform-native OS process.
    NativeProcess,
    /// Reached over the network, not managed locally.
    RemoteEndpoint,
}

impl ServiceKind {
    /// String form for display and status output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Containerized => "containerized",
            Self::NativeProcess => "native-process",
            Self::RemoteEndpoint => "remote-endpoint",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One service in the stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub kind: ServiceKind,
    pub health_check_url: Option<String>,
}

/// Registry of all services in the stack.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: Vec<ServiceDescriptor>,
    platform: Option<PlatformKind>,
}

impl ServiceRegistry {
    /// Build the registry from the stack configuration.
    pub fn from_config(config: &StackConfig) -> Self {
        let services = config
            .services
            .iter()
            .map(|entry| ServiceDescriptor {
                name: entry.name.clone(),
                kind: entry.kind,
                health_check_url: entry.health_check_url.clone(),
            })
            .collect();
        Self { services, platform: None }
    }

    /// Apply platform detection results. May be called exactly once; the
    /// registry is immutable afterwards.
    ///
    /// On Apple Silicon the native-capable service is reclassified from
    /// Containerized to NativeProcess with a fixed localhost health
    /// endpoint.
    pub fn apply_platform(&mut self, platform: PlatformKind) -> Result<()> {
        if self.platform.is_some() {
            return Err(CorralError::Internal(
                "platform detection already applied to registry".to_string(),
            ));
        }
        self.platform = Some(platform);

        if platform == PlatformKind::AppleSilicon {
            if let Some(service) =
                self.services.iter_mut().find(|s| s.name == NATIVE_CAPABLE_SERVICE)
            {
                info!(service = %service.name, "Reclassifying as native process on Apple Silicon");
                service.kind = ServiceKind::NativeProcess;
                service.health_check_url = Some(NATIVE_HEALTH_URL.to_string());
            }
        }
        Ok(())
    }

    /// The detected platform, if detection has been applied.
    #[must_use]
    pub fn platform(&self) -> Option<PlatformKind> {
        self.platform
    }

    /// All service descriptors.
    #[must_use]
    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    /// Look up a service by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Services managed through the container engine.
    pub fn containerized(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.iter().filter(|s| s.kind == ServiceKind::Containerized)
    }

    /// Services running as native processes.
    pub fn native(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.iter().filter(|s| s.kind == ServiceKind::NativeProcess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ServiceRegistry {
        ServiceRegistry::from_config(&StackConfig::default())
    }

    #[test]
    fn test_apple_silicon_reclassifies_model_server() {
        let mut reg = registry();
        reg.apply_platform(PlatformKind::AppleSilicon).unwrap();

        let model = reg.get(NATIVE_CAPABLE_SERVICE).unwrap();
        assert_eq!(model.kind, ServiceKind::NativeProcess);
        assert_eq!(model.health_check_url.as_deref(), Some(NATIVE_HEALTH_URL));

        // Other services keep their kind.
        assert_eq!(reg.get("web-ui").unwrap().kind, ServiceKind::Containerized);
    }

    #[test]
    fn test_generic_cpu_keeps_everything_containerized() {
        let mut reg = registry();
        reg.apply_platform(PlatformKind::GenericCpu).unwrap();
        assert!(reg.services().iter().all(|s| s.kind == ServiceKind::Containerized));
    }

    #[test]
    fn test_platform_applies_exactly_once() {
        let mut reg = registry();
        reg.apply_platform(PlatformKind::GenericCpu).unwrap();
        assert!(reg.apply_platform(PlatformKind::AppleSilicon).is_err());
    }

    #[test]
    fn test_kind_partition() {
        let mut reg = registry();
        reg.apply_platform(PlatformKind::AppleSilicon).unwrap();
        assert_eq!(reg.containerized().count(), 2);
        assert_eq!(reg.native().count(), 1);
    }
}
