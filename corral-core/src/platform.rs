//! Platform detection.
//!
//! Classifies the execution environment so the registry and compose-file
//! selection can adapt to it. Detection never aborts the program: an
//! unreachable engine simply means the generic CPU profile.

use crate::engine::{ContainerEngine, EngineInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The execution environment the stack runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformKind {
    /// macOS on ARM64; the model server runs as a native process.
    AppleSilicon,
    /// A GPU-capable container runtime is available.
    GpuAccelerated,
    /// Commodity CPU host.
    GenericCpu,
}

impl PlatformKind {
    /// String form used for config keys and manifests.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppleSilicon => "apple-silicon",
            Self::GpuAccelerated => "gpu",
            Self::GenericCpu => "cpu",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "apple-silicon" => Some(Self::AppleSilicon),
            "gpu" => Some(Self::GpuAccelerated),
            "cpu" => Some(Self::GenericCpu),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pure classification rule, deterministic for fixed inputs.
///
/// macOS on ARM64 wins outright; otherwise the engine's advertised
/// runtimes decide. `None` engine info (engine unreachable) means the
/// generic CPU profile.
#[must_use]
pub fn detect_from(os: &str, arch: &str, engine_info: Option<&EngineInfo>) -> PlatformKind {
    if os == "macos" && arch == "aarch64" {
        return PlatformKind::AppleSilicon;
    }
    match engine_info {
        Some(info) if info.has_gpu_runtime() => PlatformKind::GpuAccelerated,
        _ => PlatformKind::GenericCpu,
    }
}

/// Detect the current platform, consulting the engine only when the
/// host is not Apple Silicon.
pub async fn detect(engine: &dyn ContainerEngine) -> PlatformKind {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;

    if os == "macos" && arch == "aarch64" {
        debug!("Detected Apple Silicon host");
        return PlatformKind::AppleSilicon;
    }

    let info = match engine.info().await {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(error = %e, "Engine capability query failed, assuming generic CPU");
            None
        }
    };

    let platform = detect_from(os, arch, info.as_ref());
    debug!(platform = %platform, "Platform detected");
    platform
}
