//! Native process collaborator.
//!
//! On Apple Silicon the model server runs as a native OS process instead of
//! a container. The [`NativeService`] trait is the seam the orchestrator
//! sequences; the real implementation inspects the host process table and
//! tails the service's log file.

use crate::error::Result;
use crate::logs::LogStream;
use async_trait::async_trait;

mod host_process;

pub use host_process::HostProcessService;

/// A service managed as a platform-native OS process.
#[async_trait]
pub trait NativeService: Send + Sync {
    /// Name of the service this collaborator manages.
    fn service_name(&self) -> &str;

    /// Whether the process is currently alive.
    async fn is_running(&self) -> bool;

    /// Start the process. Must be a no-op if already running.
    async fn start(&self) -> Result<()>;

    /// Stop the process. Must succeed if the process is not running.
    async fn stop(&self) -> Result<()>;

    /// Stream the service's log lines.
    async fn logs(&self, follow: bool, tail: usize) -> Result<LogStream>;
}
