//! Two-tier service health checking.
//!
//! Tier 1 is an application-level HTTP probe; tier 2 falls back to a raw
//! TCP connect against the same host and port. The fallback exists because
//! the engine's own health check is TCP-only, and status reporting must
//! agree with the engine even while the richer probe is transiently
//! unavailable (slow startup). There are no retries here; callers that
//! need "wait until healthy" loop externally.

use crate::registry::ServiceDescriptor;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const TCP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    /// No health-check endpoint is registered for the service.
    Unknown,
}

impl HealthState {
    /// String form for display and status output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Performs the two-tier liveness probe.
#[derive(Clone)]
pub struct HealthChecker {
    client: reqwest::Client,
}

impl HealthChecker {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Probe a service. Returns `Unknown` when no endpoint is registered.
    pub async fn check(&self, service: &ServiceDescriptor) -> HealthState {
        match &service.health_check_url {
            Some(url) => self.check_url(url).await,
            None => HealthState::Unknown,
        }
    }

    /// Probe a specific URL: HTTP first, raw TCP connect as fallback.
    pub async fn check_url(&self, url: &str) -> HealthState {
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url, "HTTP probe healthy");
                return HealthState::Healthy;
            }
            Ok(response) => {
                debug!(url, status = %response.status(), "HTTP probe rejected, trying TCP");
            }
            Err(e) => {
                debug!(url, error = %e, "HTTP probe failed, trying TCP");
            }
        }

        self.tcp_probe(url).await
    }

    async fn tcp_probe(&self, url: &str) -> HealthState {
        let parsed = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return HealthState::Unhealthy,
        };
        let Some(host) = parsed.host_str() else {
            return HealthState::Unhealthy;
        };
        let Some(port) = parsed.port_or_known_default() else {
            return HealthState::Unhealthy;
        };

        match tokio::time::timeout(TCP_PROBE_TIMEOUT, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => {
                debug!(host, port, "TCP probe healthy");
                HealthState::Healthy
            }
            _ => HealthState::Unhealthy,
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServiceKind;
    use tokio::net::TcpListener;

    fn service(url: Option<&str>) -> ServiceDescriptor {
        ServiceDescriptor {
            name: "test".to_string(),
            kind: ServiceKind::Containerized,
            health_check_url: url.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_no_url_is_unknown() {
        let checker = HealthChecker::new();
        assert_eq!(checker.check(&service(None)).await, HealthState::Unknown);
    }

    #[tokio::test]
    async fn test_tcp_fallback_reports_healthy_when_port_open() {
        // Bare TCP listener: the HTTP probe fails (no response), but the
        // TCP connect succeeds, which must count as healthy.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let checker = HealthChecker::new();
        let url = format!("http://127.0.0.1:{}/health", port);
        assert_eq!(checker.check_url(&url).await, HealthState::Healthy);
    }

    #[tokio::test]
    async fn test_closed_port_is_unhealthy() {
        // Bind then drop to get a port that is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let checker = HealthChecker::new();
        let url = format!("http://127.0.0.1:{}/", port);
        assert_eq!(checker.check_url(&url).await, HealthState::Unhealthy);
    }

    #[tokio::test]
    async fn test_malformed_url_is_unhealthy() {
        let checker = HealthChecker::new();
        assert_eq!(checker.check_url("not a url").await, HealthState::Unhealthy);
    }
}
