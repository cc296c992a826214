//! Environment preflight checks.
//!
//! Each check is independent and produces a pass/fail line with a concrete
//! suggestion on failure. Checks never abort each other; the report always
//! covers the full list.

use crate::engine::ContainerEngine;
use crate::registry::ServiceRegistry;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tracing::instrument;

/// Result of one preflight check.
#[derive(Debug, Clone)]
pub struct EnvironmentCheck {
    pub name: String,
    pub passed: bool,
    pub details: String,
    /// What to do about a failure, when one is known.
    pub suggestion: Option<String>,
}

impl EnvironmentCheck {
    fn pass(name: &str, details: impl Into<String>) -> Self {
        Self { name: name.to_string(), passed: true, details: details.into(), suggestion: None }
    }

    fn fail(name: &str, details: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            details: details.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

/// Full preflight report.
#[derive(Debug)]
pub struct CheckReport {
    pub checks: Vec<EnvironmentCheck>,
}

impl CheckReport {
    /// True when every check passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

/// Runs the environment checks.
pub struct EnvironmentChecker<'a> {
    engine: &'a dyn ContainerEngine,
    registry: &'a ServiceRegistry,
    compose_files: &'a [PathBuf],
    data_dir: &'a Path,
}

impl<'a> EnvironmentChecker<'a> {
    pub fn new(
        engine: &'a dyn ContainerEngine,
        registry: &'a ServiceRegistry,
        compose_files: &'a [PathBuf],
        data_dir: &'a Path,
    ) -> Self {
        Self { engine, registry, compose_files, data_dir }
    }

    /// Run all checks and collect the report.
    #[instrument(skip(self))]
    pub async fn run(&self) -> CheckReport {
        let mut checks = Vec::new();
        checks.push(self.check_engine().await);
        checks.extend(self.check_compose_files());
        checks.push(self.check_data_dir());
        checks.extend(self.check_ports().await);
        CheckReport { checks }
    }

    async fn check_engine(&self) -> EnvironmentCheck {
        match self.engine.ping().await {
            Ok(()) => EnvironmentCheck::pass(
                "container engine",
                format!("{} is reachable", self.engine.name()),
            ),
            Err(e) => EnvironmentCheck::fail(
                "container engine",
                e.to_string(),
                "start the Docker daemon and retry",
            ),
        }
    }

    fn check_compose_files(&self) -> Vec<EnvironmentCheck> {
        self.compose_files
            .iter()
            .map(|file| {
                let name = format!("compose file {}", file.display());
                if file.is_file() {
                    EnvironmentCheck::pass(&name, "present")
                } else {
                    EnvironmentCheck::fail(
                        &name,
                        "missing",
                        "run `corral install` to write the compose files",
                    )
                }
            })
            .collect()
    }

    fn check_data_dir(&self) -> EnvironmentCheck {
        let name = "data directory";
        if !self.data_dir.exists() {
            return EnvironmentCheck::fail(
                name,
                format!("{} does not exist", self.data_dir.display()),
                "run `corral install` to create it",
            );
        }
        // Probe writability with an actual write; permission bits lie on
        // some filesystems.
        let probe = self.data_dir.join(".corral-write-probe");
        match std::fs::write(&probe, b"") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                EnvironmentCheck::pass(name, format!("{} is writable", self.data_dir.display()))
            }
            Err(e) => EnvironmentCheck::fail(
                name,
                format!("{} is not writable: {}", self.data_dir.display(), e),
                "fix the directory ownership or permissions",
            ),
        }
    }

    /// For services the stack will publish, an already-bound port means a
    /// conflicting process; if our own stack holds it the start is a no-op
    /// anyway, so the check still passes usefully.
    async fn check_ports(&self) -> Vec<EnvironmentCheck> {
        let mut checks = Vec::new();
        for service in self.registry.services() {
            let Some(url) = &service.health_check_url else {
                continue;
            };
            let Some(port) = parse_port(url) else {
                continue;
            };
            let name = format!("port {} ({})", port, service.name);
            match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(_) => checks.push(EnvironmentCheck::pass(&name, "available")),
                Err(_) => checks.push(EnvironmentCheck::fail(
                    &name,
                    "already in use",
                    format!("stop the process holding port {} or the running stack", port),
                )),
            }
        }
        checks
    }
}

fn parse_port(url: &str) -> Option<u16> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed.port_or_known_default()
}
