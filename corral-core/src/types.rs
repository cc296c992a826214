//! Transient value types reported by status queries.

use crate::engine::ResourceUsage;
use crate::health::HealthState;
use crate::registry::ServiceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time status of one service. Recomputed on every status
/// query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub kind: ServiceKind,
    pub is_running: bool,
    /// Engine lifecycle state string ("running", "exited", "not created").
    pub lifecycle_state: String,
    pub health: HealthState,
    /// container port -> published host port.
    pub ports: BTreeMap<u16, Option<u16>>,
    pub resource_usage: ResourceUsage,
}
