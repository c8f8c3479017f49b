use std::collections::BTreeMap;

use integration_framework_config::ProviderKind;
use serde::{Deserialize, Serialize};

/// Observed lifecycle state of a single cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    Running,
    Stopped,
    NotFound,
    Error,
    Unknown,
    Unhealthy,
    Degraded,
}

impl ClusterState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::NotFound => "not_found",
            Self::Error => "error",
            Self::Unknown => "unknown",
            Self::Unhealthy => "unhealthy",
            Self::Degraded => "degraded",
        }
    }
}

/// Point-in-time status of one cluster as reported by its provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub name: String,
    pub provider_kind: ProviderKind,
    pub state: ClusterState,
    pub healthy: bool,
    pub nodes: u32,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClusterStatus {
    /// Status for a cluster the provider cannot see; never an error.
    #[must_use]
    pub fn not_found(name: impl Into<String>, provider_kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            provider_kind,
            state: ClusterState::NotFound,
            healthy: false,
            nodes: 0,
            version: String::new(),
            error: None,
        }
    }

    /// Fallback status when interrogation failed structurally.
    #[must_use]
    pub fn unknown(
        name: impl Into<String>,
        provider_kind: ProviderKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider_kind,
            state: ClusterState::Unknown,
            healthy: false,
            nodes: 0,
            version: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Installation state of a connectivity or discovery component inside a
/// cluster. Absence is a valid state, never an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Configured,
    NotConfigured,
    Degraded,
    Error,
    Unknown,
}

/// Aggregate health over all clusters of a topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederationStatus {
    Enabled,
    Disabled,
}

/// Aggregate state of the declared inter-cluster network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Connected,
    NotConfigured,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Composed status of a full topology.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyStatus {
    pub primary: ClusterStatus,
    pub remotes: BTreeMap<String, ClusterStatus>,
    pub overall_health: OverallHealth,
    pub federation_status: FederationStatus,
    pub network_status: NetworkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_serialize_in_snake_case() {
        let json = serde_json::to_string(&ClusterState::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
        let json = serde_json::to_string(&NetworkStatus::NotConfigured).unwrap();
        assert_eq!(json, "\"not_configured\"");
    }

    #[test]
    fn missing_cluster_status_is_not_an_error() {
        let status = ClusterStatus::not_found("ghost", ProviderKind::Kind);
        assert_eq!(status.state, ClusterState::NotFound);
        assert!(!status.healthy);
        assert!(status.error.is_none());
    }
}
