use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Cross-cluster gateway declaration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Service-discovery mechanisms a topology may declare.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceDiscoveryKind {
    Dns,
    ApiServer,
    Propagation,
    Manual,
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl ServiceDiscoveryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dns => "dns",
            Self::ApiServer => "api-server",
            Self::Propagation => "propagation",
            Self::Manual => "manual",
            Self::Unset => "",
        }
    }

    #[must_use]
    pub const fn is_set(self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl fmt::Display for ServiceDiscoveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceDiscoveryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dns" => Ok(Self::Dns),
            "api-server" => Ok(Self::ApiServer),
            "propagation" => Ok(Self::Propagation),
            "manual" => Ok(Self::Manual),
            "" => Ok(Self::Unset),
            other => Err(format!("unknown service discovery kind `{other}`")),
        }
    }
}

/// Reference to the topology-wide discovery mechanism.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDiscoveryRef {
    #[serde(rename = "type")]
    pub kind: ServiceDiscoveryKind,
}

/// Free-form connectivity policy descriptor forwarded to the plane providers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub settings: BTreeMap<String, String>,
}

/// Inter-cluster network declaration of a topology.
///
/// Any non-empty sub-field makes the declaration meaningful and triggers
/// cross-cluster wiring after creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub gateway: GatewayConfig,
    #[serde(rename = "serviceDiscovery")]
    pub service_discovery: ServiceDiscoveryRef,
    pub policies: Vec<PolicyDescriptor>,
}

impl NetworkConfig {
    #[must_use]
    pub fn is_meaningful(&self) -> bool {
        !self.gateway.kind.is_empty()
            || self.service_discovery.kind.is_set()
            || !self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_network_is_not_meaningful() {
        assert!(!NetworkConfig::default().is_meaningful());
    }

    #[test]
    fn any_sub_field_makes_the_network_meaningful() {
        let mut network = NetworkConfig::default();
        network.gateway.kind = "east-west".to_owned();
        assert!(network.is_meaningful());

        let mut network = NetworkConfig::default();
        network.service_discovery.kind = ServiceDiscoveryKind::Dns;
        assert!(network.is_meaningful());

        let mut network = NetworkConfig::default();
        network.policies.push(PolicyDescriptor::default());
        assert!(network.is_meaningful());
    }

    #[test]
    fn discovery_kind_round_trips_through_strings() {
        for kind in [
            ServiceDiscoveryKind::Dns,
            ServiceDiscoveryKind::ApiServer,
            ServiceDiscoveryKind::Propagation,
            ServiceDiscoveryKind::Manual,
            ServiceDiscoveryKind::Unset,
        ] {
            assert_eq!(kind.as_str().parse::<ServiceDiscoveryKind>(), Ok(kind));
        }
    }
}
