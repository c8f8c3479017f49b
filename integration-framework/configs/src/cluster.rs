use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::provider::ProviderKind;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClusterConfigError {
    #[error("cluster name must not be empty")]
    EmptyName,
    #[error("cluster `{cluster}` requests {memory}, below the 1Gi minimum")]
    MemoryBelowMinimum { cluster: String, memory: MemorySize },
    #[error("cluster `{cluster}` requests {cpus} cpus, at least 1 is required")]
    CpusBelowMinimum { cluster: String, cpus: u32 },
    #[error("cluster `{cluster}` declares driver `{driver}`, supported drivers: {supported:?}")]
    UnsupportedDriver {
        cluster: String,
        driver: String,
        supported: Vec<&'static str>,
    },
    #[error("invalid memory size `{value}`: {reason}")]
    InvalidMemory { value: String, reason: &'static str },
    #[error("invalid cpu count `{value}`")]
    InvalidCpus { value: String },
    #[error("invalid port spec `{value}` (expected host:container[/protocol])")]
    InvalidPort { value: String },
}

/// Memory amount parsed from a unit-suffixed string.
///
/// Bare numbers are interpreted as mebibytes, matching the profile manager's
/// flag convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemorySize {
    bytes: u64,
}

impl MemorySize {
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub const fn from_mebibytes(mib: u64) -> Self {
        Self { bytes: mib * MIB }
    }

    #[must_use]
    pub const fn from_gibibytes(gib: u64) -> Self {
        Self { bytes: gib * GIB }
    }

    #[must_use]
    pub const fn as_bytes(self) -> u64 {
        self.bytes
    }

    #[must_use]
    pub const fn as_mebibytes(self) -> u64 {
        self.bytes / MIB
    }

    #[must_use]
    pub const fn as_gibibytes(self) -> u64 {
        self.bytes / GIB
    }

    /// Render as the `<n>mb` form every provider flag accepts.
    #[must_use]
    pub fn to_flag_value(self) -> String {
        format!("{}mb", self.as_mebibytes())
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes % GIB == 0 {
            write!(f, "{}Gi", self.bytes / GIB)
        } else {
            write!(f, "{}Mi", self.bytes / MIB)
        }
    }
}

impl FromStr for MemorySize {
    type Err = ClusterConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ClusterConfigError::InvalidMemory {
                value: s.to_owned(),
                reason: "empty string",
            });
        }

        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, suffix) = trimmed.split_at(split);

        let amount: u64 = digits
            .parse()
            .map_err(|_| ClusterConfigError::InvalidMemory {
                value: s.to_owned(),
                reason: "missing numeric amount",
            })?;

        let multiplier = match suffix.trim().to_ascii_lowercase().as_str() {
            "" => MIB,
            "b" => 1,
            "k" | "kb" | "ki" | "kib" => 1024,
            "m" | "mb" | "mi" | "mib" => MIB,
            "g" | "gb" | "gi" | "gib" => GIB,
            "t" | "tb" | "ti" | "tib" => 1024 * GIB,
            _ => {
                return Err(ClusterConfigError::InvalidMemory {
                    value: s.to_owned(),
                    reason: "unrecognized unit suffix",
                });
            }
        };

        amount
            .checked_mul(multiplier)
            .map(MemorySize::from_bytes)
            .ok_or(ClusterConfigError::InvalidMemory {
                value: s.to_owned(),
                reason: "amount overflows",
            })
    }
}

impl Serialize for MemorySize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MemorySize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// CPU request accepting either an integer or a numeric string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuCount(pub u32);

impl CpuCount {
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CpuCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for CpuCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n)),
            Raw::Text(text) => text
                .trim()
                .parse()
                .map(Self)
                .map_err(|_| serde::de::Error::custom(format!("invalid cpu count `{text}`"))),
        }
    }
}

impl Serialize for CpuCount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

/// Host-to-cluster port mapping in `host:container[/protocol]` form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSpec {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: String,
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.host_port, self.container_port, self.protocol
        )
    }
}

impl FromStr for PortSpec {
    type Err = ClusterConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ClusterConfigError::InvalidPort {
            value: s.to_owned(),
        };

        let (mapping, protocol) = match s.split_once('/') {
            Some((mapping, proto)) => (mapping, proto),
            None => (s, "tcp"),
        };
        if !matches!(protocol.to_ascii_lowercase().as_str(), "tcp" | "udp" | "sctp") {
            return Err(invalid());
        }

        let (host, container) = mapping.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            host_port: host.trim().parse().map_err(|_| invalid())?,
            container_port: container.trim().parse().map_err(|_| invalid())?,
            protocol: protocol.to_ascii_lowercase(),
        })
    }
}

impl Serialize for PortSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PortSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Nested DNS block of the cluster options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsOptions {
    pub nameservers: Vec<String>,
    #[serde(rename = "searchDomains")]
    pub search_domains: Vec<String>,
    pub domain: Option<String>,
}

impl DnsOptions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nameservers.is_empty() && self.search_domains.is_empty() && self.domain.is_none()
    }
}

/// Recognized tuning knobs for a cluster; unknown keys are ignored on
/// deserialization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    pub nodes: Option<u32>,
    pub memory: Option<MemorySize>,
    pub cpus: Option<CpuCount>,
    #[serde(rename = "diskSize")]
    pub disk_size: Option<MemorySize>,
    pub driver: Option<String>,
    pub network: Option<String>,
    pub addons: Vec<String>,
    pub ports: Vec<PortSpec>,
    pub dns: DnsOptions,
    pub ingress: bool,
}

/// Caller intent for a single cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    #[serde(rename = "providerKind")]
    pub provider_kind: ProviderKind,
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "config")]
    pub options: ClusterOptions,
}

impl ClusterConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, provider_kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            provider_kind,
            version: String::new(),
            options: ClusterOptions::default(),
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn with_nodes(mut self, nodes: u32) -> Self {
        self.options.nodes = Some(nodes);
        self
    }

    #[must_use]
    pub fn with_memory(mut self, memory: MemorySize) -> Self {
        self.options.memory = Some(memory);
        self
    }

    #[must_use]
    pub fn with_cpus(mut self, cpus: u32) -> Self {
        self.options.cpus = Some(CpuCount(cpus));
        self
    }

    /// Requested node count, defaulting to a single node.
    #[must_use]
    pub fn node_count(&self) -> u32 {
        self.options.nodes.unwrap_or(1).max(1)
    }

    /// Check structural invariants against a provider's driver set.
    pub fn validate(&self, supported_drivers: &[&'static str]) -> Result<(), ClusterConfigError> {
        if self.name.trim().is_empty() {
            return Err(ClusterConfigError::EmptyName);
        }

        if let Some(memory) = self.options.memory
            && memory < MemorySize::from_gibibytes(1)
        {
            return Err(ClusterConfigError::MemoryBelowMinimum {
                cluster: self.name.clone(),
                memory,
            });
        }

        if let Some(cpus) = self.options.cpus
            && cpus.get() < 1
        {
            return Err(ClusterConfigError::CpusBelowMinimum {
                cluster: self.name.clone(),
                cpus: cpus.get(),
            });
        }

        if let Some(driver) = self.options.driver.as_deref()
            && !supported_drivers.contains(&driver)
        {
            return Err(ClusterConfigError::UnsupportedDriver {
                cluster: self.name.clone(),
                driver: driver.to_owned(),
                supported: supported_drivers.to_vec(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_parses_binary_and_decimal_suffixes() {
        assert_eq!(
            "4g".parse::<MemorySize>().unwrap(),
            MemorySize::from_gibibytes(4)
        );
        assert_eq!(
            "2048Mi".parse::<MemorySize>().unwrap(),
            MemorySize::from_gibibytes(2)
        );
        assert_eq!(
            "512".parse::<MemorySize>().unwrap(),
            MemorySize::from_mebibytes(512)
        );
    }

    #[test]
    fn memory_rejects_garbage() {
        assert!("".parse::<MemorySize>().is_err());
        assert!("lots".parse::<MemorySize>().is_err());
        assert!("4q".parse::<MemorySize>().is_err());
    }

    #[test]
    fn port_spec_parses_with_and_without_protocol() {
        let spec: PortSpec = "8080:80".parse().unwrap();
        assert_eq!(spec.host_port, 8080);
        assert_eq!(spec.container_port, 80);
        assert_eq!(spec.protocol, "tcp");

        let spec: PortSpec = "5353:53/udp".parse().unwrap();
        assert_eq!(spec.protocol, "udp");

        assert!("80".parse::<PortSpec>().is_err());
        assert!("80:http".parse::<PortSpec>().is_err());
    }

    #[test]
    fn options_ignore_unknown_keys() {
        let yaml = r#"
nodes: 3
memory: 4g
cpus: "2"
somethingNew: true
dns:
  nameservers: ["10.96.0.10"]
"#;
        let options: ClusterOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options.nodes, Some(3));
        assert_eq!(options.memory, Some(MemorySize::from_gibibytes(4)));
        assert_eq!(options.cpus, Some(CpuCount(2)));
        assert_eq!(options.dns.nameservers, vec!["10.96.0.10".to_owned()]);
    }

    #[test]
    fn validate_enforces_floor_and_driver_set() {
        let mut config = ClusterConfig::new("alpha", ProviderKind::Minikube)
            .with_memory(MemorySize::from_mebibytes(512));
        assert!(matches!(
            config.validate(&["docker"]),
            Err(ClusterConfigError::MemoryBelowMinimum { .. })
        ));

        config.options.memory = Some(MemorySize::from_gibibytes(2));
        config.options.driver = Some("warp".to_owned());
        assert!(matches!(
            config.validate(&["docker", "podman"]),
            Err(ClusterConfigError::UnsupportedDriver { .. })
        ));

        config.options.driver = Some("docker".to_owned());
        config.validate(&["docker", "podman"]).unwrap();
    }

    #[test]
    fn validate_rejects_empty_name() {
        let config = ClusterConfig::new("  ", ProviderKind::Kind);
        assert_eq!(
            config.validate(&[]).unwrap_err(),
            ClusterConfigError::EmptyName
        );
    }
}
