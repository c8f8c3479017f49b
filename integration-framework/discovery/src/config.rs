use integration_framework_config::ServiceDiscoveryKind;
use integration_framework_core::ComponentState;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Point-in-time state of one discovery installation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceDiscoveryStatus {
    #[serde(rename = "type")]
    pub provider_type: ServiceDiscoveryKind,
    pub state: ComponentState,
    pub healthy: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub services: u32,
    pub endpoints: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceDiscoveryStatus {
    #[must_use]
    pub fn not_configured(provider_type: ServiceDiscoveryKind) -> Self {
        Self {
            provider_type,
            state: ComponentState::NotConfigured,
            healthy: false,
            timestamp: OffsetDateTime::now_utc(),
            services: 0,
            endpoints: 0,
            error: None,
        }
    }
}

/// A nameserver entry must look like an IP address or a hostname.
pub fn validate_nameserver(value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("nameserver entry is empty".to_owned());
    }
    if trimmed.parse::<std::net::IpAddr>().is_ok() {
        return Ok(());
    }

    let hostname_like = trimmed.split('.').all(|part| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !part.starts_with('-')
            && !part.ends_with('-')
    });
    if hostname_like {
        Ok(())
    } else {
        Err(format!("`{trimmed}` is neither an IP address nor a hostname"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ips_and_hostnames() {
        validate_nameserver("10.96.0.10").unwrap();
        validate_nameserver("fd00::10").unwrap();
        validate_nameserver("dns.kube-system.svc").unwrap();
        validate_nameserver("coredns").unwrap();
    }

    #[test]
    fn rejects_junk() {
        assert!(validate_nameserver("").is_err());
        assert!(validate_nameserver("  ").is_err());
        assert!(validate_nameserver("bad_host!name").is_err());
        assert!(validate_nameserver("-leading.dash").is_err());
    }
}
