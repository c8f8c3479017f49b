use std::collections::BTreeMap;

use integration_framework_core::{FrameworkError, kubernetes::apply};
use k8s_openapi::{
    api::core::v1::{ConfigMap, Service, ServicePort, ServiceSpec},
    apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString},
};
use kube::Client;
use tracing::debug;

/// Create or update a labelled config map.
pub async fn apply_config_map(
    client: &Client,
    namespace: &str,
    name: &str,
    labels: BTreeMap<String, String>,
    data: BTreeMap<String, String>,
) -> Result<(), FrameworkError> {
    let config_map = ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..ConfigMap::default()
    };

    debug!(namespace, name, "applying config map");
    apply(client, namespace, &config_map).await
}

/// Resolv-style content handed to in-cluster DNS consumers.
#[must_use]
pub fn generate_resolv_conf(nameservers: &[String], search_domains: &[String]) -> String {
    let mut content = String::new();
    for nameserver in nameservers {
        content.push_str(&format!("nameserver {nameserver}\n"));
    }
    if !search_domains.is_empty() {
        content.push_str(&format!("search {}\n", search_domains.join(" ")));
    }
    content.push_str("options ndots:5\n");
    content
}

/// Headless service entry other clusters resolve for cross-cluster traffic.
pub async fn create_service_entry(
    client: &Client,
    namespace: &str,
    name: &str,
    labels: BTreeMap<String, String>,
    port: i32,
) -> Result<(), FrameworkError> {
    let service = Service {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_owned()),
            selector: Some(labels),
            ports: Some(vec![ServicePort {
                name: Some("discovery".to_owned()),
                port,
                target_port: Some(IntOrString::Int(port)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    };

    debug!(namespace, name, port, "applying headless service entry");
    apply(client, namespace, &service).await
}

/// Accepts `addr/prefix` with a prefix bounded by the address family.
pub fn validate_cidr(cidr: &str) -> Result<(), FrameworkError> {
    let invalid = |reason: &str| {
        FrameworkError::validation(format!("invalid CIDR `{cidr}`: {reason}"))
    };

    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| invalid("missing prefix length"))?;

    let parsed: std::net::IpAddr = addr
        .parse()
        .map_err(|_| invalid("address part is not an IP address"))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| invalid("prefix length is not a number"))?;

    let max = if parsed.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(invalid("prefix length exceeds the address family"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolv_content_lists_nameservers_then_search() {
        let content = generate_resolv_conf(
            &["10.96.0.10".to_owned(), "10.96.0.11".to_owned()],
            &["svc.cluster.local".to_owned()],
        );
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "nameserver 10.96.0.10");
        assert_eq!(lines[1], "nameserver 10.96.0.11");
        assert_eq!(lines[2], "search svc.cluster.local");
        assert_eq!(lines[3], "options ndots:5");
    }

    #[test]
    fn cidr_validation_accepts_both_families() {
        validate_cidr("10.0.0.0/8").unwrap();
        validate_cidr("fd00::/64").unwrap();
    }

    #[test]
    fn cidr_validation_rejects_malformed_input() {
        assert!(validate_cidr("10.0.0.0").is_err());
        assert!(validate_cidr("banana/8").is_err());
        assert!(validate_cidr("10.0.0.0/33").is_err());
        assert!(validate_cidr("10.0.0.0/x").is_err());
    }
}
