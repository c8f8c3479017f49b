use std::collections::BTreeMap;

use async_trait::async_trait;
use integration_framework_config::constants::{
    CROSS_CLUSTER_DISCOVERY_SERVICE, CROSS_CLUSTER_DNS_CONFIG_MAP, SYSTEM_NAMESPACE,
};
use integration_framework_core::{
    ComponentState, FrameworkError, HealthCheck,
    health::timed,
    kubernetes::{apply, count_labeled, delete_labeled},
    labels::{connectivity_labels, connectivity_selector},
};
use k8s_openapi::{
    api::{
        core::v1::{ConfigMap, Endpoints, Service},
        networking::v1::{
            IPBlock, NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicySpec,
        },
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};
use kube::Client;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    config::{ConnectivityKind, ConnectivityStatus},
    helpers::{apply_config_map, create_service_entry, generate_resolv_conf, validate_cidr},
    provider::ConnectivityProvider,
};

const ALLOW_POLICY_NAME: &str = "cross-cluster-allow";
const DISCOVERY_PORT: i32 = 8443;

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct KubernetesOptions {
    enable_network_policies: bool,
    allow_cidrs: Vec<String>,
    dns_nameservers: Vec<String>,
    dns_search_domains: Vec<String>,
}

impl Default for KubernetesOptions {
    fn default() -> Self {
        Self {
            enable_network_policies: true,
            allow_cidrs: Vec::new(),
            dns_nameservers: Vec::new(),
            dns_search_domains: Vec::new(),
        }
    }
}

fn parse_options(config: &Value) -> Result<KubernetesOptions, FrameworkError> {
    KubernetesOptions::deserialize(config).map_err(|source| FrameworkError::ConfigParseFailed {
        message: "kubernetes connectivity configuration is malformed".to_owned(),
        source: Some(Box::new(source)),
    })
}

/// Native cluster-level connectivity: a network policy over the allowed
/// CIDRs, a headless discovery service, and a DNS config map in the system
/// namespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct KubernetesConnectivity;

impl KubernetesConnectivity {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn labels(&self) -> BTreeMap<String, String> {
        connectivity_labels(ConnectivityKind::Kubernetes.as_str())
    }

    fn selector(&self) -> String {
        connectivity_selector(ConnectivityKind::Kubernetes.as_str())
    }

    fn allow_policy(&self, cidrs: &[String]) -> NetworkPolicy {
        let peers = cidrs
            .iter()
            .map(|cidr| NetworkPolicyPeer {
                ip_block: Some(IPBlock {
                    cidr: cidr.clone(),
                    except: None,
                }),
                ..NetworkPolicyPeer::default()
            })
            .collect();

        NetworkPolicy {
            metadata: ObjectMeta {
                name: Some(ALLOW_POLICY_NAME.to_owned()),
                namespace: Some(SYSTEM_NAMESPACE.to_owned()),
                labels: Some(self.labels()),
                ..ObjectMeta::default()
            },
            spec: Some(NetworkPolicySpec {
                pod_selector: LabelSelector::default(),
                ingress: Some(vec![NetworkPolicyIngressRule {
                    from: Some(peers),
                    ports: None,
                }]),
                policy_types: Some(vec!["Ingress".to_owned()]),
                ..NetworkPolicySpec::default()
            }),
        }
    }
}

#[async_trait]
impl ConnectivityProvider for KubernetesConnectivity {
    fn kind(&self) -> ConnectivityKind {
        ConnectivityKind::Kubernetes
    }

    fn validate_config(&self, config: &Value) -> Result<(), FrameworkError> {
        let options = parse_options(config)?;

        if options.enable_network_policies && options.allow_cidrs.is_empty() {
            return Err(FrameworkError::validation(
                "network policies are enabled but allowCidrs is empty",
            ));
        }
        for cidr in &options.allow_cidrs {
            validate_cidr(cidr)?;
        }

        Ok(())
    }

    async fn install(
        &self,
        client: &Client,
        config: &Value,
        _cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        self.validate_config(config)?;
        let options = parse_options(config)?;

        info!(
            cidrs = options.allow_cidrs.len(),
            policies = options.enable_network_policies,
            "installing kubernetes connectivity"
        );

        if options.enable_network_policies {
            apply(client, SYSTEM_NAMESPACE, &self.allow_policy(&options.allow_cidrs)).await?;
        }

        create_service_entry(
            client,
            SYSTEM_NAMESPACE,
            CROSS_CLUSTER_DISCOVERY_SERVICE,
            self.labels(),
            DISCOVERY_PORT,
        )
        .await?;

        let mut data = BTreeMap::new();
        data.insert(
            "resolv.conf".to_owned(),
            generate_resolv_conf(&options.dns_nameservers, &options.dns_search_domains),
        );
        apply_config_map(
            client,
            SYSTEM_NAMESPACE,
            CROSS_CLUSTER_DNS_CONFIG_MAP,
            self.labels(),
            data,
        )
        .await?;

        info!("kubernetes connectivity installed");
        Ok(())
    }

    async fn uninstall(
        &self,
        client: &Client,
        _cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let selector = self.selector();
        info!(%selector, "uninstalling kubernetes connectivity");

        delete_labeled::<NetworkPolicy>(client, SYSTEM_NAMESPACE, &selector).await?;
        delete_labeled::<Service>(client, SYSTEM_NAMESPACE, &selector).await?;
        delete_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;

        Ok(())
    }

    async fn status(&self, client: &Client) -> Result<ConnectivityStatus, FrameworkError> {
        let selector = self.selector();
        let policies = count_labeled::<NetworkPolicy>(client, SYSTEM_NAMESPACE, &selector).await?;
        let services = count_labeled::<Service>(client, SYSTEM_NAMESPACE, &selector).await?;
        let endpoints = count_labeled::<Endpoints>(client, SYSTEM_NAMESPACE, &selector).await?;
        let config_maps = count_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;

        let configured = policies + services + config_maps > 0;
        debug!(policies, services, endpoints, config_maps, "kubernetes connectivity inventory");

        Ok(ConnectivityStatus {
            provider_type: ConnectivityKind::Kubernetes,
            state: if configured {
                ComponentState::Configured
            } else {
                ComponentState::NotConfigured
            },
            healthy: configured,
            timestamp: OffsetDateTime::now_utc(),
            policies,
            services,
            endpoints,
            error: None,
        })
    }

    async fn health_check(&self, client: &Client) -> Result<Vec<HealthCheck>, FrameworkError> {
        let selector = self.selector();

        let (policies, policy_elapsed) =
            timed(count_labeled::<NetworkPolicy>(client, SYSTEM_NAMESPACE, &selector)).await;
        let policies = policies.unwrap_or(0);
        let policy_check = HealthCheck::new(
            "network-policies",
            "kubernetes",
            policies > 0,
            if policies > 0 {
                format!("{policies} labelled network policies present")
            } else {
                "no labelled network policies found".to_owned()
            },
            policy_elapsed,
        )
        .with_detail("namespace", SYSTEM_NAMESPACE);

        let (dns_maps, dns_elapsed) =
            timed(count_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector)).await;
        let dns_maps = dns_maps.unwrap_or(0);
        let dns_check = HealthCheck::new(
            "cross-cluster-dns",
            "kubernetes",
            dns_maps > 0,
            if dns_maps > 0 {
                "dns config map present".to_owned()
            } else {
                "dns config map missing".to_owned()
            },
            dns_elapsed,
        )
        .with_detail("config_map", CROSS_CLUSTER_DNS_CONFIG_MAP);

        Ok(vec![policy_check, dns_check])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn validation_requires_cidrs_when_policies_enabled() {
        let provider = KubernetesConnectivity::new();
        let err = provider.validate_config(&json!({})).unwrap_err();
        assert!(err.to_string().contains("allowCidrs"));

        provider
            .validate_config(&json!({ "enableNetworkPolicies": false }))
            .unwrap();
    }

    #[test]
    fn validation_rejects_malformed_cidrs() {
        let provider = KubernetesConnectivity::new();
        let err = provider
            .validate_config(&json!({ "allowCidrs": ["10.0.0.0/99"] }))
            .unwrap_err();
        assert!(err.to_string().contains("prefix length"));
    }

    #[test]
    fn allow_policy_covers_every_cidr() {
        let provider = KubernetesConnectivity::new();
        let policy = provider.allow_policy(&[
            "10.0.0.0/8".to_owned(),
            "192.168.0.0/16".to_owned(),
        ]);
        let ingress = policy.spec.unwrap().ingress.unwrap();
        assert_eq!(ingress[0].from.as_ref().unwrap().len(), 2);
        assert_eq!(
            policy.metadata.labels.unwrap()["connectivity-type"],
            "kubernetes"
        );
    }
}
