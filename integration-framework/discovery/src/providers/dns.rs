use std::collections::BTreeMap;

use async_trait::async_trait;
use integration_framework_config::{
    ServiceDiscoveryKind,
    constants::{DNS_DISCOVERY_CONFIG_MAP, DNS_DISCOVERY_DEPLOYMENT, SYSTEM_NAMESPACE},
};
use integration_framework_core::{
    ComponentState, FrameworkError, HealthCheck,
    health::timed,
    kubernetes::{apply, count_labeled, delete_labeled},
    labels::{discovery_labels, discovery_selector},
};
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Endpoints, Service},
};
use kube::{Api, Client, api::Patch, api::PatchParams};
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::{ServiceDiscoveryStatus, validate_nameserver},
    provider::ServiceDiscoveryProvider,
    workload::{DEFAULT_WORKLOAD_IMAGE, build_workload, deployment_ready},
};

const CLUSTER_DNS_CONFIG_MAP: &str = "coredns";

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DnsOptions {
    nameservers: Vec<String>,
    search_domains: Vec<String>,
    federation_domains: Vec<String>,
    replicas: i32,
    image: String,
}

impl Default for DnsOptions {
    fn default() -> Self {
        Self {
            nameservers: Vec::new(),
            search_domains: Vec::new(),
            federation_domains: Vec::new(),
            replicas: 1,
            image: DEFAULT_WORKLOAD_IMAGE.to_owned(),
        }
    }
}

fn parse_options(config: &Value) -> Result<DnsOptions, FrameworkError> {
    DnsOptions::deserialize(config).map_err(|source| FrameworkError::ConfigParseFailed {
        message: "dns discovery configuration is malformed".to_owned(),
        source: Some(Box::new(source)),
    })
}

/// DNS-based cross-cluster discovery: resolv content in a config map, an
/// optional federation block on the cluster DNS config, and a long-running
/// workload whose readiness doubles as the discovery health signal.
#[derive(Clone, Copy, Debug, Default)]
pub struct DnsDiscovery;

impl DnsDiscovery {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn resolv_content(options: &DnsOptions) -> String {
        let mut content = String::new();
        for nameserver in &options.nameservers {
            content.push_str(&format!("nameserver {nameserver}\n"));
        }
        if !options.search_domains.is_empty() {
            content.push_str(&format!("search {}\n", options.search_domains.join(" ")));
        }
        content
    }

    /// Best-effort merge of a federation block into the cluster DNS config.
    async fn append_federation_block(
        &self,
        client: &Client,
        domains: &[String],
        nameservers: &[String],
    ) {
        let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), SYSTEM_NAMESPACE);
        match config_maps.get_opt(CLUSTER_DNS_CONFIG_MAP).await {
            Ok(Some(_)) => {
                let block = domains
                    .iter()
                    .map(|domain| format!("{domain}:53 {{\n    forward . {}\n}}", nameservers.join(" ")))
                    .collect::<Vec<_>>()
                    .join("\n");
                let patch = json!({ "data": { "federation.server": block } });
                if let Err(err) = config_maps
                    .patch(
                        CLUSTER_DNS_CONFIG_MAP,
                        &PatchParams::default(),
                        &Patch::Merge(&patch),
                    )
                    .await
                {
                    warn!(error = %err, "could not append federation block to cluster dns config");
                }
            }
            Ok(None) => {
                warn!("cluster dns config map not found; skipping federation block");
            }
            Err(err) => {
                warn!(error = %err, "could not read cluster dns config map");
            }
        }
    }
}

#[async_trait]
impl ServiceDiscoveryProvider for DnsDiscovery {
    fn kind(&self) -> ServiceDiscoveryKind {
        ServiceDiscoveryKind::Dns
    }

    fn validate_config(&self, config: &Value) -> Result<(), FrameworkError> {
        let options = parse_options(config)?;

        if options.nameservers.is_empty() {
            return Err(FrameworkError::validation(
                "dns discovery requires at least one nameserver",
            ));
        }
        for nameserver in &options.nameservers {
            validate_nameserver(nameserver).map_err(FrameworkError::validation)?;
        }
        if options.replicas < 1 {
            return Err(FrameworkError::validation(
                "dns discovery replicas must be at least 1",
            ));
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
        let labels = discovery_labels(ServiceDiscoveryKind::Dns.as_str());

        info!(
            nameservers = options.nameservers.len(),
            replicas = options.replicas,
            "installing dns discovery"
        );

        let mut data = BTreeMap::new();
        data.insert("resolv.conf".to_owned(), Self::resolv_content(&options));
        data.insert("nameservers".to_owned(), options.nameservers.join(","));
        let config_map = ConfigMap {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some(DNS_DISCOVERY_CONFIG_MAP.to_owned()),
                namespace: Some(SYSTEM_NAMESPACE.to_owned()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            data: Some(data),
            ..ConfigMap::default()
        };
        apply(client, SYSTEM_NAMESPACE, &config_map).await?;

        if !options.federation_domains.is_empty() {
            self.append_federation_block(client, &options.federation_domains, &options.nameservers)
                .await;
        }

        let workload = build_workload(
            SYSTEM_NAMESPACE,
            DNS_DISCOVERY_DEPLOYMENT,
            labels,
            &options.image,
            options.replicas,
            None,
        );
        apply(client, SYSTEM_NAMESPACE, &workload).await?;

        info!("dns discovery installed");
        Ok(())
    }

    async fn uninstall(
        &self,
        client: &Client,
        _cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let selector = discovery_selector(ServiceDiscoveryKind::Dns.as_str());
        info!(%selector, "uninstalling dns discovery");

        delete_labeled::<Deployment>(client, SYSTEM_NAMESPACE, &selector).await?;
        delete_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;
        Ok(())
    }

    async fn status(&self, client: &Client) -> Result<ServiceDiscoveryStatus, FrameworkError> {
        let selector = discovery_selector(ServiceDiscoveryKind::Dns.as_str());
        let config_maps = count_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;
        let services = count_labeled::<Service>(client, SYSTEM_NAMESPACE, &selector).await?;
        let endpoints = count_labeled::<Endpoints>(client, SYSTEM_NAMESPACE, &selector).await?;

        if config_maps == 0 {
            return Ok(ServiceDiscoveryStatus::not_configured(
                ServiceDiscoveryKind::Dns,
            ));
        }

        let ready = deployment_ready(client, SYSTEM_NAMESPACE, DNS_DISCOVERY_DEPLOYMENT).await?;

        Ok(ServiceDiscoveryStatus {
            provider_type: ServiceDiscoveryKind::Dns,
            state: if ready {
                ComponentState::Configured
            } else {
                ComponentState::Degraded
            },
            healthy: ready,
            timestamp: OffsetDateTime::now_utc(),
            services,
            endpoints,
            error: (!ready).then(|| "dns discovery workload is not ready".to_owned()),
        })
    }

    async fn health_check(&self, client: &Client) -> Result<Vec<HealthCheck>, FrameworkError> {
        let (ready, elapsed) =
            timed(deployment_ready(client, SYSTEM_NAMESPACE, DNS_DISCOVERY_DEPLOYMENT)).await;
        let ready = ready.unwrap_or(false);
        let workload_check = HealthCheck::new(
            "dns-discovery-workload",
            "dns",
            ready,
            if ready {
                "dns discovery replicas ready".to_owned()
            } else {
                "dns discovery replicas not ready".to_owned()
            },
            elapsed,
        )
        .with_detail("deployment", DNS_DISCOVERY_DEPLOYMENT);

        let selector = discovery_selector(ServiceDiscoveryKind::Dns.as_str());
        let (maps, elapsed) =
            timed(count_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector)).await;
        let maps = maps.unwrap_or(0);
        let config_check = HealthCheck::new(
            "dns-discovery-config",
            "dns",
            maps > 0,
            if maps > 0 {
                "dns discovery config map present".to_owned()
            } else {
                "dns discovery config map missing".to_owned()
            },
            elapsed,
        );

        Ok(vec![workload_check, config_check])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn validation_requires_nameservers() {
        let provider = DnsDiscovery::new();
        let err = provider.validate_config(&json!({})).unwrap_err();
        assert!(err.to_string().contains("nameserver"));
    }

    #[test]
    fn validation_rejects_junk_nameservers() {
        let provider = DnsDiscovery::new();
        let err = provider
            .validate_config(&json!({ "nameservers": ["not a host!"] }))
            .unwrap_err();
        assert!(err.to_string().contains("neither an IP address"));
    }

    #[test]
    fn resolv_content_covers_search_domains() {
        let options = parse_options(&json!({
            "nameservers": ["10.96.0.10"],
            "searchDomains": ["svc.cluster.local", "cluster.local"]
        }))
        .unwrap();
        let content = DnsDiscovery::resolv_content(&options);
        assert!(content.contains("nameserver 10.96.0.10"));
        assert!(content.contains("search svc.cluster.local cluster.local"));
    }
}
