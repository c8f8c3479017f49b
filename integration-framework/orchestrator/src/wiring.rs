use integration_framework_config::{
    ClusterConfig, ClusterTopology, ServiceDiscoveryKind,
    constants::{CROSS_CLUSTER_DNS_CONFIG_MAP, SYSTEM_NAMESPACE},
};
use integration_framework_connectivity::helpers::{apply_config_map, generate_resolv_conf};
use integration_framework_core::{
    ClusterProvider, FrameworkError, kubernetes::client_from_kubeconfig, labels::connectivity_labels,
};
use integration_framework_discovery::ServiceDiscoveryFramework;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::factory::ProviderFactory;

/// Default in-cluster DNS service address used when a topology declares DNS
/// discovery without naming its servers.
const DEFAULT_CLUSTER_DNS: &str = "10.96.0.10";

/// Wire every cluster of the topology: per-cluster network options first,
/// then cross-cluster service discovery when the topology declares one.
///
/// Every failure in here is a tolerance boundary: logged, skipped, observable
/// through the topology status, never fatal to the create call.
pub async fn configure_topology_networking(
    factory: &dyn ProviderFactory,
    topology: &ClusterTopology,
    cancel: &CancellationToken,
) -> Result<(), FrameworkError> {
    let configs =
        std::iter::once(&topology.primary).chain(topology.remotes.values());

    for config in configs {
        let provider = factory.provider_for(config.provider_kind)?;
        configure_cluster_networking(provider.as_ref(), config, topology, cancel).await;
    }

    Ok(())
}

async fn configure_cluster_networking(
    provider: &dyn ClusterProvider,
    config: &ClusterConfig,
    topology: &ClusterTopology,
    cancel: &CancellationToken,
) {
    // Never push network configuration into a cluster that is not healthy.
    match provider.status(&config.name).await {
        Ok(status) if status.healthy => {}
        Ok(status) => {
            warn!(
                cluster = %config.name,
                state = status.state.as_str(),
                "cluster is not healthy; skipping network configuration"
            );
            return;
        }
        Err(err) => {
            warn!(cluster = %config.name, error = %err, "cannot interrogate cluster; skipping network configuration");
            return;
        }
    }

    if let Err(err) = config.validate(provider.supported_drivers()) {
        warn!(cluster = %config.name, error = %err, "declared network driver rejected; skipping network configuration");
        return;
    }

    if !config.options.ports.is_empty() {
        // Port mappings were materialised by the provider at create time.
        debug!(
            cluster = %config.name,
            ports = config.options.ports.len(),
            "host port mappings already bound at creation"
        );
    }

    if config.options.ingress {
        if let Err(err) = provider.enable_ingress(&config.name, cancel).await {
            warn!(cluster = %config.name, error = %err, "ingress add-on could not be enabled");
        }
    }

    if !config.options.dns.is_empty() {
        if let Err(err) = push_dns_config(provider, config).await {
            warn!(cluster = %config.name, error = %err, "cluster DNS configuration failed");
        }
    }

    if topology.network.is_meaningful() {
        if let Err(err) = initialise_discovery(provider, config, topology, cancel).await {
            warn!(cluster = %config.name, error = %err, "cross-cluster discovery initialisation failed");
        }
    }
}

/// Translate the cluster's DNS block into the cross-cluster DNS config map.
async fn push_dns_config(
    provider: &dyn ClusterProvider,
    config: &ClusterConfig,
) -> Result<(), FrameworkError> {
    let kubeconfig = provider.kubeconfig(&config.name).await?;
    let client = client_from_kubeconfig(&kubeconfig, None).await?;

    let mut data = std::collections::BTreeMap::new();
    data.insert(
        "resolv.conf".to_owned(),
        generate_resolv_conf(
            &config.options.dns.nameservers,
            &config.options.dns.search_domains,
        ),
    );

    info!(cluster = %config.name, "writing cluster DNS configuration");
    apply_config_map(
        &client,
        SYSTEM_NAMESPACE,
        CROSS_CLUSTER_DNS_CONFIG_MAP,
        connectivity_labels("kubernetes"),
        data,
    )
    .await
}

/// Install the topology's declared discovery mechanism into one cluster.
async fn initialise_discovery(
    provider: &dyn ClusterProvider,
    config: &ClusterConfig,
    topology: &ClusterTopology,
    cancel: &CancellationToken,
) -> Result<(), FrameworkError> {
    let kind = topology.network.service_discovery.kind;
    if !kind.is_set() {
        debug!(cluster = %config.name, "no discovery mechanism declared; nothing to initialise");
        return Ok(());
    }

    let kubeconfig = provider.kubeconfig(&config.name).await?;
    let client = client_from_kubeconfig(&kubeconfig, None).await?;
    let discovery = ServiceDiscoveryFramework::new(client);

    let config_payload = discovery_payload(kind, config, topology);
    info!(cluster = %config.name, %kind, "initialising cross-cluster discovery");
    discovery.install(kind, &config_payload, cancel).await
}

fn discovery_payload(
    kind: ServiceDiscoveryKind,
    config: &ClusterConfig,
    topology: &ClusterTopology,
) -> serde_json::Value {
    let cluster_names: Vec<String> = topology
        .cluster_names()
        .into_iter()
        .map(ToOwned::to_owned)
        .collect();

    match kind {
        ServiceDiscoveryKind::Dns => {
            let mut nameservers = config.options.dns.nameservers.clone();
            if nameservers.is_empty() {
                nameservers.push(DEFAULT_CLUSTER_DNS.to_owned());
            }
            json!({
                "nameservers": nameservers,
                "searchDomains": config.options.dns.search_domains,
            })
        }
        ServiceDiscoveryKind::ApiServer => json!({
            "clusters": cluster_names,
            "controlPlaneUrl": format!("https://{}:6443", topology.primary.name),
        }),
        ServiceDiscoveryKind::Propagation => json!({
            "clusters": cluster_names,
        }),
        ServiceDiscoveryKind::Manual | ServiceDiscoveryKind::Unset => json!({
            "clusters": cluster_names,
        }),
    }
}

#[cfg(test)]
mod tests {
    use integration_framework_config::{ClusterConfig, ProviderKind};

    use super::*;

    #[test]
    fn dns_payload_defaults_the_nameserver() {
        let topology = ClusterTopology::single(ClusterConfig::new("p", ProviderKind::Kind));
        let payload = discovery_payload(
            ServiceDiscoveryKind::Dns,
            &topology.primary.clone(),
            &topology,
        );
        assert_eq!(payload["nameservers"][0], DEFAULT_CLUSTER_DNS);
    }

    #[test]
    fn api_server_payload_lists_every_cluster() {
        let topology = ClusterTopology::single(ClusterConfig::new("p", ProviderKind::Kind))
            .with_remote("east", ClusterConfig::new("r1", ProviderKind::Kind));
        let payload = discovery_payload(
            ServiceDiscoveryKind::ApiServer,
            &topology.primary.clone(),
            &topology,
        );
        assert_eq!(payload["clusters"], json!(["p", "r1"]));
        assert!(
            payload["controlPlaneUrl"]
                .as_str()
                .unwrap()
                .starts_with("https://")
        );
    }
}
