use std::collections::BTreeMap;

use async_trait::async_trait;
use integration_framework_core::{
    ComponentState, FrameworkError, HealthCheck,
    health::timed,
    kubernetes::{count_labeled, delete_labeled},
    labels::{connectivity_labels, connectivity_selector},
};
use k8s_openapi::api::core::v1::{ConfigMap, Endpoints, Namespace, Pod, Service};
use kube::{Api, Client, api::ListParams};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::{ConnectivityKind, ConnectivityStatus},
    helpers::apply_config_map,
    provider::ConnectivityProvider,
};

const LINKERD_NAMESPACE: &str = "linkerd";
const MESH_CONFIG_MAP: &str = "linkerd-mesh-config";
const TRAFFIC_CONFIG_MAP: &str = "linkerd-traffic-config";
const CONTROLLER_SELECTOR: &str = "linkerd.io/control-plane-component=controller";

const DEFAULT_TRUST_DOMAIN: &str = "cluster.local";

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LinkerdOptions {
    enabled: bool,
    trust_domain: String,
    cluster_domain: Option<String>,
}

impl Default for LinkerdOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            trust_domain: DEFAULT_TRUST_DOMAIN.to_owned(),
            cluster_domain: None,
        }
    }
}

fn parse_options(config: &Value) -> Result<LinkerdOptions, FrameworkError> {
    LinkerdOptions::deserialize(config).map_err(|source| FrameworkError::ConfigParseFailed {
        message: "linkerd connectivity configuration is malformed".to_owned(),
        source: Some(Box::new(source)),
    })
}

/// Mesh-based connectivity through the Linkerd control plane namespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinkerdConnectivity;

impl LinkerdConnectivity {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn controller_running(&self, client: &Client) -> Result<bool, FrameworkError> {
        let namespaces: Api<Namespace> = Api::all(client.clone());
        if namespaces.get_opt(LINKERD_NAMESPACE).await?.is_none() {
            return Ok(false);
        }

        let pods: Api<Pod> = Api::namespaced(client.clone(), LINKERD_NAMESPACE);
        let controllers = pods
            .list(&ListParams::default().labels(CONTROLLER_SELECTOR))
            .await?;

        let running = !controllers.items.is_empty()
            && controllers.items.iter().all(|pod| {
                pod.status
                    .as_ref()
                    .and_then(|status| status.phase.as_deref())
                    == Some("Running")
            });

        debug!(pods = controllers.items.len(), running, "inspected linkerd controllers");
        Ok(running)
    }
}

#[async_trait]
impl ConnectivityProvider for LinkerdConnectivity {
    fn kind(&self) -> ConnectivityKind {
        ConnectivityKind::Linkerd
    }

    fn validate_config(&self, config: &Value) -> Result<(), FrameworkError> {
        let options = parse_options(config)?;

        if options.enabled && options.trust_domain.trim().is_empty() {
            return Err(FrameworkError::validation(
                "linkerd connectivity requires a non-empty trust domain",
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
        let labels = connectivity_labels(ConnectivityKind::Linkerd.as_str());

        info!(trust_domain = %options.trust_domain, "installing linkerd connectivity config");

        let mut mesh_data = BTreeMap::new();
        mesh_data.insert("trustDomain".to_owned(), options.trust_domain.clone());
        mesh_data.insert(
            "clusterDomain".to_owned(),
            options
                .cluster_domain
                .clone()
                .unwrap_or_else(|| DEFAULT_TRUST_DOMAIN.to_owned()),
        );
        apply_config_map(client, LINKERD_NAMESPACE, MESH_CONFIG_MAP, labels.clone(), mesh_data)
            .await?;

        let mut traffic_data = BTreeMap::new();
        traffic_data.insert("multicluster".to_owned(), "true".to_owned());
        apply_config_map(client, LINKERD_NAMESPACE, TRAFFIC_CONFIG_MAP, labels, traffic_data)
            .await?;

        info!("linkerd connectivity config installed");
        Ok(())
    }

    async fn uninstall(
        &self,
        client: &Client,
        _cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let selector = connectivity_selector(ConnectivityKind::Linkerd.as_str());
        info!(%selector, "uninstalling linkerd connectivity config");
        delete_labeled::<ConfigMap>(client, LINKERD_NAMESPACE, &selector).await
    }

    async fn status(&self, client: &Client) -> Result<ConnectivityStatus, FrameworkError> {
        let selector = connectivity_selector(ConnectivityKind::Linkerd.as_str());
        let config_maps = count_labeled::<ConfigMap>(client, LINKERD_NAMESPACE, &selector).await?;
        let services = count_labeled::<Service>(client, LINKERD_NAMESPACE, &selector).await?;
        let endpoints = count_labeled::<Endpoints>(client, LINKERD_NAMESPACE, &selector).await?;

        if config_maps == 0 {
            return Ok(ConnectivityStatus::not_configured(ConnectivityKind::Linkerd));
        }

        let controller = match self.controller_running(client).await {
            Ok(running) => running,
            Err(err) => {
                warn!(error = %err, "could not inspect linkerd control plane");
                false
            }
        };

        Ok(ConnectivityStatus {
            provider_type: ConnectivityKind::Linkerd,
            state: if controller {
                ComponentState::Configured
            } else {
                ComponentState::Degraded
            },
            healthy: controller,
            timestamp: OffsetDateTime::now_utc(),
            policies: config_maps,
            services,
            endpoints,
            error: (!controller).then(|| "linkerd controller pods are not running".to_owned()),
        })
    }

    async fn health_check(&self, client: &Client) -> Result<Vec<HealthCheck>, FrameworkError> {
        let (controller, elapsed) = timed(self.controller_running(client)).await;
        let controller = controller.unwrap_or(false);

        let check = HealthCheck::new(
            "linkerd-control-plane",
            "linkerd",
            controller,
            if controller {
                "controller pods running".to_owned()
            } else {
                format!("no running pods matching {CONTROLLER_SELECTOR} in {LINKERD_NAMESPACE}")
            },
            elapsed,
        )
        .with_detail("namespace", LINKERD_NAMESPACE)
        .with_detail("selector", CONTROLLER_SELECTOR);

        Ok(vec![check])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn trust_domain_defaults_to_the_well_known_domain() {
        let options = parse_options(&json!({})).unwrap();
        assert_eq!(options.trust_domain, "cluster.local");
        assert!(options.enabled);
    }

    #[test]
    fn empty_trust_domain_is_rejected_when_enabled() {
        let provider = LinkerdConnectivity::new();
        let err = provider
            .validate_config(&json!({ "trustDomain": "  " }))
            .unwrap_err();
        assert!(err.to_string().contains("trust domain"));

        provider
            .validate_config(&json!({ "enabled": false, "trustDomain": "" }))
            .unwrap();
    }
}
