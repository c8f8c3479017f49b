use std::collections::BTreeMap;

use async_trait::async_trait;
use integration_framework_core::{
    ComponentState, FrameworkError, HealthCheck,
    health::timed,
    kubernetes::{count_labeled, delete_labeled, list_labeled},
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

const ISTIO_NAMESPACE: &str = "istio-system";
const MESH_CONFIG_MAP: &str = "istio-mesh-config";
const TRAFFIC_CONFIG_MAP: &str = "istio-traffic-config";
const PILOT_SELECTOR: &str = "istio=pilot";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IstioOptions {
    mesh_id: Option<String>,
    discovery_selectors: Option<Vec<BTreeMap<String, String>>>,
    enable_auto_mtls: Option<bool>,
}

fn parse_options(config: &Value) -> Result<IstioOptions, FrameworkError> {
    IstioOptions::deserialize(config).map_err(|source| FrameworkError::ConfigParseFailed {
        message: "istio connectivity configuration is malformed".to_owned(),
        source: Some(Box::new(source)),
    })
}

/// Mesh-based connectivity driven through Istio's control plane namespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct IstioConnectivity;

impl IstioConnectivity {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn control_plane_running(&self, client: &Client) -> Result<bool, FrameworkError> {
        let namespaces: Api<Namespace> = Api::all(client.clone());
        if namespaces.get_opt(ISTIO_NAMESPACE).await?.is_none() {
            return Ok(false);
        }

        let pods: Api<Pod> = Api::namespaced(client.clone(), ISTIO_NAMESPACE);
        let pilot_pods = pods
            .list(&ListParams::default().labels(PILOT_SELECTOR))
            .await?;

        let running = !pilot_pods.items.is_empty()
            && pilot_pods.items.iter().all(|pod| {
                pod.status
                    .as_ref()
                    .and_then(|status| status.phase.as_deref())
                    == Some("Running")
            });

        debug!(
            pods = pilot_pods.items.len(),
            running, "inspected istio pilot pods"
        );
        Ok(running)
    }
}

#[async_trait]
impl ConnectivityProvider for IstioConnectivity {
    fn kind(&self) -> ConnectivityKind {
        ConnectivityKind::Istio
    }

    fn validate_config(&self, config: &Value) -> Result<(), FrameworkError> {
        let options = parse_options(config)?;

        if let Some(selectors) = &options.discovery_selectors {
            if selectors.iter().any(BTreeMap::is_empty) {
                return Err(FrameworkError::validation(
                    "istio discovery selectors must be non-empty maps",
                ));
            }
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
        let labels = connectivity_labels(ConnectivityKind::Istio.as_str());

        info!(
            mesh_id = options.mesh_id.as_deref().unwrap_or("default"),
            "installing istio connectivity config"
        );

        let mut mesh_data = BTreeMap::new();
        mesh_data.insert(
            "meshId".to_owned(),
            options.mesh_id.clone().unwrap_or_else(|| "default".to_owned()),
        );
        mesh_data.insert(
            "autoMtls".to_owned(),
            options.enable_auto_mtls.unwrap_or(true).to_string(),
        );
        if let Some(selectors) = &options.discovery_selectors {
            mesh_data.insert(
                "discoverySelectors".to_owned(),
                serde_json::to_string(selectors).unwrap_or_default(),
            );
        }
        apply_config_map(client, ISTIO_NAMESPACE, MESH_CONFIG_MAP, labels.clone(), mesh_data)
            .await?;

        let mut traffic_data = BTreeMap::new();
        traffic_data.insert("outboundTrafficPolicy".to_owned(), "ALLOW_ANY".to_owned());
        traffic_data.insert("crossClusterEnabled".to_owned(), "true".to_owned());
        apply_config_map(
            client,
            ISTIO_NAMESPACE,
            TRAFFIC_CONFIG_MAP,
            labels,
            traffic_data,
        )
        .await?;

        info!("istio connectivity config installed");
        Ok(())
    }

    async fn uninstall(
        &self,
        client: &Client,
        _cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let selector = connectivity_selector(ConnectivityKind::Istio.as_str());
        info!(%selector, "uninstalling istio connectivity config");
        delete_labeled::<ConfigMap>(client, ISTIO_NAMESPACE, &selector).await
    }

    async fn status(&self, client: &Client) -> Result<ConnectivityStatus, FrameworkError> {
        let selector = connectivity_selector(ConnectivityKind::Istio.as_str());
        let config_maps = count_labeled::<ConfigMap>(client, ISTIO_NAMESPACE, &selector).await?;
        let services = count_labeled::<Service>(client, ISTIO_NAMESPACE, &selector).await?;
        let endpoints = count_labeled::<Endpoints>(client, ISTIO_NAMESPACE, &selector).await?;

        if config_maps == 0 {
            return Ok(ConnectivityStatus::not_configured(ConnectivityKind::Istio));
        }

        let control_plane = match self.control_plane_running(client).await {
            Ok(running) => running,
            Err(err) => {
                warn!(error = %err, "could not inspect istio control plane");
                false
            }
        };

        Ok(ConnectivityStatus {
            provider_type: ConnectivityKind::Istio,
            state: if control_plane {
                ComponentState::Configured
            } else {
                ComponentState::Degraded
            },
            healthy: control_plane,
            timestamp: OffsetDateTime::now_utc(),
            policies: config_maps,
            services,
            endpoints,
            error: (!control_plane)
                .then(|| "istio control plane pods are not running".to_owned()),
        })
    }

    async fn health_check(&self, client: &Client) -> Result<Vec<HealthCheck>, FrameworkError> {
        let (control_plane, elapsed) = timed(self.control_plane_running(client)).await;
        let control_plane = control_plane.unwrap_or(false);
        let pilot_check = HealthCheck::new(
            "istio-control-plane",
            "istio",
            control_plane,
            if control_plane {
                "pilot pods running".to_owned()
            } else {
                format!("no running pods matching {PILOT_SELECTOR} in {ISTIO_NAMESPACE}")
            },
            elapsed,
        )
        .with_detail("namespace", ISTIO_NAMESPACE)
        .with_detail("selector", PILOT_SELECTOR);

        let selector = connectivity_selector(ConnectivityKind::Istio.as_str());
        let (maps, elapsed) =
            timed(list_labeled::<ConfigMap>(client, ISTIO_NAMESPACE, &selector)).await;
        let names: Vec<String> = maps
            .unwrap_or_default()
            .into_iter()
            .filter_map(|map| map.metadata.name)
            .collect();
        let config_check = HealthCheck::new(
            "istio-mesh-config",
            "istio",
            names.iter().any(|name| name == MESH_CONFIG_MAP),
            format!("labelled config maps: {names:?}"),
            elapsed,
        );

        Ok(vec![pilot_check, config_check])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_discovery_selector_maps_are_rejected() {
        let provider = IstioConnectivity::new();
        let err = provider
            .validate_config(&json!({ "discoverySelectors": [{}] }))
            .unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn absent_selectors_are_fine() {
        let provider = IstioConnectivity::new();
        provider.validate_config(&json!({})).unwrap();
        provider
            .validate_config(&json!({ "discoverySelectors": [{"kubernetes.io/metadata.name": "apps"}] }))
            .unwrap();
    }
}
