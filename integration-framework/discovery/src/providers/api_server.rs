use std::collections::BTreeMap;

use async_trait::async_trait;
use integration_framework_config::{
    ServiceDiscoveryKind,
    constants::{API_AGGREGATION_CONFIG_MAP, API_AGGREGATOR_NAME, SYSTEM_NAMESPACE},
};
use integration_framework_core::{
    ComponentState, FrameworkError, HealthCheck,
    health::timed,
    kubernetes::{
        apply, count_labeled, delete_labeled, delete_labeled_clusterwide,
    },
    labels::{discovery_labels, discovery_selector},
};
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Endpoints, Service, ServiceAccount},
    rbac::v1::{ClusterRole, ClusterRoleBinding},
};
use kube::Client;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    config::ServiceDiscoveryStatus,
    provider::ServiceDiscoveryProvider,
    workload::{DEFAULT_WORKLOAD_IMAGE, build_workload, deployment_ready, install_reader_rbac},
};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ApiServerOptions {
    clusters: Vec<String>,
    control_plane_url: String,
    replicas: i32,
    image: String,
}

impl Default for ApiServerOptions {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            control_plane_url: String::new(),
            replicas: 1,
            image: DEFAULT_WORKLOAD_IMAGE.to_owned(),
        }
    }
}

fn parse_options(config: &Value) -> Result<ApiServerOptions, FrameworkError> {
    ApiServerOptions::deserialize(config).map_err(|source| FrameworkError::ConfigParseFailed {
        message: "api-server discovery configuration is malformed".to_owned(),
        source: Some(Box::new(source)),
    })
}

/// Aggregated control-plane discovery: a reader workload with cluster-wide
/// RBAC that mirrors remote API servers into the local cluster.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApiServerDiscovery;

impl ApiServerDiscovery {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ServiceDiscoveryProvider for ApiServerDiscovery {
    fn kind(&self) -> ServiceDiscoveryKind {
        ServiceDiscoveryKind::ApiServer
    }

    fn validate_config(&self, config: &Value) -> Result<(), FrameworkError> {
        let options = parse_options(config)?;

        if options.clusters.is_empty() {
            return Err(FrameworkError::validation(
                "api-server discovery requires a non-empty cluster list",
            ));
        }
        if options.control_plane_url.is_empty() {
            return Err(FrameworkError::validation(
                "api-server discovery requires a control plane URL",
            ));
        }
        let url = Url::parse(&options.control_plane_url).map_err(|err| {
            FrameworkError::validation(format!(
                "control plane URL `{}` is malformed: {err}",
                options.control_plane_url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FrameworkError::validation(format!(
                "control plane URL `{url}` must use http or https"
            )));
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
        let labels = discovery_labels(ServiceDiscoveryKind::ApiServer.as_str());

        info!(
            clusters = options.clusters.len(),
            control_plane = %options.control_plane_url,
            "installing api-server discovery"
        );

        install_reader_rbac(client, SYSTEM_NAMESPACE, API_AGGREGATOR_NAME, labels.clone()).await?;

        let workload = build_workload(
            SYSTEM_NAMESPACE,
            API_AGGREGATOR_NAME,
            labels.clone(),
            &options.image,
            options.replicas,
            Some(API_AGGREGATOR_NAME),
        );
        apply(client, SYSTEM_NAMESPACE, &workload).await?;

        let mut data = BTreeMap::new();
        data.insert("clusters".to_owned(), options.clusters.join(","));
        data.insert("controlPlaneUrl".to_owned(), options.control_plane_url.clone());
        let setup = ConfigMap {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some(API_AGGREGATION_CONFIG_MAP.to_owned()),
                namespace: Some(SYSTEM_NAMESPACE.to_owned()),
                labels: Some(labels),
                ..Default::default()
            },
            data: Some(data),
            ..ConfigMap::default()
        };
        apply(client, SYSTEM_NAMESPACE, &setup).await?;

        info!("api-server discovery installed");
        Ok(())
    }

    async fn uninstall(
        &self,
        client: &Client,
        _cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let selector = discovery_selector(ServiceDiscoveryKind::ApiServer.as_str());
        info!(%selector, "uninstalling api-server discovery");

        delete_labeled::<Deployment>(client, SYSTEM_NAMESPACE, &selector).await?;
        delete_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;
        delete_labeled::<ServiceAccount>(client, SYSTEM_NAMESPACE, &selector).await?;
        delete_labeled_clusterwide::<ClusterRoleBinding>(client, &selector).await?;
        delete_labeled_clusterwide::<ClusterRole>(client, &selector).await?;
        Ok(())
    }

    async fn status(&self, client: &Client) -> Result<ServiceDiscoveryStatus, FrameworkError> {
        let selector = discovery_selector(ServiceDiscoveryKind::ApiServer.as_str());
        let config_maps = count_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;
        let services = count_labeled::<Service>(client, SYSTEM_NAMESPACE, &selector).await?;
        let endpoints = count_labeled::<Endpoints>(client, SYSTEM_NAMESPACE, &selector).await?;

        if config_maps == 0 {
            return Ok(ServiceDiscoveryStatus::not_configured(
                ServiceDiscoveryKind::ApiServer,
            ));
        }

        let ready = deployment_ready(client, SYSTEM_NAMESPACE, API_AGGREGATOR_NAME).await?;

        Ok(ServiceDiscoveryStatus {
            provider_type: ServiceDiscoveryKind::ApiServer,
            state: if ready {
                ComponentState::Configured
            } else {
                ComponentState::Degraded
            },
            healthy: ready,
            timestamp: OffsetDateTime::now_utc(),
            services,
            endpoints,
            error: (!ready).then(|| "api-server aggregator is not ready".to_owned()),
        })
    }

    async fn health_check(&self, client: &Client) -> Result<Vec<HealthCheck>, FrameworkError> {
        let (ready, elapsed) =
            timed(deployment_ready(client, SYSTEM_NAMESPACE, API_AGGREGATOR_NAME)).await;
        let ready = ready.unwrap_or(false);

        Ok(vec![
            HealthCheck::new(
                "api-server-aggregator",
                "api-server",
                ready,
                if ready {
                    "aggregator replicas ready".to_owned()
                } else {
                    "aggregator replicas not ready".to_owned()
                },
                elapsed,
            )
            .with_detail("deployment", API_AGGREGATOR_NAME)
            .with_detail("namespace", SYSTEM_NAMESPACE),
        ])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn validation_requires_clusters_and_url() {
        let provider = ApiServerDiscovery::new();
        assert!(provider.validate_config(&json!({})).is_err());
        assert!(
            provider
                .validate_config(&json!({ "clusters": ["east"] }))
                .is_err()
        );
        provider
            .validate_config(&json!({
                "clusters": ["east"],
                "controlPlaneUrl": "https://primary:6443"
            }))
            .unwrap();
    }

    #[test]
    fn validation_rejects_non_http_schemes() {
        let provider = ApiServerDiscovery::new();
        let err = provider
            .validate_config(&json!({
                "clusters": ["east"],
                "controlPlaneUrl": "ftp://primary:6443"
            }))
            .unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }
}
