use std::collections::BTreeMap;

use async_trait::async_trait;
use integration_framework_config::{
    ServiceDiscoveryKind,
    constants::{
        PROPAGATED_SERVICE_LABEL, PROPAGATION_CONFIG_MAP, PROPAGATION_STATE_MAP, PROPAGATOR_NAME,
        SYSTEM_NAMESPACE,
    },
};
use integration_framework_core::{
    ComponentState, FrameworkError, HealthCheck,
    health::timed,
    kubernetes::{
        apply, count_labeled, delete_labeled, delete_labeled_clusterwide, list_labeled,
    },
    labels::{discovery_labels, discovery_selector},
};
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Endpoints, Service, ServiceAccount},
    rbac::v1::{ClusterRole, ClusterRoleBinding},
};
use kube::{Api, Client, api::ListParams};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::ServiceDiscoveryStatus,
    provider::ServiceDiscoveryProvider,
    workload::{DEFAULT_WORKLOAD_IMAGE, build_workload, deployment_ready, install_reader_rbac},
};

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PropagationOptions {
    clusters: Vec<String>,
    sync_interval_secs: u64,
    image: String,
}

impl Default for PropagationOptions {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            sync_interval_secs: 30,
            image: DEFAULT_WORKLOAD_IMAGE.to_owned(),
        }
    }
}

fn parse_options(config: &Value) -> Result<PropagationOptions, FrameworkError> {
    PropagationOptions::deserialize(config).map_err(|source| FrameworkError::ConfigParseFailed {
        message: "propagation discovery configuration is malformed".to_owned(),
        source: Some(Box::new(source)),
    })
}

/// Propagated-services discovery: a propagator workload copies labelled
/// services between clusters and records its progress in a state config map.
#[derive(Clone, Copy, Debug, Default)]
pub struct PropagationDiscovery;

impl PropagationDiscovery {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn propagated_service_count(&self, client: &Client) -> Result<u32, FrameworkError> {
        let services: Api<Service> = Api::all(client.clone());
        let labelled = services
            .list(&ListParams::default().labels(&format!("{PROPAGATED_SERVICE_LABEL}=true")))
            .await?;
        Ok(labelled.items.len() as u32)
    }
}

#[async_trait]
impl ServiceDiscoveryProvider for PropagationDiscovery {
    fn kind(&self) -> ServiceDiscoveryKind {
        ServiceDiscoveryKind::Propagation
    }

    fn validate_config(&self, config: &Value) -> Result<(), FrameworkError> {
        let options = parse_options(config)?;
        if options.clusters.is_empty() {
            return Err(FrameworkError::validation(
                "propagation discovery requires a non-empty cluster list",
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
        let labels = discovery_labels(ServiceDiscoveryKind::Propagation.as_str());

        info!(
            clusters = options.clusters.len(),
            sync_interval_secs = options.sync_interval_secs,
            "installing propagation discovery"
        );

        install_reader_rbac(client, SYSTEM_NAMESPACE, PROPAGATOR_NAME, labels.clone()).await?;

        let workload = build_workload(
            SYSTEM_NAMESPACE,
            PROPAGATOR_NAME,
            labels.clone(),
            &options.image,
            1,
            Some(PROPAGATOR_NAME),
        );
        apply(client, SYSTEM_NAMESPACE, &workload).await?;

        let mut setup = BTreeMap::new();
        setup.insert("clusters".to_owned(), options.clusters.join(","));
        setup.insert(
            "syncIntervalSecs".to_owned(),
            options.sync_interval_secs.to_string(),
        );
        apply_map(client, PROPAGATION_CONFIG_MAP, labels.clone(), setup).await?;

        // Fresh install starts with an empty inventory.
        let mut state = BTreeMap::new();
        state.insert(
            "lastSync".to_owned(),
            OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
        );
        state.insert("propagatedServices".to_owned(), "[]".to_owned());
        apply_map(client, PROPAGATION_STATE_MAP, labels, state).await?;

        info!("propagation discovery installed");
        Ok(())
    }

    async fn uninstall(
        &self,
        client: &Client,
        _cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let selector = discovery_selector(ServiceDiscoveryKind::Propagation.as_str());
        info!(%selector, "uninstalling propagation discovery");

        delete_labeled::<Deployment>(client, SYSTEM_NAMESPACE, &selector).await?;
        delete_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;
        delete_labeled::<ServiceAccount>(client, SYSTEM_NAMESPACE, &selector).await?;
        delete_labeled_clusterwide::<ClusterRoleBinding>(client, &selector).await?;
        delete_labeled_clusterwide::<ClusterRole>(client, &selector).await?;
        Ok(())
    }

    async fn status(&self, client: &Client) -> Result<ServiceDiscoveryStatus, FrameworkError> {
        let selector = discovery_selector(ServiceDiscoveryKind::Propagation.as_str());
        let state_maps = list_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;
        let endpoints = count_labeled::<Endpoints>(client, SYSTEM_NAMESPACE, &selector).await?;

        if state_maps.is_empty() {
            return Ok(ServiceDiscoveryStatus::not_configured(
                ServiceDiscoveryKind::Propagation,
            ));
        }

        let has_state_map = state_maps
            .iter()
            .any(|map| map.metadata.name.as_deref() == Some(PROPAGATION_STATE_MAP));
        let propagated = self.propagated_service_count(client).await.unwrap_or(0);
        let healthy = has_state_map && propagated > 0;

        Ok(ServiceDiscoveryStatus {
            provider_type: ServiceDiscoveryKind::Propagation,
            state: if healthy {
                ComponentState::Configured
            } else {
                ComponentState::Degraded
            },
            healthy,
            timestamp: OffsetDateTime::now_utc(),
            services: propagated,
            endpoints,
            error: if !has_state_map {
                Some("propagation state config map is missing".to_owned())
            } else if propagated == 0 {
                Some("no propagated services found".to_owned())
            } else {
                None
            },
        })
    }

    async fn health_check(&self, client: &Client) -> Result<Vec<HealthCheck>, FrameworkError> {
        let (ready, elapsed) =
            timed(deployment_ready(client, SYSTEM_NAMESPACE, PROPAGATOR_NAME)).await;
        let ready = ready.unwrap_or(false);
        let workload_check = HealthCheck::new(
            "service-propagator",
            "propagation",
            ready,
            if ready {
                "propagator workload ready".to_owned()
            } else {
                "propagator workload not ready".to_owned()
            },
            elapsed,
        )
        .with_detail("deployment", PROPAGATOR_NAME);

        let (propagated, elapsed) = timed(self.propagated_service_count(client)).await;
        let propagated = propagated.unwrap_or(0);
        let sync_check = HealthCheck::new(
            "service-propagation-sync",
            "propagation",
            propagated > 0,
            if propagated > 0 {
                format!("{propagated} propagated services present")
            } else {
                "no propagated services found".to_owned()
            },
            elapsed,
        )
        .with_detail("label", format!("{PROPAGATED_SERVICE_LABEL}=true"))
        .with_detail("propagated", propagated.to_string());

        Ok(vec![workload_check, sync_check])
    }
}

async fn apply_map(
    client: &Client,
    name: &str,
    labels: BTreeMap<String, String>,
    data: BTreeMap<String, String>,
) -> Result<(), FrameworkError> {
    let config_map = ConfigMap {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(SYSTEM_NAMESPACE.to_owned()),
            labels: Some(labels),
            ..Default::default()
        },
        data: Some(data),
        ..ConfigMap::default()
    };
    apply(client, SYSTEM_NAMESPACE, &config_map).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn validation_requires_clusters() {
        let provider = PropagationDiscovery::new();
        let err = provider.validate_config(&json!({})).unwrap_err();
        assert!(err.to_string().contains("cluster list"));

        provider
            .validate_config(&json!({ "clusters": ["east", "west"] }))
            .unwrap();
    }

    #[test]
    fn defaults_keep_a_sane_sync_interval() {
        let options = parse_options(&json!({ "clusters": ["east"] })).unwrap();
        assert_eq!(options.sync_interval_secs, 30);
    }
}
