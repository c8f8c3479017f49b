use std::collections::BTreeMap;

use async_trait::async_trait;
use integration_framework_config::{ServiceDiscoveryKind, constants::SYSTEM_NAMESPACE};
use integration_framework_core::{
    ComponentState, FrameworkError, HealthCheck,
    health::timed,
    kubernetes::{apply, count_labeled, delete_labeled},
    labels::{discovery_labels, discovery_selector},
};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Client;
use serde_json::Value;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{config::ServiceDiscoveryStatus, provider::ServiceDiscoveryProvider};

const MANUAL_CONFIG_MAP: &str = "manual-discovery-config";

/// Operator-managed discovery: the framework only persists the declared
/// configuration and reports whether it is present.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualDiscovery;

impl ManualDiscovery {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ServiceDiscoveryProvider for ManualDiscovery {
    fn kind(&self) -> ServiceDiscoveryKind {
        ServiceDiscoveryKind::Manual
    }

    fn validate_config(&self, config: &Value) -> Result<(), FrameworkError> {
        if config.is_null() {
            return Err(FrameworkError::validation(
                "manual discovery requires a configuration payload",
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

        let mut data = BTreeMap::new();
        data.insert(
            "config".to_owned(),
            serde_json::to_string_pretty(config).unwrap_or_else(|_| config.to_string()),
        );

        let config_map = ConfigMap {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some(MANUAL_CONFIG_MAP.to_owned()),
                namespace: Some(SYSTEM_NAMESPACE.to_owned()),
                labels: Some(discovery_labels(ServiceDiscoveryKind::Manual.as_str())),
                ..Default::default()
            },
            data: Some(data),
            ..ConfigMap::default()
        };

        info!("storing manual discovery configuration");
        apply(client, SYSTEM_NAMESPACE, &config_map).await
    }

    async fn uninstall(
        &self,
        client: &Client,
        _cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let selector = discovery_selector(ServiceDiscoveryKind::Manual.as_str());
        info!(%selector, "removing manual discovery configuration");
        delete_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await
    }

    async fn status(&self, client: &Client) -> Result<ServiceDiscoveryStatus, FrameworkError> {
        let selector = discovery_selector(ServiceDiscoveryKind::Manual.as_str());
        let stored = count_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;

        let mut status = ServiceDiscoveryStatus::not_configured(ServiceDiscoveryKind::Manual);
        if stored > 0 {
            status.state = ComponentState::Configured;
            status.healthy = true;
            status.timestamp = OffsetDateTime::now_utc();
        }
        Ok(status)
    }

    async fn health_check(&self, client: &Client) -> Result<Vec<HealthCheck>, FrameworkError> {
        let selector = discovery_selector(ServiceDiscoveryKind::Manual.as_str());
        let (stored, elapsed) =
            timed(count_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector)).await;
        let stored = stored.unwrap_or(0);

        Ok(vec![HealthCheck::new(
            "manual-discovery-config",
            "manual",
            stored > 0,
            if stored > 0 {
                "manual discovery configuration stored".to_owned()
            } else {
                "no manual discovery configuration stored".to_owned()
            },
            elapsed,
        )])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn any_non_null_config_is_accepted() {
        let provider = ManualDiscovery::new();
        assert!(provider.validate_config(&Value::Null).is_err());
        provider.validate_config(&json!({})).unwrap();
        provider.validate_config(&json!(42)).unwrap();
    }
}
