use std::collections::BTreeMap;

use async_trait::async_trait;
use integration_framework_config::constants::SYSTEM_NAMESPACE;
use integration_framework_core::{
    ComponentState, FrameworkError, HealthCheck,
    health::timed,
    kubernetes::{count_labeled, delete_labeled, list_labeled},
    labels::{connectivity_labels, connectivity_selector},
};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Client;
use serde_json::Value;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::{ConnectivityKind, ConnectivityStatus},
    helpers::apply_config_map,
    provider::ConnectivityProvider,
};

/// Escape hatch: stores the raw configuration verbatim under the manual
/// label; the operator wires connectivity out of band.
///
/// The stored form is pretty-printed JSON. It happens to parse back, but
/// nothing in the framework relies on that.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualConnectivity;

impl ManualConnectivity {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectivityProvider for ManualConnectivity {
    fn kind(&self) -> ConnectivityKind {
        ConnectivityKind::Manual
    }

    fn validate_config(&self, config: &Value) -> Result<(), FrameworkError> {
        if config.is_null() {
            return Err(FrameworkError::validation(
                "manual connectivity requires a configuration payload",
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
        let selector = connectivity_selector(ConnectivityKind::Manual.as_str());

        let existing = count_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;
        let name = format!("manual-config-{}", existing + 1);

        let mut data = BTreeMap::new();
        data.insert(
            "config".to_owned(),
            serde_json::to_string_pretty(config).unwrap_or_else(|_| config.to_string()),
        );

        info!(%name, "storing manual connectivity configuration");
        apply_config_map(
            client,
            SYSTEM_NAMESPACE,
            &name,
            connectivity_labels(ConnectivityKind::Manual.as_str()),
            data,
        )
        .await
    }

    async fn uninstall(
        &self,
        client: &Client,
        _cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let selector = connectivity_selector(ConnectivityKind::Manual.as_str());
        info!(%selector, "removing manual connectivity configuration");
        delete_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await
    }

    async fn status(&self, client: &Client) -> Result<ConnectivityStatus, FrameworkError> {
        let selector = connectivity_selector(ConnectivityKind::Manual.as_str());
        let stored = count_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector).await?;

        let mut status = ConnectivityStatus::not_configured(ConnectivityKind::Manual);
        if stored > 0 {
            status.state = ComponentState::Configured;
            status.healthy = true;
            status.policies = stored;
            status.timestamp = OffsetDateTime::now_utc();
        }
        Ok(status)
    }

    async fn health_check(&self, client: &Client) -> Result<Vec<HealthCheck>, FrameworkError> {
        let selector = connectivity_selector(ConnectivityKind::Manual.as_str());
        let (maps, elapsed) =
            timed(list_labeled::<ConfigMap>(client, SYSTEM_NAMESPACE, &selector)).await;
        let names: Vec<String> = maps
            .unwrap_or_default()
            .into_iter()
            .filter_map(|map| map.metadata.name)
            .collect();

        Ok(vec![
            HealthCheck::new(
                "manual-config",
                "manual",
                !names.is_empty(),
                if names.is_empty() {
                    "no stored manual configuration".to_owned()
                } else {
                    format!("stored configurations: {names:?}")
                },
                elapsed,
            )
            .with_detail("namespace", SYSTEM_NAMESPACE),
        ])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn null_config_is_rejected() {
        let provider = ManualConnectivity::new();
        assert!(provider.validate_config(&Value::Null).is_err());
        provider.validate_config(&json!({"anything": true})).unwrap();
        provider.validate_config(&json!("even a string")).unwrap();
    }
}
