use async_trait::async_trait;
use integration_framework_core::{FrameworkError, HealthCheck};
use kube::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{ConnectivityKind, ConnectivityStatus};

/// Contract of one connectivity mechanism.
///
/// Providers are stateless; the target cluster's client is handed in per
/// call. Every resource a provider creates carries the framework label pair
/// plus its `connectivity-type` tag; uninstall and inventory see nothing
/// else.
#[async_trait]
pub trait ConnectivityProvider: Send + Sync {
    fn kind(&self) -> ConnectivityKind;

    /// Structural checks on the raw configuration; no cluster access.
    fn validate_config(&self, config: &Value) -> Result<(), FrameworkError>;

    /// Install the policy set into the cluster.
    async fn install(
        &self,
        client: &Client,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError>;

    /// Remove everything carrying this provider's label set; missing
    /// namespaces or resources are not errors.
    async fn uninstall(
        &self,
        client: &Client,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError>;

    /// Inventory by label; absence reads as `not_configured`.
    async fn status(&self, client: &Client) -> Result<ConnectivityStatus, FrameworkError>;

    /// Named probes with diagnostic detail.
    async fn health_check(&self, client: &Client) -> Result<Vec<HealthCheck>, FrameworkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn ConnectivityProvider) {}
}
