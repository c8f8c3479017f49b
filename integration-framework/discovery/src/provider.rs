use async_trait::async_trait;
use integration_framework_config::ServiceDiscoveryKind;
use integration_framework_core::{FrameworkError, HealthCheck};
use kube::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceDiscoveryStatus;

/// Contract of one cross-cluster service-discovery mechanism.
///
/// Same shape as the connectivity contract: stateless providers, per-call
/// client, label-scoped ownership of every installed resource.
#[async_trait]
pub trait ServiceDiscoveryProvider: Send + Sync {
    fn kind(&self) -> ServiceDiscoveryKind;

    fn validate_config(&self, config: &Value) -> Result<(), FrameworkError>;

    async fn install(
        &self,
        client: &Client,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError>;

    async fn uninstall(
        &self,
        client: &Client,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError>;

    async fn status(&self, client: &Client) -> Result<ServiceDiscoveryStatus, FrameworkError>;

    async fn health_check(&self, client: &Client) -> Result<Vec<HealthCheck>, FrameworkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn ServiceDiscoveryProvider) {}
}
