use async_trait::async_trait;
use integration_framework_config::{ClusterConfig, ProviderKind};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{error::FrameworkError, status::ClusterStatus};

/// Contract every cluster runtime implements.
///
/// Providers are stateless and reentrant; a `ClusterConfig` is owned by at
/// most one provider instance while being acted upon. Long-running
/// operations observe the cancellation token; short queries may ignore it
/// between syscalls.
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Which runtime this provider drives.
    fn kind(&self) -> ProviderKind;

    /// Drivers accepted in `ClusterConfig.options.driver`.
    fn supported_drivers(&self) -> &'static [&'static str];

    /// Verify the backing CLI tool is present and answers.
    async fn check_tool(&self, cancel: &CancellationToken) -> Result<(), FrameworkError>;

    /// Create the cluster and return only once it passes a liveness probe.
    ///
    /// Fails with `ClusterCreateFailed` when the name pre-exists, the tool is
    /// absent, the driver is unsupported, or resources are exhausted.
    async fn create(
        &self,
        config: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError>;

    /// Remove the cluster; `ClusterNotFound` when the name is unknown.
    async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<(), FrameworkError>;

    /// Interrogate one cluster. A missing cluster is reported as
    /// `state = not_found, healthy = false`, never as an error.
    async fn status(&self, name: &str) -> Result<ClusterStatus, FrameworkError>;

    /// Credentials sufficient to build a typed client for the cluster.
    async fn kubeconfig(&self, name: &str) -> Result<String, FrameworkError>;

    /// All clusters this provider can see on the host; per-cluster status
    /// errors are embedded inline rather than propagated.
    async fn list(&self) -> Result<Vec<ClusterStatus>, FrameworkError>;

    /// Enable the provider's ingress add-on for a cluster, where one exists.
    async fn enable_ingress(
        &self,
        name: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        debug!(
            cluster = name,
            provider = %self.kind(),
            "provider has no ingress add-on; skipping"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn ClusterProvider) {}
}
