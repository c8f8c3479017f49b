use std::sync::Arc;

use integration_framework_config::{ClusterConfig, ClusterTopology, ProviderKind};
use integration_framework_connectivity::ConnectivityFramework;
use integration_framework_core::{
    ClusterStatus, FrameworkError, TopologyStatus, kubernetes::client_from_kubeconfig,
};
use integration_framework_discovery::ServiceDiscoveryFramework;
use tokio_util::sync::CancellationToken;

use crate::{
    factory::{DefaultProviderFactory, ProviderFactory},
    topology::TopologyOrchestrator,
};

/// Stable library surface for external callers: single-cluster lifecycle,
/// topology lifecycle, and provider-kind introspection.
///
/// Methods delegate without extra validation and cache nothing across calls.
pub struct IntegrationFramework {
    factory: Arc<dyn ProviderFactory>,
    orchestrator: TopologyOrchestrator,
}

impl Default for IntegrationFramework {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationFramework {
    #[must_use]
    pub fn new() -> Self {
        let factory: Arc<dyn ProviderFactory> = Arc::new(DefaultProviderFactory);
        Self {
            orchestrator: TopologyOrchestrator::with_factory(Arc::clone(&factory)),
            factory,
        }
    }

    /// Framework over a custom provider factory.
    #[must_use]
    pub fn with_factory(factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            orchestrator: TopologyOrchestrator::with_factory(Arc::clone(&factory)),
            factory,
        }
    }

    pub async fn create_cluster(
        &self,
        config: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        self.factory
            .provider_for(config.provider_kind)?
            .create(config, cancel)
            .await
    }

    pub async fn delete_cluster(
        &self,
        kind: ProviderKind,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        self.factory.provider_for(kind)?.delete(name, cancel).await
    }

    pub async fn cluster_status(
        &self,
        kind: ProviderKind,
        name: &str,
    ) -> Result<ClusterStatus, FrameworkError> {
        self.factory.provider_for(kind)?.status(name).await
    }

    pub async fn cluster_kubeconfig(
        &self,
        kind: ProviderKind,
        name: &str,
    ) -> Result<String, FrameworkError> {
        self.factory.provider_for(kind)?.kubeconfig(name).await
    }

    pub async fn list_clusters(
        &self,
        kind: ProviderKind,
    ) -> Result<Vec<ClusterStatus>, FrameworkError> {
        self.factory.provider_for(kind)?.list().await
    }

    pub async fn create_topology(
        &self,
        topology: &ClusterTopology,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        self.orchestrator.create(topology, cancel).await
    }

    pub async fn delete_topology(
        &self,
        topology: &ClusterTopology,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        self.orchestrator.delete(topology, cancel).await
    }

    pub async fn topology_status(
        &self,
        topology: &ClusterTopology,
    ) -> Result<TopologyStatus, FrameworkError> {
        self.orchestrator.status(topology).await
    }

    /// Connectivity plane bound to one cluster's credentials.
    pub async fn connectivity_plane(
        &self,
        kind: ProviderKind,
        name: &str,
    ) -> Result<ConnectivityFramework, FrameworkError> {
        let kubeconfig = self.cluster_kubeconfig(kind, name).await?;
        let client = client_from_kubeconfig(&kubeconfig, None).await?;
        Ok(ConnectivityFramework::new(client))
    }

    /// Service-discovery plane bound to one cluster's credentials.
    pub async fn discovery_plane(
        &self,
        kind: ProviderKind,
        name: &str,
    ) -> Result<ServiceDiscoveryFramework, FrameworkError> {
        let kubeconfig = self.cluster_kubeconfig(kind, name).await?;
        let client = client_from_kubeconfig(&kubeconfig, None).await?;
        Ok(ServiceDiscoveryFramework::new(client))
    }

    #[must_use]
    pub fn supported_providers(&self) -> Vec<ProviderKind> {
        self.factory.supported_kinds()
    }

    #[must_use]
    pub fn is_provider_supported(&self, kind: ProviderKind) -> bool {
        self.factory.is_supported(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_introspection() {
        let framework = IntegrationFramework::new();
        assert!(framework.is_provider_supported(ProviderKind::Kind));
        assert!(framework.is_provider_supported(ProviderKind::Minikube));
        assert!(!framework.is_provider_supported(ProviderKind::K3d));
        assert_eq!(framework.supported_providers().len(), 2);
    }
}
