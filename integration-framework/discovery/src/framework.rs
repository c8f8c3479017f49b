use std::collections::BTreeMap;

use integration_framework_config::ServiceDiscoveryKind;
use integration_framework_core::{FrameworkError, HealthCheck};
use kube::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    config::ServiceDiscoveryStatus,
    provider::ServiceDiscoveryProvider,
    providers::{ApiServerDiscovery, DnsDiscovery, ManualDiscovery, PropagationDiscovery},
};

/// Registry and dispatch point for the service-discovery plane of one
/// cluster.
pub struct ServiceDiscoveryFramework {
    client: Client,
    providers: BTreeMap<ServiceDiscoveryKind, Box<dyn ServiceDiscoveryProvider>>,
}

impl ServiceDiscoveryFramework {
    /// Framework with the four built-in mechanisms registered.
    #[must_use]
    pub fn new(client: Client) -> Self {
        let mut framework = Self {
            client,
            providers: BTreeMap::new(),
        };
        framework.register(Box::new(DnsDiscovery::new()));
        framework.register(Box::new(ApiServerDiscovery::new()));
        framework.register(Box::new(PropagationDiscovery::new()));
        framework.register(Box::new(ManualDiscovery::new()));
        framework
    }

    pub fn register(&mut self, provider: Box<dyn ServiceDiscoveryProvider>) {
        debug!(kind = %provider.kind(), "registering discovery provider");
        self.providers.insert(provider.kind(), provider);
    }

    #[must_use]
    pub fn registered_kinds(&self) -> Vec<ServiceDiscoveryKind> {
        self.providers.keys().copied().collect()
    }

    fn provider(
        &self,
        kind: ServiceDiscoveryKind,
    ) -> Result<&dyn ServiceDiscoveryProvider, FrameworkError> {
        if !kind.is_set() {
            return Err(FrameworkError::invalid_parameter(
                "discovery kind",
                "discovery type is not set",
            ));
        }
        self.providers
            .get(&kind)
            .map(AsRef::as_ref)
            .ok_or_else(|| {
                FrameworkError::invalid_parameter(
                    "discovery kind",
                    format!("no provider registered for `{kind}`"),
                )
            })
    }

    pub fn validate(
        &self,
        kind: ServiceDiscoveryKind,
        config: &Value,
    ) -> Result<(), FrameworkError> {
        self.provider(kind)?.validate_config(config)
    }

    pub async fn install(
        &self,
        kind: ServiceDiscoveryKind,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let provider = self.provider(kind)?;
        provider.validate_config(config)?;
        let started = std::time::Instant::now();
        info!(%kind, "discovery install starting");
        provider.install(&self.client, config, cancel).await?;
        info!(%kind, elapsed_ms = started.elapsed().as_millis() as u64, "discovery install finished");
        Ok(())
    }

    pub async fn uninstall(
        &self,
        kind: ServiceDiscoveryKind,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let started = std::time::Instant::now();
        info!(%kind, "discovery uninstall starting");
        self.provider(kind)?.uninstall(&self.client, cancel).await?;
        info!(%kind, elapsed_ms = started.elapsed().as_millis() as u64, "discovery uninstall finished");
        Ok(())
    }

    pub async fn status(
        &self,
        kind: ServiceDiscoveryKind,
    ) -> Result<ServiceDiscoveryStatus, FrameworkError> {
        self.provider(kind)?.status(&self.client).await
    }

    pub async fn health_check(
        &self,
        kind: ServiceDiscoveryKind,
    ) -> Result<Vec<HealthCheck>, FrameworkError> {
        self.provider(kind)?.health_check(&self.client).await
    }
}
