use std::{collections::BTreeMap, sync::Arc};

use integration_framework_config::{ClusterConfig, ClusterTopology};
use integration_framework_core::{
    ClusterProvider, ErrorKind, FederationStatus, FrameworkError, NetworkStatus, OverallHealth,
    TopologyStatus,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    factory::{DefaultProviderFactory, ProviderFactory},
    resources::{SystemResourceInfo, apply_plan, discover_host_resources, plan_resources},
    wiring::configure_topology_networking,
};

/// Outcome of one remote creation task.
struct RemoteOutcome {
    key: String,
    cluster_name: String,
    result: Result<(), FrameworkError>,
}

/// Composes a primary cluster with N remotes: concurrent creation, ordered
/// teardown, partial-failure recovery, and host-resource budgeting.
///
/// `create` leaves the host in one of two states: every requested cluster
/// exists and is wired, or none of the clusters created by the call remain.
pub struct TopologyOrchestrator {
    factory: Arc<dyn ProviderFactory>,
    host_override: Option<SystemResourceInfo>,
}

impl Default for TopologyOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyOrchestrator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            factory: Arc::new(DefaultProviderFactory),
            host_override: None,
        }
    }

    /// Orchestrator over a custom provider factory (tests, embedders).
    #[must_use]
    pub fn with_factory(factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            factory,
            host_override: None,
        }
    }

    /// Pin the host measurement instead of discovering it per call.
    #[must_use]
    pub fn with_host_resources(mut self, host: SystemResourceInfo) -> Self {
        self.host_override = Some(host);
        self
    }

    fn provider_for(
        &self,
        config: &ClusterConfig,
    ) -> Result<Arc<dyn ClusterProvider>, FrameworkError> {
        self.factory.provider_for(config.provider_kind)
    }

    /// Create the whole topology; on any failure every cluster created by
    /// this call is removed again before the error is returned.
    pub async fn create(
        &self,
        topology: &ClusterTopology,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let started = std::time::Instant::now();
        topology
            .validate()
            .map_err(|err| FrameworkError::validation(err.to_string()))?;

        // Budget before anything touches the host.
        let mut planned = topology.clone();
        let host = self.host_override.unwrap_or_else(discover_host_resources);
        let plan = plan_resources(&host, planned.cluster_count());
        apply_plan(&mut planned, &host, &plan)?;

        info!(
            primary = %planned.primary.name,
            remotes = planned.remotes.len(),
            memory_per_cluster = %plan.memory_per_cluster,
            cpus_per_cluster = plan.cpus_per_cluster,
            "topology create starting"
        );

        // Primary first, synchronously; a failure here leaves nothing behind.
        let primary_provider = self.provider_for(&planned.primary)?;
        primary_provider.create(&planned.primary, cancel).await?;

        if let Err(err) = self.create_remotes(&planned, cancel).await {
            self.cleanup_after_failed_create(&planned).await;
            return Err(err);
        }

        // Networking failures degrade the topology but never fail the call;
        // the partial state stays observable through `status`.
        if let Err(err) = configure_topology_networking(self.factory.as_ref(), &planned, cancel).await
        {
            warn!(error = %err, "post-create network configuration failed; continuing");
        }

        info!(
            primary = %planned.primary.name,
            remotes = planned.remotes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "topology create finished"
        );
        Ok(())
    }

    /// Fan out one creation task per remote; first failure cancels siblings.
    ///
    /// Every dispatched task reports on the completion channel (success,
    /// failure, or cancelled) so this never deadlocks.
    async fn create_remotes(
        &self,
        topology: &ClusterTopology,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        if topology.remotes.is_empty() {
            return Ok(());
        }

        // Resolve every provider before the first task spawns, so a factory
        // failure cannot leave half-dispatched work behind.
        let mut dispatch = Vec::with_capacity(topology.remotes.len());
        for (key, config) in &topology.remotes {
            dispatch.push((key.clone(), config.clone(), self.provider_for(config)?));
        }

        let remote_cancel = cancel.child_token();
        let (completions, mut outcomes) = mpsc::channel(topology.remotes.len());

        for (key, config, provider) in dispatch {
            let token = remote_cancel.clone();
            let completions = completions.clone();

            tokio::spawn(async move {
                debug!(remote = %key, cluster = %config.name, "remote creation dispatched");
                let result = provider.create(&config, &token).await;
                let outcome = RemoteOutcome {
                    key,
                    cluster_name: config.name.clone(),
                    result,
                };
                // Receiver capacity equals the number of remotes; this send
                // cannot block.
                let _ = completions.send(outcome).await;
            });
        }
        drop(completions);

        let mut first_error: Option<FrameworkError> = None;
        let mut completed = 0_usize;
        while let Some(outcome) = outcomes.recv().await {
            completed += 1;
            match outcome.result {
                Ok(()) => {
                    info!(remote = %outcome.key, cluster = %outcome.cluster_name, "remote cluster created");
                }
                Err(err) => {
                    error!(
                        remote = %outcome.key,
                        cluster = %outcome.cluster_name,
                        error = %err,
                        "remote cluster creation failed"
                    );
                    if first_error.is_none() {
                        // Siblings observe the cancellation and report back.
                        remote_cancel.cancel();
                        first_error = Some(FrameworkError::cluster_create_failed(
                            &outcome.cluster_name,
                            format!("remote `{}` failed to create", outcome.key),
                            Some(Box::new(err)),
                        ));
                    }
                }
            }
        }
        debug_assert_eq!(completed, topology.remotes.len());

        match first_error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Best-effort removal of everything the failed create left behind.
    async fn cleanup_after_failed_create(&self, topology: &ClusterTopology) {
        warn!(
            primary = %topology.primary.name,
            "topology create failed; removing clusters created by this call"
        );

        let cleanup_cancel = CancellationToken::new();
        for config in topology.remotes.values() {
            self.delete_if_present(config, &cleanup_cancel).await;
        }
        self.delete_if_present(&topology.primary, &cleanup_cancel)
            .await;
    }

    async fn delete_if_present(&self, config: &ClusterConfig, cancel: &CancellationToken) {
        let provider = match self.provider_for(config) {
            Ok(provider) => provider,
            Err(err) => {
                error!(cluster = %config.name, error = %err, "no provider for cleanup");
                return;
            }
        };
        match provider.delete(&config.name, cancel).await {
            Ok(()) => info!(cluster = %config.name, "cleanup removed cluster"),
            Err(err) if err.kind() == ErrorKind::ClusterNotFound => {
                debug!(cluster = %config.name, "cleanup found nothing to remove");
            }
            Err(err) => error!(cluster = %config.name, error = %err, "cleanup failed to remove cluster"),
        }
    }

    /// Delete every remote concurrently, then always the primary; errors are
    /// collected, the first one is returned after all deletions ran.
    pub async fn delete(
        &self,
        topology: &ClusterTopology,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let started = std::time::Instant::now();
        info!(
            primary = %topology.primary.name,
            remotes = topology.remotes.len(),
            "topology delete starting"
        );

        let mut failures: Vec<FrameworkError> = Vec::new();

        if !topology.remotes.is_empty() {
            let (completions, mut outcomes) = mpsc::channel(topology.remotes.len());
            for (key, config) in &topology.remotes {
                // Cancellation stops new dispatches; already-dispatched
                // deletions run to completion on a detached token.
                if cancel.is_cancelled() {
                    warn!(remote = %key, "cancelled before dispatch; cluster deletion skipped");
                    continue;
                }
                let provider = match self.provider_for(config) {
                    Ok(provider) => provider,
                    Err(err) => {
                        failures.push(err);
                        continue;
                    }
                };
                let key = key.clone();
                let name = config.name.clone();
                let token = CancellationToken::new();
                let completions = completions.clone();

                tokio::spawn(async move {
                    let result = provider.delete(&name, &token).await;
                    let _ = completions
                        .send(RemoteOutcome {
                            key,
                            cluster_name: name,
                            result,
                        })
                        .await;
                });
            }
            drop(completions);

            while let Some(outcome) = outcomes.recv().await {
                match outcome.result {
                    Ok(()) => info!(remote = %outcome.key, cluster = %outcome.cluster_name, "remote cluster deleted"),
                    Err(err) if err.kind() == ErrorKind::ClusterNotFound => {
                        debug!(remote = %outcome.key, cluster = %outcome.cluster_name, "remote cluster already absent");
                    }
                    Err(err) => {
                        error!(remote = %outcome.key, cluster = %outcome.cluster_name, error = %err, "remote cluster deletion failed");
                        failures.push(err);
                    }
                }
            }
        }

        // The primary is attempted regardless of remote outcomes; once its
        // deletion is dispatched it runs to completion.
        if cancel.is_cancelled() {
            warn!(cluster = %topology.primary.name, "cancelled before dispatch; primary deletion skipped");
        } else {
            let primary_token = CancellationToken::new();
            match self.provider_for(&topology.primary) {
                Ok(provider) => {
                    match provider.delete(&topology.primary.name, &primary_token).await {
                        Ok(()) => info!(cluster = %topology.primary.name, "primary cluster deleted"),
                        Err(err) if err.kind() == ErrorKind::ClusterNotFound => {
                            debug!(cluster = %topology.primary.name, "primary cluster already absent");
                        }
                        Err(err) => {
                            error!(cluster = %topology.primary.name, error = %err, "primary cluster deletion failed");
                            failures.push(err);
                        }
                    }
                }
                Err(err) => failures.push(err),
            }
        }

        self.cleanup_orphaned(topology).await;

        info!(
            failures = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "topology delete finished"
        );
        match failures.into_iter().next() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Label-scoped garbage collection pass after deletion.
    ///
    /// TODO: sweep framework-labelled resources from clusters that survive a
    /// topology (shared host clusters); today every in-cluster resource dies
    /// with its cluster, so this only logs.
    async fn cleanup_orphaned(&self, topology: &ClusterTopology) {
        debug!(
            primary = %topology.primary.name,
            "label-scoped cleanup pass: nothing to sweep on dedicated clusters"
        );
    }

    /// Compose per-cluster statuses into the aggregate topology view.
    pub async fn status(
        &self,
        topology: &ClusterTopology,
    ) -> Result<TopologyStatus, FrameworkError> {
        let primary_provider = self.provider_for(&topology.primary)?;
        let primary = primary_provider.status(&topology.primary.name).await?;

        let mut remotes = BTreeMap::new();
        for (key, config) in &topology.remotes {
            let provider = self.provider_for(config)?;
            let status = provider.status(&config.name).await?;
            remotes.insert(key.clone(), status);
        }

        let healthy_count = std::iter::once(&primary)
            .chain(remotes.values())
            .filter(|status| status.healthy)
            .count();
        let total = 1 + remotes.len();

        let overall_health = if healthy_count == total {
            OverallHealth::Healthy
        } else if healthy_count == 0 {
            OverallHealth::Unhealthy
        } else {
            OverallHealth::Degraded
        };

        let network_status = if !topology.network.is_meaningful() {
            NetworkStatus::NotConfigured
        } else if healthy_count == total {
            NetworkStatus::Connected
        } else if healthy_count == 0 {
            NetworkStatus::Unhealthy
        } else {
            NetworkStatus::Degraded
        };

        let federation_status = if topology.federation.enabled {
            FederationStatus::Enabled
        } else {
            FederationStatus::Disabled
        };

        Ok(TopologyStatus {
            primary,
            remotes,
            overall_health,
            federation_status,
            network_status,
            error: None,
        })
    }
}
