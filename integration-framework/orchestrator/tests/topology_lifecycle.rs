use std::{
    collections::{BTreeSet, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use integration_framework_config::{ClusterConfig, ClusterTopology, ProviderKind};
use integration_framework_core::{
    ClusterProvider, ClusterState, ClusterStatus, ErrorKind, FrameworkError, OverallHealth,
};
use integration_framework_config::MemorySize;
use integration_framework_orchestrator::{
    ProviderFactory, SystemResourceInfo, TopologyOrchestrator,
};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// In-memory provider: clusters are entries in a shared set, creation can be
/// slowed down or forced to fail per cluster name.
#[derive(Clone, Default)]
struct MockProvider {
    clusters: Arc<Mutex<BTreeSet<String>>>,
    fail_on: Arc<HashSet<String>>,
    create_delay: Duration,
}

impl MockProvider {
    fn new() -> Self {
        Self::default()
    }

    fn failing_on(names: &[&str]) -> Self {
        Self {
            fail_on: Arc::new(names.iter().map(ToString::to_string).collect()),
            create_delay: Duration::from_millis(200),
            ..Self::default()
        }
    }

    fn cluster_names(&self) -> Vec<String> {
        self.clusters.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl ClusterProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kind
    }

    fn supported_drivers(&self) -> &'static [&'static str] {
        &["docker"]
    }

    async fn check_tool(&self, _cancel: &CancellationToken) -> Result<(), FrameworkError> {
        Ok(())
    }

    async fn create(
        &self,
        config: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        if self.fail_on.contains(&config.name) {
            sleep(Duration::from_millis(10)).await;
            return Err(FrameworkError::cluster_create_failed(
                &config.name,
                format!("cluster `{}` already exists", config.name),
                None,
            ));
        }

        tokio::select! {
            () = sleep(self.create_delay) => {
                self.clusters.lock().unwrap().insert(config.name.clone());
                Ok(())
            }
            () = cancel.cancelled() => {
                Err(FrameworkError::cancelled("mock cluster create"))
            }
        }
    }

    async fn delete(&self, name: &str, _cancel: &CancellationToken) -> Result<(), FrameworkError> {
        if self.clusters.lock().unwrap().remove(name) {
            Ok(())
        } else {
            Err(FrameworkError::ClusterNotFound {
                cluster: name.to_owned(),
            })
        }
    }

    async fn status(&self, name: &str) -> Result<ClusterStatus, FrameworkError> {
        if self.clusters.lock().unwrap().contains(name) {
            Ok(ClusterStatus {
                name: name.to_owned(),
                provider_kind: ProviderKind::Kind,
                state: ClusterState::Running,
                healthy: true,
                nodes: 1,
                version: "v1.27.0".to_owned(),
                error: None,
            })
        } else {
            Ok(ClusterStatus::not_found(name, ProviderKind::Kind))
        }
    }

    async fn kubeconfig(&self, name: &str) -> Result<String, FrameworkError> {
        // Wiring treats a missing client as a tolerated failure; the mock
        // has no API server to hand out credentials for.
        Err(FrameworkError::internal(format!(
            "mock cluster `{name}` has no kubeconfig"
        )))
    }

    async fn list(&self) -> Result<Vec<ClusterStatus>, FrameworkError> {
        let names = self.cluster_names();
        let mut statuses = Vec::with_capacity(names.len());
        for name in names {
            statuses.push(self.status(&name).await?);
        }
        Ok(statuses)
    }
}

struct MockFactory {
    provider: MockProvider,
}

impl ProviderFactory for MockFactory {
    fn provider_for(
        &self,
        _kind: ProviderKind,
    ) -> Result<Arc<dyn ClusterProvider>, FrameworkError> {
        Ok(Arc::new(self.provider.clone()))
    }

    fn supported_kinds(&self) -> Vec<ProviderKind> {
        vec![ProviderKind::Kind]
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn orchestrator_over(provider: &MockProvider) -> TopologyOrchestrator {
    init_tracing();
    // Pinned host measurement keeps the budget step deterministic across
    // machines running the suite.
    TopologyOrchestrator::with_factory(Arc::new(MockFactory {
        provider: provider.clone(),
    }))
    .with_host_resources(SystemResourceInfo {
        total_memory: MemorySize::from_gibibytes(32),
        available_memory: MemorySize::from_gibibytes(24),
        total_cpus: 8,
    })
}

fn three_remote_topology() -> ClusterTopology {
    ClusterTopology::single(ClusterConfig::new("p", ProviderKind::Kind))
        .with_remote("east", ClusterConfig::new("r1", ProviderKind::Kind))
        .with_remote("west", ClusterConfig::new("r2", ProviderKind::Kind))
        .with_remote("south", ClusterConfig::new("r3", ProviderKind::Kind))
}

#[tokio::test]
async fn create_brings_up_every_cluster() {
    let provider = MockProvider::new();
    let orchestrator = orchestrator_over(&provider);

    orchestrator
        .create(&three_remote_topology(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(provider.cluster_names(), vec!["p", "r1", "r2", "r3"]);

    let status = orchestrator
        .status(&three_remote_topology())
        .await
        .unwrap();
    assert_eq!(status.overall_health, OverallHealth::Healthy);
    assert!(status.primary.healthy);
    assert_eq!(status.remotes.len(), 3);
}

#[tokio::test]
async fn duplicate_names_fail_before_any_cluster_is_touched() {
    let provider = MockProvider::new();
    let orchestrator = orchestrator_over(&provider);

    let topology = ClusterTopology::single(ClusterConfig::new("p", ProviderKind::Kind))
        .with_remote("a", ClusterConfig::new("p", ProviderKind::Kind))
        .with_remote("b", ClusterConfig::new("r", ProviderKind::Kind))
        .with_remote("c", ClusterConfig::new("r", ProviderKind::Kind));

    let err = orchestrator
        .create(&topology, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(provider.cluster_names().is_empty());
}

#[tokio::test]
async fn failing_remote_rolls_back_the_whole_topology() {
    let provider = MockProvider::failing_on(&["r2"]);
    let orchestrator = orchestrator_over(&provider);

    let err = orchestrator
        .create(&three_remote_topology(), &CancellationToken::new())
        .await
        .unwrap_err();

    // The surfaced error names the failing remote.
    assert_eq!(err.kind(), ErrorKind::ClusterCreateFailed);
    assert!(format!("{err:?}").contains("r2"));

    // No cluster created by this call survives the cleanup path.
    assert!(
        provider.cluster_names().is_empty(),
        "expected rollback to remove every cluster, found {:?}",
        provider.cluster_names()
    );
}

#[tokio::test]
async fn delete_is_idempotent_in_effect() {
    let provider = MockProvider::new();
    let orchestrator = orchestrator_over(&provider);
    let topology = three_remote_topology();

    orchestrator
        .create(&topology, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(provider.cluster_names().len(), 4);

    orchestrator
        .delete(&topology, &CancellationToken::new())
        .await
        .unwrap();
    assert!(provider.cluster_names().is_empty());

    // A second delete finds nothing and still succeeds.
    orchestrator
        .delete(&topology, &CancellationToken::new())
        .await
        .unwrap();
    assert!(provider.cluster_names().is_empty());
}

#[tokio::test]
async fn status_degrades_when_a_cluster_is_missing() {
    let provider = MockProvider::new();
    let orchestrator = orchestrator_over(&provider);
    let topology = three_remote_topology();

    orchestrator
        .create(&topology, &CancellationToken::new())
        .await
        .unwrap();

    // Remove one remote behind the orchestrator's back.
    provider.clusters.lock().unwrap().remove("r1");

    let status = orchestrator.status(&topology).await.unwrap();
    assert_eq!(status.overall_health, OverallHealth::Degraded);
    assert_eq!(status.remotes["east"].state, ClusterState::NotFound);
}
