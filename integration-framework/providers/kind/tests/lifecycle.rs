use integration_framework_config::{ClusterConfig, ProviderKind};
use integration_framework_core::{ClusterProvider, ClusterState, ErrorKind};
use integration_framework_provider_kind::KindProvider;
use tokio_util::sync::CancellationToken;

#[tokio::test]
#[ignore = "requires kind and a running container runtime"]
async fn single_cluster_lifecycle() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let provider = KindProvider::new();
    let cancel = CancellationToken::new();
    let config = ClusterConfig::new("t1", ProviderKind::Kind)
        .with_version("1.27.0")
        .with_nodes(1);

    provider.create(&config, &cancel).await?;

    let status = provider.status("t1").await?;
    assert_eq!(status.state, ClusterState::Running);
    assert!(status.healthy);
    assert_eq!(status.nodes, 1);

    // A second create of the same name must refuse.
    let err = provider.create(&config, &cancel).await.unwrap_err();
    assert!(err.to_string().contains("already exists"));

    provider.delete("t1", &cancel).await?;

    let status = provider.status("t1").await?;
    assert_eq!(status.state, ClusterState::NotFound);

    // Delete is idempotent in effect; the second call reports the absence.
    let err = provider.delete("t1", &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClusterNotFound);

    Ok(())
}
