use integration_framework_config::{ClusterConfig, MemorySize, ProviderKind};
use integration_framework_core::{ClusterProvider, ClusterState, ErrorKind};
use integration_framework_provider_minikube::MinikubeProvider;
use tokio_util::sync::CancellationToken;

#[tokio::test]
#[ignore = "requires minikube and a running container runtime"]
async fn single_profile_lifecycle() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let provider = MinikubeProvider::new();
    let cancel = CancellationToken::new();
    let config = ClusterConfig::new("itf-smoke", ProviderKind::Minikube)
        .with_memory(MemorySize::from_gibibytes(2))
        .with_cpus(2);

    provider.create(&config, &cancel).await?;

    let status = provider.status("itf-smoke").await?;
    assert_eq!(status.state, ClusterState::Running);
    assert!(status.healthy);
    assert!(status.nodes >= 1);

    let kubeconfig = provider.kubeconfig("itf-smoke").await?;
    assert!(kubeconfig.contains("apiVersion"));

    provider.delete("itf-smoke", &cancel).await?;

    let err = provider.delete("itf-smoke", &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClusterNotFound);

    Ok(())
}
