use std::{fmt::Debug, path::PathBuf};

use k8s_openapi::{NamespaceResourceScope, api::core::v1::Node};
use kube::{
    Api, Client, Resource,
    api::{DeleteParams, ListParams, Patch, PatchParams},
    config::{KubeConfigOptions, Kubeconfig},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use integration_framework_config::constants::MANAGED_BY_VALUE;

use crate::{env, error::FrameworkError};

/// Node-level facts used to enrich provider status reports.
#[derive(Clone, Debug, Default)]
pub struct NodeSummary {
    pub nodes: u32,
    pub version: String,
    pub all_ready: bool,
}

/// Resolve the effective kubeconfig path.
///
/// `KUBECONFIG` wins when set and non-empty; otherwise the default user-home
/// credentials path. A path that does not exist yields `ConfigNotFound`.
pub fn kubeconfig_path() -> Result<PathBuf, FrameworkError> {
    let path = env::kubeconfig()
        .map(PathBuf::from)
        .or_else(|| env::home_dir().map(|home| home.join(".kube").join("config")));

    match path {
        Some(path) if path.exists() => Ok(path),
        Some(path) => Err(FrameworkError::ConfigNotFound { path }),
        None => Err(FrameworkError::ConfigNotFound {
            path: PathBuf::from("~/.kube/config"),
        }),
    }
}

/// Build a typed client from kubeconfig text, optionally pinning a context.
pub async fn client_from_kubeconfig(
    yaml: &str,
    context: Option<&str>,
) -> Result<Client, FrameworkError> {
    let kubeconfig = Kubeconfig::from_yaml(yaml).map_err(|source| {
        FrameworkError::ConfigParseFailed {
            message: "kubeconfig is not valid YAML".to_owned(),
            source: Some(Box::new(source)),
        }
    })?;

    let options = KubeConfigOptions {
        context: context.map(ToOwned::to_owned),
        ..KubeConfigOptions::default()
    };

    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|source| FrameworkError::ConfigParseFailed {
            message: "kubeconfig does not resolve to a usable context".to_owned(),
            source: Some(Box::new(source)),
        })?;

    Client::try_from(config).map_err(Into::into)
}

/// Count nodes and capture the kubelet version reported by the first one.
///
/// A successful listing doubles as the liveness probe after cluster creation.
pub async fn node_summary(client: &Client) -> Result<NodeSummary, FrameworkError> {
    let nodes: Api<Node> = Api::all(client.clone());
    let list = nodes.list(&ListParams::default()).await?;

    let version = list
        .items
        .first()
        .and_then(|node| node.status.as_ref())
        .and_then(|status| status.node_info.as_ref())
        .map(|info| info.kubelet_version.clone())
        .unwrap_or_default();

    let all_ready = !list.items.is_empty() && list.items.iter().all(node_is_ready);

    let summary = NodeSummary {
        nodes: list.items.len() as u32,
        version,
        all_ready,
    };
    debug!(
        nodes = summary.nodes,
        version = %summary.version,
        all_ready = summary.all_ready,
        "collected node summary"
    );

    Ok(summary)
}

/// Server-side apply with the framework as field manager; creates or updates.
pub async fn apply<K>(client: &Client, namespace: &str, resource: &K) -> Result<(), FrameworkError>
where
    K: Resource<Scope = NamespaceResourceScope> + Serialize + DeserializeOwned + Clone + Debug,
    <K as Resource>::DynamicType: Default,
{
    let name = resource
        .meta()
        .name
        .clone()
        .ok_or_else(|| FrameworkError::internal("resource to apply has no name"))?;
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    api.patch(
        &name,
        &PatchParams::apply(MANAGED_BY_VALUE).force(),
        &Patch::Apply(resource),
    )
    .await?;
    Ok(())
}

/// Cluster-scoped flavour of [`apply`].
pub async fn apply_clusterwide<K>(client: &Client, resource: &K) -> Result<(), FrameworkError>
where
    K: Resource + Serialize + DeserializeOwned + Clone + Debug,
    <K as Resource>::DynamicType: Default,
{
    let name = resource
        .meta()
        .name
        .clone()
        .ok_or_else(|| FrameworkError::internal("resource to apply has no name"))?;
    let api: Api<K> = Api::all(client.clone());
    api.patch(
        &name,
        &PatchParams::apply(MANAGED_BY_VALUE).force(),
        &Patch::Apply(resource),
    )
    .await?;
    Ok(())
}

/// Best-effort deletion of every labelled resource of one type.
///
/// A missing namespace (or resource type absence) is not an error.
pub async fn delete_labeled<K>(
    client: &Client,
    namespace: &str,
    selector: &str,
) -> Result<(), FrameworkError>
where
    K: Resource<Scope = NamespaceResourceScope> + DeserializeOwned + Clone + Debug,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    match api
        .delete_collection(
            &DeleteParams::default(),
            &ListParams::default().labels(selector),
        )
        .await
    {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Cluster-scoped flavour of [`delete_labeled`].
pub async fn delete_labeled_clusterwide<K>(
    client: &Client,
    selector: &str,
) -> Result<(), FrameworkError>
where
    K: Resource + DeserializeOwned + Clone + Debug,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::all(client.clone());
    match api
        .delete_collection(
            &DeleteParams::default(),
            &ListParams::default().labels(selector),
        )
        .await
    {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// List labelled resources of one type; absence (404) reads as empty.
pub async fn list_labeled<K>(
    client: &Client,
    namespace: &str,
    selector: &str,
) -> Result<Vec<K>, FrameworkError>
where
    K: Resource<Scope = NamespaceResourceScope> + DeserializeOwned + Clone + Debug,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    match api.list(&ListParams::default().labels(selector)).await {
        Ok(list) => Ok(list.items),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// Count labelled resources of one type.
pub async fn count_labeled<K>(
    client: &Client,
    namespace: &str,
    selector: &str,
) -> Result<u32, FrameworkError>
where
    K: Resource<Scope = NamespaceResourceScope> + DeserializeOwned + Clone + Debug,
    <K as Resource>::DynamicType: Default,
{
    Ok(list_labeled::<K>(client, namespace, selector).await?.len() as u32)
}

fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_kubeconfig_yaml() {
        let err = futures_executor(client_from_kubeconfig("{not yaml::", None));
        assert!(matches!(err, Err(FrameworkError::ConfigParseFailed { .. })));
    }

    fn futures_executor<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("test runtime")
            .block_on(fut)
    }
}
