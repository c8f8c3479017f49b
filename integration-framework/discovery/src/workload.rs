use std::collections::BTreeMap;

use integration_framework_core::{
    FrameworkError,
    kubernetes::{apply, apply_clusterwide},
};
use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{Container, PodSpec, PodTemplateSpec, ServiceAccount},
        rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};
use kube::{Api, Client};
use tracing::debug;

/// Long-running image for discovery workloads whose only job is to exist and
/// report ready.
pub const DEFAULT_WORKLOAD_IMAGE: &str = "registry.k8s.io/pause:3.9";

/// Build a labelled single-container deployment.
#[must_use]
pub fn build_workload(
    namespace: &str,
    name: &str,
    labels: BTreeMap<String, String>,
    image: &str,
    replicas: i32,
    service_account: Option<&str>,
) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: service_account.map(ToOwned::to_owned),
                    containers: vec![Container {
                        name: name.to_owned(),
                        image: Some(image.to_owned()),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

/// Service account + cluster-scoped read role + binding for a discovery
/// workload that watches core resources and CRDs across the cluster.
pub async fn install_reader_rbac(
    client: &Client,
    namespace: &str,
    name: &str,
    labels: BTreeMap<String, String>,
) -> Result<(), FrameworkError> {
    let account = ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        ..ServiceAccount::default()
    };
    apply(client, namespace, &account).await?;

    let role = ClusterRole {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        rules: Some(vec![
            PolicyRule {
                api_groups: Some(vec![String::new()]),
                resources: Some(vec![
                    "services".to_owned(),
                    "endpoints".to_owned(),
                    "pods".to_owned(),
                    "namespaces".to_owned(),
                    "configmaps".to_owned(),
                ]),
                verbs: vec!["get".to_owned(), "list".to_owned(), "watch".to_owned()],
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec!["apiextensions.k8s.io".to_owned()]),
                resources: Some(vec!["customresourcedefinitions".to_owned()]),
                verbs: vec!["get".to_owned(), "list".to_owned(), "watch".to_owned()],
                ..PolicyRule::default()
            },
        ]),
        ..ClusterRole::default()
    };
    apply_clusterwide(client, &role).await?;

    let binding = ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_owned(),
            kind: "ClusterRole".to_owned(),
            name: name.to_owned(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_owned(),
            name: name.to_owned(),
            namespace: Some(namespace.to_owned()),
            ..Subject::default()
        }]),
    };
    apply_clusterwide(client, &binding).await?;

    debug!(namespace, name, "installed reader rbac");
    Ok(())
}

/// Ready iff the deployment's ready replicas match its declared replicas and
/// at least one replica is up.
pub async fn deployment_ready(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<bool, FrameworkError> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let Some(deployment) = deployments.get_opt(name).await? else {
        return Ok(false);
    };

    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let ready = deployment
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0);

    Ok(ready >= desired && ready > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_carries_labels_on_selector_and_template() {
        let labels = BTreeMap::from([("discovery-type".to_owned(), "dns".to_owned())]);
        let deployment = build_workload(
            "kube-system",
            "dns-discovery",
            labels.clone(),
            DEFAULT_WORKLOAD_IMAGE,
            2,
            None,
        );

        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(2));
        assert_eq!(spec.selector.match_labels, Some(labels.clone()));
        assert_eq!(spec.template.metadata.unwrap().labels, Some(labels));
    }

    #[test]
    fn workload_sets_the_service_account_when_given() {
        let deployment = build_workload(
            "kube-system",
            "api-server-aggregator",
            BTreeMap::new(),
            DEFAULT_WORKLOAD_IMAGE,
            1,
            Some("api-server-aggregator"),
        );
        let pod_spec = deployment.spec.unwrap().template.spec.unwrap();
        assert_eq!(
            pod_spec.service_account_name.as_deref(),
            Some("api-server-aggregator")
        );
    }
}
