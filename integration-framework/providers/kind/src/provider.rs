use std::{io::Write as _, time::Duration};

use async_trait::async_trait;
use integration_framework_config::{ClusterConfig, ProviderKind};
use integration_framework_core::{
    ClusterProvider, ClusterState, ClusterStatus, FrameworkError,
    command::{run_tool, run_tool_stdout},
    kubernetes::{client_from_kubeconfig, node_summary},
};
use tokio::{process::Command, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::render_cluster_spec;

const KIND_DRIVERS: &[&str] = &["docker", "podman", "nerdctl"];

const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const READY_POLL_ATTEMPTS: u32 = 90;

/// Drives clusters whose nodes run as containers under the `kind` CLI.
#[derive(Clone, Copy, Debug, Default)]
pub struct KindProvider;

impl KindProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn existing_clusters(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, FrameworkError> {
        let mut command = Command::new("kind");
        command.arg("get").arg("clusters");

        let stdout = run_tool_stdout(command, "kind get clusters", cancel).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    async fn wait_for_ready(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let kubeconfig = self.kubeconfig(name).await?;
        let client = client_from_kubeconfig(&kubeconfig, None).await?;

        for attempt in 0..READY_POLL_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(FrameworkError::cancelled("kind liveness probe"));
            }

            match node_summary(&client).await {
                Ok(summary) if summary.all_ready => {
                    info!(
                        cluster = name,
                        nodes = summary.nodes,
                        version = %summary.version,
                        "cluster passed liveness probe"
                    );
                    return Ok(());
                }
                Ok(summary) => {
                    if attempt == 0 {
                        debug!(
                            cluster = name,
                            nodes = summary.nodes,
                            "waiting for all nodes to report ready"
                        );
                    }
                }
                Err(err) => {
                    if attempt == 0 {
                        debug!(cluster = name, error = %err, "liveness probe not answering yet");
                    }
                }
            }
            sleep(READY_POLL_INTERVAL).await;
        }

        Err(FrameworkError::cluster_create_failed(
            name,
            "cluster did not pass the liveness probe",
            None,
        ))
    }
}

#[async_trait]
impl ClusterProvider for KindProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kind
    }

    fn supported_drivers(&self) -> &'static [&'static str] {
        KIND_DRIVERS
    }

    async fn check_tool(&self, cancel: &CancellationToken) -> Result<(), FrameworkError> {
        let mut command = Command::new("kind");
        command.arg("version");
        let version = run_tool_stdout(command, "kind version", cancel).await?;
        debug!(version = %version, "kind tool answered");
        Ok(())
    }

    async fn create(
        &self,
        config: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        config
            .validate(self.supported_drivers())
            .map_err(|err| FrameworkError::cluster_create_failed(
                &config.name,
                err.to_string(),
                None,
            ))?;

        self.check_tool(cancel).await.map_err(|err| {
            FrameworkError::cluster_create_failed(
                &config.name,
                "kind tool unavailable",
                Some(Box::new(err)),
            )
        })?;

        let existing = self.existing_clusters(cancel).await?;
        if existing.iter().any(|cluster| cluster == &config.name) {
            return Err(duplicate_cluster_error(&config.name));
        }

        // No kind-native knob for these; recorded and carried on.
        if let Some(memory) = config.options.memory {
            info!(cluster = %config.name, memory = %memory, "kind does not cap node memory; relying on the container runtime");
        }
        if let Some(cpus) = config.options.cpus {
            info!(cluster = %config.name, cpus = %cpus, "kind does not cap node cpus; relying on the container runtime");
        }

        let spec = render_cluster_spec(config).map_err(|source| {
            FrameworkError::cluster_create_failed(
                &config.name,
                "failed to render cluster spec",
                Some(Box::new(source)),
            )
        })?;

        let mut spec_file = tempfile::NamedTempFile::new().map_err(|source| {
            FrameworkError::FileSystemError {
                path: std::env::temp_dir(),
                operation: "create",
                source,
            }
        })?;
        spec_file
            .write_all(spec.as_bytes())
            .map_err(|source| FrameworkError::FileSystemError {
                path: spec_file.path().to_path_buf(),
                operation: "write",
                source,
            })?;

        let mut command = Command::new("kind");
        command
            .arg("create")
            .arg("cluster")
            .arg("--name")
            .arg(&config.name)
            .arg("--config")
            .arg(spec_file.path());
        if !config.version.is_empty() {
            command.arg("--image").arg(node_image(&config.version));
        }
        if let Some(network) = config.options.network.as_deref() {
            // kind's only knob for a named container network.
            command.env("KIND_EXPERIMENTAL_DOCKER_NETWORK", network);
        }

        info!(
            cluster = %config.name,
            nodes = config.node_count(),
            version = %config.version,
            "creating kind cluster"
        );

        run_tool(command, &format!("kind create cluster {}", config.name), cancel)
            .await
            .map_err(|err| match err {
                FrameworkError::CommandFailed {
                    exit_code, stderr, ..
                } => FrameworkError::cluster_create_failed(
                    &config.name,
                    format!("kind create cluster failed (exit {exit_code:?}):\n{stderr}"),
                    None,
                ),
                other => other,
            })?;

        self.wait_for_ready(&config.name, cancel).await?;
        info!(cluster = %config.name, "kind cluster created");
        Ok(())
    }

    async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<(), FrameworkError> {
        let existing = self.existing_clusters(cancel).await?;
        if !existing.iter().any(|cluster| cluster == name) {
            return Err(FrameworkError::ClusterNotFound {
                cluster: name.to_owned(),
            });
        }

        let mut command = Command::new("kind");
        command
            .arg("delete")
            .arg("cluster")
            .arg("--name")
            .arg(name);

        info!(cluster = name, "deleting kind cluster");
        run_tool(command, &format!("kind delete cluster {name}"), cancel)
            .await
            .map_err(|err| {
                FrameworkError::cluster_delete_failed(
                    name,
                    "kind delete cluster failed",
                    Some(Box::new(err)),
                )
            })?;

        info!(cluster = name, "kind cluster deleted");
        Ok(())
    }

    async fn status(&self, name: &str) -> Result<ClusterStatus, FrameworkError> {
        let cancel = CancellationToken::new();
        let existing = self.existing_clusters(&cancel).await?;
        if !existing.iter().any(|cluster| cluster == name) {
            return Ok(ClusterStatus::not_found(name, ProviderKind::Kind));
        }

        // Interrogation failures degrade the status instead of propagating.
        let probe = async {
            let kubeconfig = self.kubeconfig(name).await?;
            let client = client_from_kubeconfig(&kubeconfig, None).await?;
            node_summary(&client).await
        };

        match probe.await {
            Ok(summary) => {
                let state = if summary.all_ready {
                    ClusterState::Running
                } else {
                    ClusterState::Degraded
                };
                Ok(ClusterStatus {
                    name: name.to_owned(),
                    provider_kind: ProviderKind::Kind,
                    state,
                    healthy: summary.all_ready,
                    nodes: summary.nodes,
                    version: summary.version,
                    error: None,
                })
            }
            Err(err) => {
                warn!(cluster = name, error = %err, "kind cluster not answering status probe");
                Ok(ClusterStatus::unknown(
                    name,
                    ProviderKind::Kind,
                    err.to_string(),
                ))
            }
        }
    }

    async fn kubeconfig(&self, name: &str) -> Result<String, FrameworkError> {
        let cancel = CancellationToken::new();
        let existing = self.existing_clusters(&cancel).await?;
        if !existing.iter().any(|cluster| cluster == name) {
            return Err(FrameworkError::ClusterNotFound {
                cluster: name.to_owned(),
            });
        }

        let mut command = Command::new("kind");
        command
            .arg("get")
            .arg("kubeconfig")
            .arg("--name")
            .arg(name);
        run_tool_stdout(command, &format!("kind get kubeconfig {name}"), &cancel)
            .await
            .map_err(|err| match err {
                FrameworkError::CommandFailed { .. } => FrameworkError::InternalError {
                    message: format!("could not extract kubeconfig for `{name}`: {err}"),
                },
                other => other,
            })
    }

    async fn list(&self) -> Result<Vec<ClusterStatus>, FrameworkError> {
        let cancel = CancellationToken::new();
        let names = self.existing_clusters(&cancel).await?;
        let mut statuses = Vec::with_capacity(names.len());

        for name in names {
            match self.status(&name).await {
                Ok(status) => statuses.push(status),
                // Continue past per-cluster failures, reporting them inline.
                Err(err) => {
                    warn!(cluster = %name, error = %err, "failed to interrogate kind cluster");
                    statuses.push(ClusterStatus::unknown(
                        &name,
                        ProviderKind::Kind,
                        err.to_string(),
                    ));
                }
            }
        }

        Ok(statuses)
    }
}

fn duplicate_cluster_error(name: &str) -> FrameworkError {
    FrameworkError::cluster_create_failed(
        name,
        format!("cluster `{name}` already exists"),
        None,
    )
}

fn node_image(version: &str) -> String {
    if version.starts_with('v') {
        format!("kindest/node:{version}")
    } else {
        format!("kindest/node:v{version}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_error_mentions_already_exists() {
        let err = duplicate_cluster_error("t1");
        assert!(err.to_string().contains("already exists"));
        assert!(matches!(err, FrameworkError::ClusterCreateFailed { .. }));
    }

    #[test]
    fn node_image_normalizes_the_version_prefix() {
        assert_eq!(node_image("1.27.0"), "kindest/node:v1.27.0");
        assert_eq!(node_image("v1.27.0"), "kindest/node:v1.27.0");
    }
}
