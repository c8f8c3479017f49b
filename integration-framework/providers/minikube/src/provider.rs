use async_trait::async_trait;
use integration_framework_config::{ClusterConfig, ProviderKind};
use integration_framework_core::{
    ClusterProvider, ClusterState, ClusterStatus, FrameworkError,
    command::{run_tool, run_tool_stdout},
    kubernetes::{client_from_kubeconfig, node_summary},
};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    flags::start_flags,
    status::{HostState, ProfileList, parse_status},
};

const MINIKUBE_DRIVERS: &[&str] = &[
    "docker",
    "podman",
    "kvm2",
    "hyperkit",
    "virtualbox",
    "qemu2",
    "vmware",
    "none",
    "ssh",
];

/// Drives clusters managed as profiles by the `minikube` CLI.
#[derive(Clone, Copy, Debug, Default)]
pub struct MinikubeProvider;

impl MinikubeProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn profiles(&self, cancel: &CancellationToken) -> Result<ProfileList, FrameworkError> {
        let mut command = Command::new("minikube");
        command
            .arg("profile")
            .arg("list")
            .arg("-o")
            .arg("json");

        let stdout = run_tool_stdout(command, "minikube profile list", cancel).await?;
        serde_json::from_str(&stdout).map_err(|source| FrameworkError::ConfigParseFailed {
            message: "minikube profile list returned unparseable JSON".to_owned(),
            source: Some(Box::new(source)),
        })
    }

    async fn profile_exists(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, FrameworkError> {
        Ok(self.profiles(cancel).await?.contains(name))
    }

    /// Node count and kubelet version via the kubeconfig path; best effort.
    async fn enrich_from_cluster(&self, name: &str) -> Option<(u32, String, bool)> {
        let kubeconfig = self.kubeconfig(name).await.ok()?;
        let client = client_from_kubeconfig(&kubeconfig, None).await.ok()?;
        let summary = node_summary(&client).await.ok()?;
        Some((summary.nodes, summary.version, summary.all_ready))
    }
}

#[async_trait]
impl ClusterProvider for MinikubeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Minikube
    }

    fn supported_drivers(&self) -> &'static [&'static str] {
        MINIKUBE_DRIVERS
    }

    async fn check_tool(&self, cancel: &CancellationToken) -> Result<(), FrameworkError> {
        let mut command = Command::new("minikube");
        command.arg("version").arg("--short");
        let version = run_tool_stdout(command, "minikube version", cancel).await?;
        debug!(version = %version, "minikube tool answered");
        Ok(())
    }

    async fn create(
        &self,
        config: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        config
            .validate(self.supported_drivers())
            .map_err(|err| {
                FrameworkError::cluster_create_failed(&config.name, err.to_string(), None)
            })?;

        self.check_tool(cancel).await.map_err(|err| {
            FrameworkError::cluster_create_failed(
                &config.name,
                "minikube tool unavailable",
                Some(Box::new(err)),
            )
        })?;

        if self.profile_exists(&config.name, cancel).await? {
            return Err(FrameworkError::cluster_create_failed(
                &config.name,
                format!("cluster `{}` already exists", config.name),
                None,
            ));
        }

        let flags = start_flags(config);
        let mut command = Command::new("minikube");
        command.arg("start").arg("-p").arg(&config.name);
        for flag in &flags {
            command.arg(flag);
        }

        info!(
            cluster = %config.name,
            flags = ?flags,
            "starting minikube profile"
        );

        // The tool's combined output travels in the error message; operators
        // diagnose failed starts from it.
        run_tool(command, &format!("minikube start {}", config.name), cancel)
            .await
            .map_err(|err| match err {
                FrameworkError::CommandFailed {
                    exit_code, stderr, ..
                } => FrameworkError::cluster_create_failed(
                    &config.name,
                    format!("minikube start failed (exit {exit_code:?}):\n{stderr}"),
                    None,
                ),
                other => other,
            })?;

        // minikube blocks until the node is up; the probe confirms it.
        let status = self.status(&config.name).await?;
        if !status.healthy {
            return Err(FrameworkError::cluster_create_failed(
                &config.name,
                format!(
                    "profile started but did not pass the liveness probe (state: {})",
                    status.state.as_str()
                ),
                None,
            ));
        }

        info!(cluster = %config.name, "minikube profile created");
        Ok(())
    }

    async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<(), FrameworkError> {
        if !self.profile_exists(name, cancel).await? {
            return Err(FrameworkError::ClusterNotFound {
                cluster: name.to_owned(),
            });
        }

        let mut command = Command::new("minikube");
        command.arg("delete").arg("-p").arg(name);

        info!(cluster = name, "deleting minikube profile");
        run_tool(command, &format!("minikube delete {name}"), cancel)
            .await
            .map_err(|err| {
                FrameworkError::cluster_delete_failed(
                    name,
                    "minikube delete failed",
                    Some(Box::new(err)),
                )
            })?;

        info!(cluster = name, "minikube profile deleted");
        Ok(())
    }

    async fn status(&self, name: &str) -> Result<ClusterStatus, FrameworkError> {
        let cancel = CancellationToken::new();
        if !self.profile_exists(name, &cancel).await? {
            return Ok(ClusterStatus::not_found(name, ProviderKind::Minikube));
        }

        let mut command = Command::new("minikube");
        command.arg("status").arg("-p").arg(name).arg("-o").arg("json");

        // `minikube status` exits non-zero for stopped profiles but still
        // prints the blob; both paths feed the parser. Parse problems end in
        // `unknown, unhealthy`, never an error.
        let raw = match run_tool(command, &format!("minikube status {name}"), &cancel).await {
            Ok(output) => output.stdout,
            Err(FrameworkError::CommandFailed { stderr, .. }) => stderr,
            Err(err) => {
                warn!(cluster = name, error = %err, "minikube status invocation failed");
                return Ok(ClusterStatus::unknown(
                    name,
                    ProviderKind::Minikube,
                    err.to_string(),
                ));
            }
        };

        let parsed = parse_status(&raw);
        let (state, mut healthy) = match parsed.host {
            HostState::Running => (ClusterState::Running, true),
            HostState::Stopped => (ClusterState::Stopped, false),
            HostState::Unknown => (ClusterState::Unknown, false),
        };
        if !parsed.components_running {
            healthy = false;
        }

        let mut status = ClusterStatus {
            name: name.to_owned(),
            provider_kind: ProviderKind::Minikube,
            state,
            healthy,
            nodes: 0,
            version: String::new(),
            error: None,
        };

        if healthy
            && let Some((nodes, version, all_ready)) = self.enrich_from_cluster(name).await
        {
            status.nodes = nodes;
            status.version = version;
            if !all_ready {
                status.healthy = false;
                status.state = ClusterState::Degraded;
            }
        }

        Ok(status)
    }

    async fn kubeconfig(&self, name: &str) -> Result<String, FrameworkError> {
        let cancel = CancellationToken::new();
        if !self.profile_exists(name, &cancel).await? {
            return Err(FrameworkError::ClusterNotFound {
                cluster: name.to_owned(),
            });
        }

        let mut command = Command::new("minikube");
        command
            .arg("-p")
            .arg(name)
            .arg("kubectl")
            .arg("--")
            .arg("config")
            .arg("view")
            .arg("--flatten")
            .arg("--minify");

        run_tool_stdout(command, &format!("minikube kubectl config view {name}"), &cancel)
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
        let names = self.profiles(&cancel).await?.names();
        let mut statuses = Vec::with_capacity(names.len());

        for name in names {
            match self.status(&name).await {
                Ok(status) => statuses.push(status),
                Err(err) => {
                    warn!(cluster = %name, error = %err, "failed to interrogate minikube profile");
                    statuses.push(ClusterStatus::unknown(
                        &name,
                        ProviderKind::Minikube,
                        err.to_string(),
                    ));
                }
            }
        }

        Ok(statuses)
    }

    async fn enable_ingress(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let mut command = Command::new("minikube");
        command
            .arg("addons")
            .arg("enable")
            .arg("ingress")
            .arg("-p")
            .arg(name);

        info!(cluster = name, "enabling minikube ingress add-on");
        run_tool(command, &format!("minikube addons enable ingress {name}"), cancel)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use integration_framework_config::MemorySize;

    use super::*;

    #[test]
    fn rejects_memory_below_the_floor_before_touching_the_tool() {
        let config = ClusterConfig::new("east", ProviderKind::Minikube)
            .with_memory(MemorySize::from_mebibytes(256));
        let err = config
            .validate(MINIKUBE_DRIVERS)
            .unwrap_err();
        assert!(err.to_string().contains("below the 1Gi minimum"));
    }

    #[test]
    fn driver_set_covers_the_common_runtimes() {
        assert!(MINIKUBE_DRIVERS.contains(&"docker"));
        assert!(MINIKUBE_DRIVERS.contains(&"kvm2"));
        assert!(!MINIKUBE_DRIVERS.contains(&"warp"));
    }
}
