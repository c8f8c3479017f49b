use integration_framework_config::{ClusterConfig, PortSpec};
use serde::Serialize;

/// kind cluster spec (`kind.x-k8s.io/v1alpha4`) rendered to YAML and handed
/// to `kind create cluster --config`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterSpec {
    kind: &'static str,
    api_version: &'static str,
    nodes: Vec<NodeSpec>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeSpec {
    role: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extra_port_mappings: Vec<PortMapping>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PortMapping {
    container_port: u16,
    host_port: u16,
    protocol: String,
}

impl From<&PortSpec> for PortMapping {
    fn from(spec: &PortSpec) -> Self {
        Self {
            container_port: spec.container_port,
            host_port: spec.host_port,
            protocol: spec.protocol.to_ascii_uppercase(),
        }
    }
}

/// Render the cluster spec: one control-plane node plus `nodes - 1` workers.
///
/// Host port mappings land on the control-plane node, where kind exposes
/// them.
pub fn render_cluster_spec(config: &ClusterConfig) -> Result<String, serde_yaml::Error> {
    let mut nodes = Vec::with_capacity(config.node_count() as usize);
    nodes.push(NodeSpec {
        role: "control-plane",
        extra_port_mappings: config.options.ports.iter().map(Into::into).collect(),
    });
    for _ in 1..config.node_count() {
        nodes.push(NodeSpec {
            role: "worker",
            extra_port_mappings: Vec::new(),
        });
    }

    serde_yaml::to_string(&ClusterSpec {
        kind: "Cluster",
        api_version: "kind.x-k8s.io/v1alpha4",
        nodes,
    })
}

#[cfg(test)]
mod tests {
    use integration_framework_config::ProviderKind;

    use super::*;

    #[test]
    fn renders_control_plane_plus_workers() {
        let config = ClusterConfig::new("t1", ProviderKind::Kind).with_nodes(3);
        let yaml = render_cluster_spec(&config).unwrap();
        assert!(yaml.contains("kind.x-k8s.io/v1alpha4"));
        assert_eq!(yaml.matches("role: control-plane").count(), 1);
        assert_eq!(yaml.matches("role: worker").count(), 2);
    }

    #[test]
    fn single_node_has_no_workers() {
        let config = ClusterConfig::new("t1", ProviderKind::Kind);
        let yaml = render_cluster_spec(&config).unwrap();
        assert!(!yaml.contains("role: worker"));
    }

    #[test]
    fn port_mappings_land_on_the_control_plane() {
        let mut config = ClusterConfig::new("t1", ProviderKind::Kind);
        config.options.ports.push("8080:80/tcp".parse().unwrap());
        let yaml = render_cluster_spec(&config).unwrap();
        assert!(yaml.contains("containerPort: 80"));
        assert!(yaml.contains("hostPort: 8080"));
        assert!(yaml.contains("protocol: TCP"));
    }
}
