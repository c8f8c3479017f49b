use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{cluster::ClusterConfig, network::NetworkConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyInvariantError {
    #[error("topology primary cluster must be named")]
    UnnamedPrimary,
    #[error("remote `{remote}` shares the primary cluster name `{name}`")]
    RemoteShadowsPrimary { remote: String, name: String },
    #[error("remote entry `{key}` declares cluster name `{name}` already used by `{other}`")]
    DuplicateRemoteName {
        key: String,
        name: String,
        other: String,
    },
    #[error("remote entry `{key}` has an empty cluster name")]
    UnnamedRemote { key: String },
}

/// Cross-cluster federation toggle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    pub enabled: bool,
}

/// A primary cluster plus zero or more remotes intended to be wired together.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterTopology {
    pub primary: ClusterConfig,
    #[serde(default)]
    pub remotes: BTreeMap<String, ClusterConfig>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub federation: FederationConfig,
}

impl ClusterTopology {
    #[must_use]
    pub fn single(primary: ClusterConfig) -> Self {
        Self {
            primary,
            remotes: BTreeMap::new(),
            network: NetworkConfig::default(),
            federation: FederationConfig::default(),
        }
    }

    #[must_use]
    pub fn with_remote(mut self, key: impl Into<String>, config: ClusterConfig) -> Self {
        self.remotes.insert(key.into(), config);
        self
    }

    #[must_use]
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Total number of clusters, primary included.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        1 + self.remotes.len()
    }

    /// All cluster names in deterministic order, primary first.
    #[must_use]
    pub fn cluster_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.cluster_count());
        names.push(self.primary.name.as_str());
        names.extend(self.remotes.values().map(|c| c.name.as_str()));
        names
    }

    /// Validate naming invariants before any cluster is touched.
    ///
    /// Focuses on "shape" invariants (non-empty, pairwise distinct); per
    /// cluster option checks happen against the owning provider.
    pub fn validate(&self) -> Result<(), TopologyInvariantError> {
        if self.primary.name.trim().is_empty() {
            return Err(TopologyInvariantError::UnnamedPrimary);
        }

        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        seen.insert(self.primary.name.as_str(), "primary");

        for (key, remote) in &self.remotes {
            if remote.name.trim().is_empty() {
                return Err(TopologyInvariantError::UnnamedRemote { key: key.clone() });
            }
            if remote.name == self.primary.name {
                return Err(TopologyInvariantError::RemoteShadowsPrimary {
                    remote: key.clone(),
                    name: remote.name.clone(),
                });
            }
            if let Some(other) = seen.insert(remote.name.as_str(), key.as_str()) {
                return Err(TopologyInvariantError::DuplicateRemoteName {
                    key: key.clone(),
                    name: remote.name.clone(),
                    other: other.to_owned(),
                });
            }
        }

        debug_assert_eq!(
            seen.keys().collect::<BTreeSet<_>>().len(),
            self.cluster_count(),
            "validated topology must have pairwise distinct names"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;

    fn cluster(name: &str) -> ClusterConfig {
        ClusterConfig::new(name, ProviderKind::Kind)
    }

    #[test]
    fn accepts_distinct_names() {
        let topology = ClusterTopology::single(cluster("p"))
            .with_remote("east", cluster("r1"))
            .with_remote("west", cluster("r2"));
        topology.validate().unwrap();
        assert_eq!(topology.cluster_names(), vec!["p", "r1", "r2"]);
    }

    #[test]
    fn rejects_remote_shadowing_primary() {
        let topology = ClusterTopology::single(cluster("p")).with_remote("east", cluster("p"));
        assert!(matches!(
            topology.validate(),
            Err(TopologyInvariantError::RemoteShadowsPrimary { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_remote_names() {
        let topology = ClusterTopology::single(cluster("p"))
            .with_remote("east", cluster("r"))
            .with_remote("west", cluster("r"));
        let err = topology.validate().unwrap_err();
        assert!(matches!(
            err,
            TopologyInvariantError::DuplicateRemoteName { .. }
        ));
    }

    #[test]
    fn rejects_unnamed_primary() {
        let topology = ClusterTopology::single(cluster(""));
        assert_eq!(
            topology.validate(),
            Err(TopologyInvariantError::UnnamedPrimary)
        );
    }
}
