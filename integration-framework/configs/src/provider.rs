use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cluster runtimes the framework recognizes.
///
/// `K3d` is recognized in configuration but has no backing provider yet; the
/// factory rejects it at instantiation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Kind,
    Minikube,
    K3d,
}

impl ProviderKind {
    /// Canonical tag used in configuration files and labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kind => "kind",
            Self::Minikube => "minikube",
            Self::K3d => "k3d",
        }
    }

    /// All kinds present in the enumeration, implemented or not.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Kind, Self::Minikube, Self::K3d]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown provider kind `{tag}` (expected one of: kind, minikube, k3d)")]
pub struct UnknownProviderKind {
    pub tag: String,
}

impl FromStr for ProviderKind {
    type Err = UnknownProviderKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kind" => Ok(Self::Kind),
            "minikube" => Ok(Self::Minikube),
            "k3d" => Ok(Self::K3d),
            _ => Err(UnknownProviderKind { tag: s.to_owned() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_tags() {
        assert_eq!("kind".parse::<ProviderKind>().unwrap(), ProviderKind::Kind);
        assert_eq!(
            "MiniKube".parse::<ProviderKind>().unwrap(),
            ProviderKind::Minikube
        );
        assert_eq!("k3d".parse::<ProviderKind>().unwrap(), ProviderKind::K3d);
    }

    #[test]
    fn rejects_unknown_tags() {
        let err = "gke".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.tag, "gke");
    }
}
