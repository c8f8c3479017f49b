use std::sync::Arc;

use integration_framework_config::ProviderKind;
use integration_framework_core::{ClusterProvider, FrameworkError};
use integration_framework_provider_kind::KindProvider;
use integration_framework_provider_minikube::MinikubeProvider;

/// Maps a provider kind to an instance; swappable so orchestration tests can
/// inject in-memory providers.
pub trait ProviderFactory: Send + Sync {
    fn provider_for(&self, kind: ProviderKind) -> Result<Arc<dyn ClusterProvider>, FrameworkError>;

    /// Kinds this factory can instantiate.
    fn supported_kinds(&self) -> Vec<ProviderKind>;

    fn is_supported(&self, kind: ProviderKind) -> bool {
        self.supported_kinds().contains(&kind)
    }
}

/// Production factory over the real cluster runtimes.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultProviderFactory;

impl ProviderFactory for DefaultProviderFactory {
    fn provider_for(&self, kind: ProviderKind) -> Result<Arc<dyn ClusterProvider>, FrameworkError> {
        match kind {
            ProviderKind::Kind => Ok(Arc::new(KindProvider::new())),
            ProviderKind::Minikube => Ok(Arc::new(MinikubeProvider::new())),
            // Recognized in the enumeration, but nothing backs it yet.
            ProviderKind::K3d => Err(FrameworkError::internal(
                "provider kind `k3d` is recognized but not implemented",
            )),
        }
    }

    fn supported_kinds(&self) -> Vec<ProviderKind> {
        vec![ProviderKind::Kind, ProviderKind::Minikube]
    }
}

/// Resolve a provider from its textual tag.
///
/// Unknown tags are an invalid parameter; known-but-unimplemented kinds come
/// back as internal errors from the factory itself.
pub fn provider_for_tag(
    factory: &dyn ProviderFactory,
    tag: &str,
) -> Result<Arc<dyn ClusterProvider>, FrameworkError> {
    let kind: ProviderKind = tag
        .parse()
        .map_err(|err: integration_framework_config::UnknownProviderKind| {
            FrameworkError::invalid_parameter("providerKind", err.to_string())
        })?;
    factory.provider_for(kind)
}

#[cfg(test)]
mod tests {
    use integration_framework_core::ErrorKind;

    use super::*;

    #[test]
    fn known_kinds_resolve_to_providers() {
        let factory = DefaultProviderFactory;
        assert_eq!(
            factory.provider_for(ProviderKind::Kind).unwrap().kind(),
            ProviderKind::Kind
        );
        assert_eq!(
            factory.provider_for(ProviderKind::Minikube).unwrap().kind(),
            ProviderKind::Minikube
        );
    }

    #[test]
    fn placeholder_kind_fails_with_internal_error() {
        let factory = DefaultProviderFactory;
        let err = match factory.provider_for(ProviderKind::K3d) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert!(!factory.is_supported(ProviderKind::K3d));
    }

    #[test]
    fn unknown_tags_fail_with_invalid_parameter() {
        let factory = DefaultProviderFactory;
        let err = match provider_for_tag(&factory, "gke") {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn supported_kinds_exclude_the_placeholder() {
        let factory = DefaultProviderFactory;
        let kinds = factory.supported_kinds();
        assert!(kinds.contains(&ProviderKind::Kind));
        assert!(kinds.contains(&ProviderKind::Minikube));
        assert!(!kinds.contains(&ProviderKind::K3d));
    }
}
