use std::path::PathBuf;

use thiserror::Error;

/// Boxed error used to carry arbitrary lower-level causes.
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable error kinds callers may pattern-match on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigInvalid,
    ConfigNotFound,
    ConfigParseFailed,
    ClusterCreateFailed,
    ClusterDeleteFailed,
    ClusterNotFound,
    ClusterUnhealthy,
    ComponentInstallFailed,
    ComponentUninstallFailed,
    ComponentUpdateFailed,
    ComponentNotFound,
    ComponentAlreadyExists,
    ValidationFailed,
    InvalidParameter,
    CommandFailed,
    NetworkError,
    FileSystemError,
    PermissionDenied,
    InternalError,
    UnknownError,
}

/// Closed error taxonomy of the framework.
///
/// Variants carry the context a caller needs to act on the failure (command
/// line, exit code, cluster name, path); lower-level causes are preserved as
/// sources and bubble unchanged until a tolerance boundary.
#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("configuration not found at {}", .path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("failed to parse configuration: {message}")]
    ConfigParseFailed {
        message: String,
        #[source]
        source: Option<DynError>,
    },

    #[error("failed to create cluster `{cluster}`: {message}")]
    ClusterCreateFailed {
        cluster: String,
        message: String,
        #[source]
        source: Option<DynError>,
    },

    #[error("failed to delete cluster `{cluster}`: {message}")]
    ClusterDeleteFailed {
        cluster: String,
        message: String,
        #[source]
        source: Option<DynError>,
    },

    #[error("cluster `{cluster}` not found")]
    ClusterNotFound { cluster: String },

    #[error("cluster `{cluster}` is unhealthy: {message}")]
    ClusterUnhealthy { cluster: String, message: String },

    #[error("failed to install {component}: {message}")]
    ComponentInstallFailed {
        component: String,
        message: String,
        #[source]
        source: Option<DynError>,
    },

    #[error("failed to uninstall {component}: {message}")]
    ComponentUninstallFailed {
        component: String,
        message: String,
        #[source]
        source: Option<DynError>,
    },

    #[error("failed to update {component}: {message}")]
    ComponentUpdateFailed {
        component: String,
        message: String,
        #[source]
        source: Option<DynError>,
    },

    #[error("{component} is not installed")]
    ComponentNotFound { component: String },

    #[error("{component} is already installed")]
    ComponentAlreadyExists { component: String },

    #[error("validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("invalid parameter `{parameter}`: {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("command `{command}` failed with exit code {exit_code:?}\nstderr:\n{stderr}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("network operation `{operation}` failed (timed out: {timed_out})")]
    NetworkError {
        operation: String,
        timed_out: bool,
        #[source]
        source: Option<DynError>,
    },

    #[error("filesystem {operation} failed for {}", .path.display())]
    FileSystemError {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("internal error: {message}")]
    InternalError { message: String },

    #[error("unknown error: {message}")]
    UnknownError {
        message: String,
        #[source]
        source: Option<DynError>,
    },
}

impl FrameworkError {
    /// Stable kind of this error for caller-side matching.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigInvalid { .. } => ErrorKind::ConfigInvalid,
            Self::ConfigNotFound { .. } => ErrorKind::ConfigNotFound,
            Self::ConfigParseFailed { .. } => ErrorKind::ConfigParseFailed,
            Self::ClusterCreateFailed { .. } => ErrorKind::ClusterCreateFailed,
            Self::ClusterDeleteFailed { .. } => ErrorKind::ClusterDeleteFailed,
            Self::ClusterNotFound { .. } => ErrorKind::ClusterNotFound,
            Self::ClusterUnhealthy { .. } => ErrorKind::ClusterUnhealthy,
            Self::ComponentInstallFailed { .. } => ErrorKind::ComponentInstallFailed,
            Self::ComponentUninstallFailed { .. } => ErrorKind::ComponentUninstallFailed,
            Self::ComponentUpdateFailed { .. } => ErrorKind::ComponentUpdateFailed,
            Self::ComponentNotFound { .. } => ErrorKind::ComponentNotFound,
            Self::ComponentAlreadyExists { .. } => ErrorKind::ComponentAlreadyExists,
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::CommandFailed { .. } => ErrorKind::CommandFailed,
            Self::NetworkError { .. } => ErrorKind::NetworkError,
            Self::FileSystemError { .. } => ErrorKind::FileSystemError,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::InternalError { .. } => ErrorKind::InternalError,
            Self::UnknownError { .. } => ErrorKind::UnknownError,
        }
    }

    /// Retry hint: transient failures callers may re-attempt.
    ///
    /// The framework never retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NetworkError | ErrorKind::ClusterUnhealthy | ErrorKind::CommandFailed
        )
    }

    pub fn cluster_create_failed(
        cluster: impl Into<String>,
        message: impl Into<String>,
        source: Option<DynError>,
    ) -> Self {
        Self::ClusterCreateFailed {
            cluster: cluster.into(),
            message: message.into(),
            source,
        }
    }

    pub fn cluster_delete_failed(
        cluster: impl Into<String>,
        message: impl Into<String>,
        source: Option<DynError>,
    ) -> Self {
        Self::ClusterDeleteFailed {
            cluster: cluster.into(),
            message: message.into(),
            source,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Cancellation surfaces as an internal error carrying the operation name.
    pub fn cancelled(operation: &str) -> Self {
        Self::InternalError {
            message: format!("operation `{operation}` was cancelled"),
        }
    }
}

impl From<kube::Error> for FrameworkError {
    fn from(source: kube::Error) -> Self {
        Self::NetworkError {
            operation: "kubernetes api call".to_owned(),
            timed_out: false,
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_hints_cover_the_declared_kinds() {
        let retryable = FrameworkError::NetworkError {
            operation: "watch".to_owned(),
            timed_out: true,
            source: None,
        };
        assert!(retryable.is_retryable());

        let retryable = FrameworkError::CommandFailed {
            command: "minikube start".to_owned(),
            exit_code: Some(70),
            stderr: String::new(),
        };
        assert!(retryable.is_retryable());

        let retryable = FrameworkError::ClusterUnhealthy {
            cluster: "t1".to_owned(),
            message: "apiserver stopped".to_owned(),
        };
        assert!(retryable.is_retryable());

        let terminal = FrameworkError::ClusterNotFound {
            cluster: "t1".to_owned(),
        };
        assert!(!terminal.is_retryable());
        assert_eq!(terminal.kind(), ErrorKind::ClusterNotFound);
    }

    #[test]
    fn command_failure_message_carries_stderr() {
        let err = FrameworkError::CommandFailed {
            command: "kind create cluster".to_owned(),
            exit_code: Some(1),
            stderr: "node image unavailable".to_owned(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("kind create cluster"));
        assert!(rendered.contains("node image unavailable"));
    }
}
