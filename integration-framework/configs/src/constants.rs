//! Well-known labels and in-cluster resource names.
//!
//! Inventory and garbage collection rely exclusively on these labels; reusing
//! a resource name below without its label set would leak the resource.

/// Label key marking every resource owned by the framework.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Label value identifying this framework as the owner.
pub const MANAGED_BY_VALUE: &str = "kiali-integration-framework";

/// Plane marker set on every connectivity resource.
pub const CONNECTIVITY_PLANE_LABEL: &str = "connectivity-framework";

/// Per-provider tag on connectivity resources.
pub const CONNECTIVITY_TYPE_LABEL: &str = "connectivity-type";

/// Plane marker set on every service-discovery resource.
pub const DISCOVERY_PLANE_LABEL: &str = "service-discovery";

/// Per-provider tag on service-discovery resources.
pub const DISCOVERY_TYPE_LABEL: &str = "discovery-type";

/// Label selecting services that take part in cross-cluster propagation.
pub const PROPAGATED_SERVICE_LABEL: &str = "propagated";

/// Namespace receiving cluster-level connectivity and discovery resources.
pub const SYSTEM_NAMESPACE: &str = "kube-system";

// Connectivity config maps.
pub const CROSS_CLUSTER_DNS_CONFIG_MAP: &str = "cross-cluster-dns";
pub const CROSS_CLUSTER_DISCOVERY_SERVICE: &str = "cross-cluster-discovery";

// Service-discovery resources.
pub const DNS_DISCOVERY_CONFIG_MAP: &str = "dns-discovery-config";
pub const DNS_DISCOVERY_DEPLOYMENT: &str = "dns-discovery";
pub const API_AGGREGATION_CONFIG_MAP: &str = "api-server-aggregation-config";
pub const API_AGGREGATOR_NAME: &str = "api-server-aggregator";
pub const PROPAGATION_CONFIG_MAP: &str = "service-propagation-config";
pub const PROPAGATION_STATE_MAP: &str = "service-propagation-state";
pub const PROPAGATOR_NAME: &str = "service-propagator";
