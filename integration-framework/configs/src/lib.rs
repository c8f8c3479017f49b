pub mod cluster;
pub mod constants;
pub mod network;
pub mod provider;
pub mod topology;

pub use cluster::{
    ClusterConfig, ClusterConfigError, ClusterOptions, CpuCount, DnsOptions, MemorySize, PortSpec,
};
pub use network::{
    GatewayConfig, NetworkConfig, PolicyDescriptor, ServiceDiscoveryKind, ServiceDiscoveryRef,
};
pub use provider::{ProviderKind, UnknownProviderKind};
pub use topology::{ClusterTopology, FederationConfig, TopologyInvariantError};
