pub mod command;
pub mod env;
pub mod error;
pub mod health;
pub mod kubernetes;
pub mod labels;
pub mod provider;
pub mod status;

pub use command::{ToolOutput, run_tool, run_tool_stdout};
pub use error::{DynError, ErrorKind, FrameworkError};
pub use health::HealthCheck;
pub use provider::ClusterProvider;
pub use status::{
    ClusterState, ClusterStatus, ComponentState, FederationStatus, NetworkStatus, OverallHealth,
    TopologyStatus,
};
