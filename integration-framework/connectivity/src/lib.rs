pub mod config;
pub mod framework;
pub mod helpers;
pub mod provider;
pub mod providers;

pub use config::{ConnectivityKind, ConnectivityStatus, ConnectivityTemplate, merge_config};
pub use framework::ConnectivityFramework;
pub use provider::ConnectivityProvider;
