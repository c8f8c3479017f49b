pub mod istio;
pub mod kubernetes;
pub mod linkerd;
pub mod manual;

pub use istio::IstioConnectivity;
pub use kubernetes::KubernetesConnectivity;
pub use linkerd::LinkerdConnectivity;
pub use manual::ManualConnectivity;
