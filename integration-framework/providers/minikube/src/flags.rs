use integration_framework_config::ClusterConfig;

/// Translate recognized cluster options into `minikube start` flags.
///
/// Every option has a first-class flag on the profile manager, so nothing is
/// dropped here; unknown configuration keys were already discarded at parse
/// time.
pub fn start_flags(config: &ClusterConfig) -> Vec<String> {
    let mut flags = Vec::new();

    if !config.version.is_empty() {
        flags.push(format!("--kubernetes-version={}", config.version));
    }
    if let Some(nodes) = config.options.nodes {
        flags.push(format!("--nodes={nodes}"));
    }
    if let Some(memory) = config.options.memory {
        flags.push(format!("--memory={}", memory.to_flag_value()));
    }
    if let Some(cpus) = config.options.cpus {
        flags.push(format!("--cpus={cpus}"));
    }
    if let Some(disk) = config.options.disk_size {
        flags.push(format!("--disk-size={}", disk.to_flag_value()));
    }
    if let Some(driver) = config.options.driver.as_deref() {
        flags.push(format!("--driver={driver}"));
    }
    if let Some(network) = config.options.network.as_deref() {
        flags.push(format!("--network={network}"));
    }
    for addon in &config.options.addons {
        flags.push(format!("--addons={addon}"));
    }
    for port in &config.options.ports {
        flags.push(format!("--ports={port}"));
    }
    if let Some(domain) = config.options.dns.domain.as_deref() {
        flags.push(format!("--dns-domain={domain}"));
    }

    flags
}

#[cfg(test)]
mod tests {
    use integration_framework_config::{MemorySize, ProviderKind};

    use super::*;

    #[test]
    fn translates_every_recognized_option() {
        let mut config = ClusterConfig::new("east", ProviderKind::Minikube)
            .with_version("1.27.0")
            .with_nodes(3)
            .with_memory(MemorySize::from_gibibytes(4))
            .with_cpus(2);
        config.options.disk_size = Some(MemorySize::from_gibibytes(20));
        config.options.driver = Some("docker".to_owned());
        config.options.network = Some("itf-net".to_owned());
        config.options.addons = vec!["metrics-server".to_owned()];
        config.options.ports = vec!["8080:80".parse().unwrap()];
        config.options.dns.domain = Some("east.local".to_owned());

        let flags = start_flags(&config);
        assert!(flags.contains(&"--kubernetes-version=1.27.0".to_owned()));
        assert!(flags.contains(&"--nodes=3".to_owned()));
        assert!(flags.contains(&"--memory=4096mb".to_owned()));
        assert!(flags.contains(&"--cpus=2".to_owned()));
        assert!(flags.contains(&"--disk-size=20480mb".to_owned()));
        assert!(flags.contains(&"--driver=docker".to_owned()));
        assert!(flags.contains(&"--network=itf-net".to_owned()));
        assert!(flags.contains(&"--addons=metrics-server".to_owned()));
        assert!(flags.contains(&"--ports=8080:80/tcp".to_owned()));
        assert!(flags.contains(&"--dns-domain=east.local".to_owned()));
    }

    #[test]
    fn empty_options_translate_to_no_flags() {
        let config = ClusterConfig::new("east", ProviderKind::Minikube);
        assert!(start_flags(&config).is_empty());
    }
}
