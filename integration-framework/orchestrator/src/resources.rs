use integration_framework_config::{ClusterTopology, CpuCount, MemorySize};
use integration_framework_core::FrameworkError;
use sysinfo::System;
use tracing::{debug, warn};

/// Share of host resources reserved for the system itself.
const SYSTEM_RESERVE_PERCENT: u64 = 20;

const MIN_CLUSTER_MEMORY: MemorySize = MemorySize::from_gibibytes(2);
const MAX_CLUSTER_MEMORY: MemorySize = MemorySize::from_gibibytes(8);
const MIN_CLUSTER_CPUS: u32 = 1;
const MAX_CLUSTER_CPUS: u32 = 4;

const FALLBACK_MEMORY: MemorySize = MemorySize::from_gibibytes(16);
const FALLBACK_CPUS: u32 = 4;

/// Host totals measured once per orchestration call.
#[derive(Clone, Copy, Debug)]
pub struct SystemResourceInfo {
    pub total_memory: MemorySize,
    pub available_memory: MemorySize,
    pub total_cpus: u32,
}

/// Per-cluster targets after reservation and clamping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourcePlan {
    pub clusters: usize,
    pub memory_per_cluster: MemorySize,
    pub cpus_per_cluster: u32,
}

/// Measure the host; conservative defaults on any failure, never an error.
#[must_use]
pub fn discover_host_resources() -> SystemResourceInfo {
    let system = System::new_all();

    let total_memory = system.total_memory();
    let cpus = system.cpus().len();

    if total_memory == 0 || cpus == 0 {
        warn!(
            fallback_memory = %FALLBACK_MEMORY,
            fallback_cpus = FALLBACK_CPUS,
            "could not measure host resources; using conservative defaults"
        );
        return SystemResourceInfo {
            total_memory: FALLBACK_MEMORY,
            available_memory: FALLBACK_MEMORY,
            total_cpus: FALLBACK_CPUS,
        };
    }

    let info = SystemResourceInfo {
        total_memory: MemorySize::from_bytes(total_memory),
        available_memory: MemorySize::from_bytes(system.available_memory()),
        total_cpus: cpus as u32,
    };
    debug!(
        total_memory = %info.total_memory,
        available_memory = %info.available_memory,
        cpus = info.total_cpus,
        "measured host resources"
    );
    info
}

/// Divide the post-reserve host budget across the clusters, clamped to the
/// per-cluster floor and ceiling. Warns (and floors) when the floor cannot
/// actually be met.
#[must_use]
pub fn plan_resources(host: &SystemResourceInfo, clusters: usize) -> ResourcePlan {
    let clusters = clusters.max(1);

    let usable_memory = host.total_memory.as_bytes() * (100 - SYSTEM_RESERVE_PERCENT) / 100;
    let usable_cpus = host.total_cpus * (100 - SYSTEM_RESERVE_PERCENT as u32) / 100;

    let raw_memory = MemorySize::from_bytes(usable_memory / clusters as u64);
    let raw_cpus = (usable_cpus / clusters as u32).max(0);

    if raw_memory < MIN_CLUSTER_MEMORY {
        warn!(
            clusters,
            per_cluster = %raw_memory,
            floor = %MIN_CLUSTER_MEMORY,
            "host memory budget is below the per-cluster floor; proceeding with the floor"
        );
    }
    if raw_cpus < MIN_CLUSTER_CPUS {
        warn!(
            clusters,
            per_cluster = raw_cpus,
            floor = MIN_CLUSTER_CPUS,
            "host cpu budget is below the per-cluster floor; proceeding with the floor"
        );
    }

    let memory_per_cluster = raw_memory.clamp(MIN_CLUSTER_MEMORY, MAX_CLUSTER_MEMORY);
    let cpus_per_cluster = raw_cpus.clamp(MIN_CLUSTER_CPUS, MAX_CLUSTER_CPUS);

    let plan = ResourcePlan {
        clusters,
        memory_per_cluster,
        cpus_per_cluster,
    };
    debug!(
        clusters,
        memory_per_cluster = %plan.memory_per_cluster,
        cpus_per_cluster = plan.cpus_per_cluster,
        "computed resource plan"
    );
    plan
}

/// Fill unset allocations from the plan, sanity-check caller-set ones, and
/// reject the call when the summed allocation exceeds the host.
pub fn apply_plan(
    topology: &mut ClusterTopology,
    host: &SystemResourceInfo,
    plan: &ResourcePlan,
) -> Result<(), FrameworkError> {
    let mut total_memory: u64 = 0;
    let mut total_cpus: u32 = 0;

    let configs = std::iter::once(&mut topology.primary).chain(topology.remotes.values_mut());
    for config in configs {
        let memory = match config.options.memory {
            Some(requested) => {
                if requested.as_bytes() > plan.memory_per_cluster.as_bytes() * 2 {
                    warn!(
                        cluster = %config.name,
                        requested = %requested,
                        planned = %plan.memory_per_cluster,
                        "cluster requests more than twice its planned memory share"
                    );
                }
                requested
            }
            None => {
                config.options.memory = Some(plan.memory_per_cluster);
                plan.memory_per_cluster
            }
        };

        let cpus = match config.options.cpus {
            Some(requested) => {
                if requested.get() > plan.cpus_per_cluster * 2 {
                    warn!(
                        cluster = %config.name,
                        requested = %requested,
                        planned = plan.cpus_per_cluster,
                        "cluster requests more than twice its planned cpu share"
                    );
                }
                requested.get()
            }
            None => {
                config.options.cpus = Some(CpuCount(plan.cpus_per_cluster));
                plan.cpus_per_cluster
            }
        };

        total_memory += memory.as_bytes();
        total_cpus += cpus;
    }

    if total_memory > host.total_memory.as_bytes() {
        return Err(FrameworkError::validation(format!(
            "topology requests {} of memory but the host only has {}",
            MemorySize::from_bytes(total_memory),
            host.total_memory
        )));
    }
    if total_cpus > host.total_cpus {
        return Err(FrameworkError::validation(format!(
            "topology requests {total_cpus} cpus but the host only has {}",
            host.total_cpus
        )));
    }

    debug!(
        total_memory = %MemorySize::from_bytes(total_memory),
        total_cpus,
        "topology allocation fits the host budget"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use integration_framework_config::{ClusterConfig, ProviderKind};

    use super::*;

    fn host_16g_4cpu() -> SystemResourceInfo {
        SystemResourceInfo {
            total_memory: MemorySize::from_gibibytes(16),
            available_memory: MemorySize::from_gibibytes(12),
            total_cpus: 4,
        }
    }

    #[test]
    fn three_clusters_on_a_16g_host_get_about_4g_and_1_cpu() {
        let plan = plan_resources(&host_16g_4cpu(), 3);
        // 80% of 16Gi split three ways, just above 4Gi.
        assert!(plan.memory_per_cluster >= MemorySize::from_gibibytes(4));
        assert!(plan.memory_per_cluster < MemorySize::from_gibibytes(5));
        assert_eq!(plan.cpus_per_cluster, 1);

        // Summed allocation never exceeds the host totals.
        assert!(plan.memory_per_cluster.as_bytes() * 3 <= MemorySize::from_gibibytes(16).as_bytes());
        assert!(plan.cpus_per_cluster * 3 <= 4);
    }

    #[test]
    fn small_hosts_floor_at_the_minimum() {
        let host = SystemResourceInfo {
            total_memory: MemorySize::from_gibibytes(4),
            available_memory: MemorySize::from_gibibytes(3),
            total_cpus: 2,
        };
        let plan = plan_resources(&host, 4);
        assert_eq!(plan.memory_per_cluster, MemorySize::from_gibibytes(2));
        assert_eq!(plan.cpus_per_cluster, 1);
    }

    #[test]
    fn big_hosts_cap_at_the_maximum() {
        let host = SystemResourceInfo {
            total_memory: MemorySize::from_gibibytes(128),
            available_memory: MemorySize::from_gibibytes(100),
            total_cpus: 32,
        };
        let plan = plan_resources(&host, 2);
        assert_eq!(plan.memory_per_cluster, MemorySize::from_gibibytes(8));
        assert_eq!(plan.cpus_per_cluster, 4);
    }

    #[test]
    fn apply_plan_fills_unset_allocations() {
        let mut topology = ClusterTopology::single(ClusterConfig::new("p", ProviderKind::Kind))
            .with_remote("east", ClusterConfig::new("r1", ProviderKind::Kind))
            .with_remote("west", ClusterConfig::new("r2", ProviderKind::Kind));

        let host = host_16g_4cpu();
        let plan = plan_resources(&host, topology.cluster_count());
        apply_plan(&mut topology, &host, &plan).unwrap();

        assert_eq!(topology.primary.options.memory, Some(plan.memory_per_cluster));
        assert_eq!(topology.primary.options.cpus, Some(CpuCount(1)));
        for remote in topology.remotes.values() {
            assert_eq!(remote.options.memory, Some(plan.memory_per_cluster));
        }
    }

    #[test]
    fn apply_plan_keeps_caller_settings() {
        let mut topology = ClusterTopology::single(
            ClusterConfig::new("p", ProviderKind::Kind)
                .with_memory(MemorySize::from_gibibytes(3))
                .with_cpus(2),
        );
        let host = host_16g_4cpu();
        let plan = plan_resources(&host, 1);
        apply_plan(&mut topology, &host, &plan).unwrap();

        assert_eq!(
            topology.primary.options.memory,
            Some(MemorySize::from_gibibytes(3))
        );
        assert_eq!(topology.primary.options.cpus, Some(CpuCount(2)));
    }

    #[test]
    fn apply_plan_rejects_oversubscription() {
        let mut topology = ClusterTopology::single(
            ClusterConfig::new("p", ProviderKind::Kind).with_memory(MemorySize::from_gibibytes(12)),
        )
        .with_remote(
            "east",
            ClusterConfig::new("r1", ProviderKind::Kind).with_memory(MemorySize::from_gibibytes(12)),
        );

        let host = host_16g_4cpu();
        let plan = plan_resources(&host, 2);
        let err = apply_plan(&mut topology, &host, &plan).unwrap_err();
        assert!(err.to_string().contains("host only has"));
    }
}
