use std::sync::Arc;

use scylla::client::execution_profile::{ExecutionProfile, ExecutionProfileHandle};
use scylla::policies::load_balancing::{DefaultPolicy, LoadBalancingPolicy};

use crate::constants::USED_HOSTS_PER_REMOTE_DC;

/// Token-aware routing over a datacenter-local round-robin.
///
/// The driver has no per-datacenter host cap, so any non-zero
/// `used_hosts_per_remote_dc` turns into permitted remote-datacenter failover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPolicy {
    pub local_datacenter: Option<String>,
    pub used_hosts_per_remote_dc: usize,
    pub token_aware: bool,
}

impl RoutingPolicy {
    pub fn token_aware_dc_local(local_datacenter: Option<String>) -> Self {
        Self {
            local_datacenter,
            used_hosts_per_remote_dc: USED_HOSTS_PER_REMOTE_DC,
            token_aware: true,
        }
    }

    pub fn permits_remote_dc(&self) -> bool {
        self.used_hosts_per_remote_dc > 0
    }

    pub fn load_balancing_policy(&self) -> Arc<dyn LoadBalancingPolicy> {
        let mut builder = DefaultPolicy::builder()
            .token_aware(self.token_aware)
            .permit_dc_failover(self.permits_remote_dc());

        if let Some(dc) = &self.local_datacenter {
            builder = builder.prefer_datacenter(dc.clone());
        }

        builder.build()
    }

    pub fn execution_profile_handle(&self) -> ExecutionProfileHandle {
        ExecutionProfile::builder()
            .load_balancing_policy(self.load_balancing_policy())
            .build()
            .into_handle()
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self::token_aware_dc_local(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routing_is_token_aware_with_one_remote_host() {
        let policy = RoutingPolicy::default();
        assert!(policy.token_aware);
        assert_eq!(policy.used_hosts_per_remote_dc, 1);
        assert!(policy.permits_remote_dc());
        assert_eq!(policy.local_datacenter, None);
    }

    #[test]
    fn test_local_datacenter_is_kept() {
        let policy = RoutingPolicy::token_aware_dc_local(Some("eu-west".into()));
        assert_eq!(policy.local_datacenter.as_deref(), Some("eu-west"));

        let built = format!("{:?}", policy.load_balancing_policy());
        assert!(built.contains("eu-west"), "{}", built);
        assert!(built.contains("token_aware: true"), "{}", built);
        assert!(built.contains("permit_dc_failover: true"), "{}", built);
    }

    #[test]
    fn test_zero_remote_hosts_disables_failover() {
        let policy = RoutingPolicy {
            used_hosts_per_remote_dc: 0,
            ..RoutingPolicy::default()
        };
        assert!(!policy.permits_remote_dc());

        let built = format!("{:?}", policy.load_balancing_policy());
        assert!(built.contains("permit_dc_failover: false"), "{}", built);
    }
}
