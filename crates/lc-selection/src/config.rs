//! Configuration for the endorser selection service

use crate::cache::Expiration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default resolver lifetime: 30 minutes
pub const DEFAULT_RESOLVER_CACHE_TTL_SECS: u64 = 1800;

/// Default bound on generated candidate groups
pub const DEFAULT_MAX_CANDIDATE_GROUPS: usize = 10_000;

/// How a resolver picks one peer group among the candidates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// Uniformly random per call
    #[default]
    Random,
    /// Cycle through candidates, one cursor per resolver
    RoundRobin,
}

/// Selection configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Resolver cache TTL in seconds (0 disables expiry)
    pub resolver_cache_ttl_secs: u64,
    /// Recompute resolvers in the background every TTL instead of lazily
    /// on first access after expiry
    pub refresh_resolvers: bool,
    /// Strategy used by every resolver created by the service
    pub load_balance: LoadBalanceStrategy,
    /// Upper bound on candidate groups per resolution (anti-explosion)
    pub max_candidate_groups: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            resolver_cache_ttl_secs: DEFAULT_RESOLVER_CACHE_TTL_SECS,
            refresh_resolvers: false,
            load_balance: LoadBalanceStrategy::default(),
            max_candidate_groups: DEFAULT_MAX_CANDIDATE_GROUPS,
        }
    }
}

impl SelectionConfig {
    pub fn resolver_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.resolver_cache_ttl_secs)
    }

    /// Expiration mode for the resolver cache
    pub fn expiration(&self) -> Expiration {
        if self.resolver_cache_ttl_secs == 0 {
            Expiration::Never
        } else if self.refresh_resolvers {
            Expiration::Refresh(self.resolver_cache_ttl())
        } else {
            Expiration::Absolute(self.resolver_cache_ttl())
        }
    }
}
