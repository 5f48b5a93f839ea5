//! # Load-Balance Policies
//!
//! Pick one concrete peer group among a resolver's candidates. The candidate
//! list may change size between calls as peers come and go, so neither
//! policy keeps an index that could fall out of bounds.

use crate::config::LoadBalanceStrategy;
use crate::domain::PeerGroup;
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Chooses one candidate per call
pub trait LoadBalancePolicy: Send + Sync + fmt::Debug {
    /// Pick a candidate, or `None` if there are none
    fn choose<'a>(&self, candidates: &'a [PeerGroup]) -> Option<&'a PeerGroup>;
}

/// Uniform random choice using the thread-local generator
#[derive(Debug, Default)]
pub struct RandomLoadBalancer;

impl LoadBalancePolicy for RandomLoadBalancer {
    fn choose<'a>(&self, candidates: &'a [PeerGroup]) -> Option<&'a PeerGroup> {
        if candidates.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        candidates.get(index)
    }
}

/// Deterministic cycling through candidates.
///
/// The cursor advances atomically, so concurrent callers never observe the
/// same slot twice in one cycle.
#[derive(Debug, Default)]
pub struct RoundRobinLoadBalancer {
    cursor: AtomicUsize,
}

impl RoundRobinLoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancePolicy for RoundRobinLoadBalancer {
    fn choose<'a>(&self, candidates: &'a [PeerGroup]) -> Option<&'a PeerGroup> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.get(index)
    }
}

impl LoadBalanceStrategy {
    /// Fresh policy instance; each resolver owns its own cursor
    pub fn build(self) -> Arc<dyn LoadBalancePolicy> {
        match self {
            Self::Random => Arc::new(RandomLoadBalancer),
            Self::RoundRobin => Arc::new(RoundRobinLoadBalancer::new()),
        }
    }
}
