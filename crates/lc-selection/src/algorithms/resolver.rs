//! # Peer Group Resolver
//!
//! Evaluates the combined group retriever for all invoked chaincodes against
//! the live peers, realizes concrete peer groups and hands them to the
//! load-balance policy.

use super::compiler::GroupRetriever;
use super::load_balance::LoadBalancePolicy;
use crate::domain::{OrgPeers, PeerGroup, SelectionError};
use lc_telemetry::metrics::CANDIDATE_GROUPS;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Resolves endorsement targets for one (channel, chaincode set).
///
/// Stateless across calls apart from the load-balance policy's cursor.
pub struct PeerGroupResolver {
    retriever: GroupRetriever,
    balancer: Arc<dyn LoadBalancePolicy>,
}

impl PeerGroupResolver {
    pub fn new(retriever: GroupRetriever, balancer: Arc<dyn LoadBalancePolicy>) -> Self {
        Self {
            retriever,
            balancer,
        }
    }

    pub fn retriever(&self) -> &GroupRetriever {
        &self.retriever
    }

    /// Every concrete peer group satisfying the combined policy, deduplicated
    /// and in generation order.
    pub fn candidate_groups(&self, org_peers: &OrgPeers) -> Result<Vec<PeerGroup>, SelectionError> {
        let candidates = self.retriever.retrieve(org_peers).map_err(|err| match err {
            SelectionError::TooManyCandidateGroups { .. } => err,
            other => SelectionError::Unsatisfiable {
                reason: other.to_string(),
            },
        })?;

        let limit = self.retriever.max_candidate_groups();
        let mut seen = HashSet::new();
        let mut groups = Vec::new();
        for candidate in &candidates {
            if candidate.realization_bound() > limit {
                return Err(SelectionError::TooManyCandidateGroups { limit });
            }
            for concrete in candidate.realize() {
                if seen.insert(concrete.clone()) {
                    groups.push(concrete);
                }
            }
            if groups.len() > limit {
                return Err(SelectionError::TooManyCandidateGroups { limit });
            }
        }

        Ok(groups)
    }

    /// Pick one concrete peer group for the current live peers
    pub fn resolve(&self, org_peers: &OrgPeers) -> Result<PeerGroup, SelectionError> {
        let groups = self.candidate_groups(org_peers)?;
        CANDIDATE_GROUPS.observe(groups.len() as f64);

        let chosen = self
            .balancer
            .choose(&groups)
            .cloned()
            .ok_or_else(|| SelectionError::Unsatisfiable {
                reason: "no candidate peer group".to_string(),
            })?;

        debug!(
            candidates = groups.len(),
            chosen = %chosen,
            "Resolved endorsement peer group"
        );
        Ok(chosen)
    }
}

impl fmt::Debug for PeerGroupResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerGroupResolver")
            .field("retriever", &self.retriever)
            .field("balancer", &self.balancer)
            .finish()
    }
}
