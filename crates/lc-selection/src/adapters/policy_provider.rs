//! Chaincode Policy Provider
//!
//! Implements `PolicyProvider` by querying the lifecycle system chaincode on
//! the channel's target peers. Envelopes are cached per chaincode ID until
//! explicitly invalidated.

use crate::domain::{
    ChaincodeData, ChaincodeQuery, Peer, PolicyError, SignaturePolicyEnvelope, TargetFailure,
};
use crate::ports::outbound::{IdentityContext, PolicyProvider, QueryTransport};
use async_trait::async_trait;
use lc_telemetry::metrics::POLICY_QUERIES;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle system chaincode holding deployment metadata
pub const LIFECYCLE_CHAINCODE: &str = "lscc";

/// Lifecycle function returning a chaincode's `ChaincodeData`
pub const GET_CHAINCODE_DATA: &str = "getccdata";

/// Fetches endorsement policies from the channel's lifecycle chaincode.
///
/// Concurrent first lookups for the same chaincode may each send a query;
/// the resolver cache above already collapses those in practice.
pub struct ChaincodePolicyProvider {
    channel_id: String,
    targets: Vec<Peer>,
    transport: Arc<dyn QueryTransport>,
    identity: Arc<dyn IdentityContext>,
    /// chaincode_id -> decoded envelope
    policies: RwLock<HashMap<String, Arc<SignaturePolicyEnvelope>>>,
}

impl ChaincodePolicyProvider {
    /// Provider querying `targets` in order.
    pub fn new(
        channel_id: impl Into<String>,
        targets: Vec<Peer>,
        transport: Arc<dyn QueryTransport>,
        identity: Arc<dyn IdentityContext>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            targets,
            transport,
            identity,
            policies: RwLock::new(HashMap::new()),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn targets(&self) -> &[Peer] {
        &self.targets
    }

    /// Drop the cached policy for `chaincode_id`; returns whether one was cached.
    ///
    /// Call after a chaincode upgrade so the next lookup re-queries.
    pub fn invalidate(&self, chaincode_id: &str) -> bool {
        let removed = self.policies.write().remove(chaincode_id).is_some();
        if removed {
            debug!(channel_id = %self.channel_id, chaincode_id, "Invalidated cached policy");
        }
        removed
    }

    pub fn cached_count(&self) -> usize {
        self.policies.read().len()
    }

    fn lifecycle_query(&self, chaincode_id: &str) -> ChaincodeQuery {
        ChaincodeQuery::new(
            LIFECYCLE_CHAINCODE,
            GET_CHAINCODE_DATA,
            vec![
                self.channel_id.as_bytes().to_vec(),
                chaincode_id.as_bytes().to_vec(),
            ],
            self.identity.serialized_identity(),
        )
    }

    /// First successful payload across targets, in order
    async fn query_targets(&self, query: &ChaincodeQuery) -> Result<Vec<u8>, PolicyError> {
        if self.targets.is_empty() {
            return Err(PolicyError::NoTargets);
        }

        let mut failures = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            match self.transport.query(target, query).await {
                Ok(payload) => {
                    POLICY_QUERIES.with_label_values(&["success"]).inc();
                    return Ok(payload);
                }
                Err(err) => {
                    POLICY_QUERIES.with_label_values(&["transport_error"]).inc();
                    debug!(
                        channel_id = %self.channel_id,
                        peer = %target.endpoint,
                        error = %err,
                        "Policy query failed, trying next target"
                    );
                    failures.push(TargetFailure {
                        peer: target.endpoint.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        warn!(
            channel_id = %self.channel_id,
            targets = failures.len(),
            "Policy query failed on every target"
        );
        Err(PolicyError::AllTargetsFailed(failures))
    }

    async fn fetch(&self, chaincode_id: &str) -> Result<SignaturePolicyEnvelope, PolicyError> {
        let query = self.lifecycle_query(chaincode_id);
        let payload = self.query_targets(&query).await?;

        let decoded = ChaincodeData::decode(&payload).and_then(|data| data.policy_envelope());
        if decoded.is_err() {
            POLICY_QUERIES.with_label_values(&["malformed"]).inc();
        }
        decoded
    }
}

#[async_trait]
impl PolicyProvider for ChaincodePolicyProvider {
    async fn get_chaincode_policy(
        &self,
        chaincode_id: &str,
    ) -> Result<Arc<SignaturePolicyEnvelope>, PolicyError> {
        let cached = self.policies.read().get(chaincode_id).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let envelope = Arc::new(self.fetch(chaincode_id).await?);
        debug!(
            channel_id = %self.channel_id,
            chaincode_id,
            orgs = envelope.identities.len(),
            "Fetched chaincode endorsement policy"
        );

        let stored = Arc::clone(
            self.policies
                .write()
                .entry(chaincode_id.to_string())
                .or_insert(envelope),
        );
        Ok(stored)
    }
}

impl std::fmt::Debug for ChaincodePolicyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaincodePolicyProvider")
            .field("channel_id", &self.channel_id)
            .field("targets", &self.targets)
            .field("cached", &self.cached_count())
            .finish_non_exhaustive()
    }
}
