//! In-memory policy provider for tests and offline use.

use crate::domain::{PolicyError, SignaturePolicyEnvelope};
use crate::ports::outbound::PolicyProvider;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Serves policies registered up front. Unknown chaincodes fail with
/// `AllTargetsFailed`, the same shape a real lookup reports.
#[derive(Debug, Default)]
pub struct StaticPolicyProvider {
    policies: RwLock<HashMap<String, Arc<SignaturePolicyEnvelope>>>,
    lookups: AtomicUsize,
}

impl StaticPolicyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with_policy(self, chaincode_id: impl Into<String>, envelope: SignaturePolicyEnvelope) -> Self {
        self.insert(chaincode_id, envelope);
        self
    }

    pub fn insert(&self, chaincode_id: impl Into<String>, envelope: SignaturePolicyEnvelope) {
        self.policies
            .write()
            .insert(chaincode_id.into(), Arc::new(envelope));
    }

    pub fn remove(&self, chaincode_id: &str) -> bool {
        self.policies.write().remove(chaincode_id).is_some()
    }

    /// Number of `get_chaincode_policy` calls served so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyProvider for StaticPolicyProvider {
    async fn get_chaincode_policy(
        &self,
        chaincode_id: &str,
    ) -> Result<Arc<SignaturePolicyEnvelope>, PolicyError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.policies.read().get(chaincode_id).cloned().ok_or_else(|| {
            PolicyError::AllTargetsFailed(vec![crate::domain::TargetFailure {
                peer: "static".to_string(),
                reason: format!("no policy registered for chaincode {chaincode_id}"),
            }])
        })
    }
}
