//! Shared builders for integration tests and benchmarks.

use lc_selection::ports::outbound::mocks::{MockTransport, StaticDiscovery, StaticIdentity};
use lc_selection::{
    ChaincodeData, ChaincodePolicyProvider, Peer, PolicyError, Principal, SelectionConfig,
    SelectionService, SignaturePolicy, SignaturePolicyEnvelope,
};
use std::sync::Arc;

/// Channel name used throughout the suite
pub const CHANNEL: &str = "mychannel";

/// Endpoint that answers lifecycle queries
pub const LIFECYCLE_PEER: &str = "peer0.org1";

/// `n` of the member principals of `orgs`
pub fn n_of(n: usize, orgs: &[&str]) -> SignaturePolicyEnvelope {
    let rules = (0..orgs.len()).map(SignaturePolicy::signed_by).collect();
    SignaturePolicyEnvelope::new(
        SignaturePolicy::n_out_of(n, rules),
        orgs.iter().map(|o| Principal::member(*o)).collect(),
    )
}

pub fn one_of(orgs: &[&str]) -> SignaturePolicyEnvelope {
    n_of(1, orgs)
}

pub fn all_of(orgs: &[&str]) -> SignaturePolicyEnvelope {
    n_of(orgs.len(), orgs)
}

/// `per_org` peers for each of `orgs` organizations, named
/// `peer{j}.org{i}` in `Org{i}MSP`
pub fn org_peers(orgs: usize, per_org: usize) -> Vec<Peer> {
    (1..=orgs)
        .flat_map(|i| (0..per_org).map(move |j| Peer::new(format!("peer{j}.org{i}"), format!("Org{i}MSP"))))
        .collect()
}

/// Lifecycle response carrying `envelope`
pub fn chaincode_payload(name: &str, envelope: &SignaturePolicyEnvelope) -> Result<Vec<u8>, PolicyError> {
    ChaincodeData::new(name, "1.0", envelope)?.encode()
}

/// A channel wired end to end: lifecycle provider over a mock transport,
/// static discovery and the selection service.
pub struct Channel {
    pub service: SelectionService,
    pub provider: Arc<ChaincodePolicyProvider>,
    pub transport: Arc<MockTransport>,
    pub discovery: Arc<StaticDiscovery>,
}

impl Channel {
    /// Serve `policies` from [`LIFECYCLE_PEER`] and expose `peers` as live.
    pub fn new(
        config: SelectionConfig,
        transport: MockTransport,
        policies: &[(&str, SignaturePolicyEnvelope)],
        peers: Vec<Peer>,
    ) -> Result<Self, PolicyError> {
        let transport = Arc::new(transport);
        for (chaincode_id, envelope) in policies {
            transport.respond_to(LIFECYCLE_PEER, chaincode_id, chaincode_payload(chaincode_id, envelope)?);
        }

        let provider = Arc::new(ChaincodePolicyProvider::new(
            CHANNEL,
            vec![Peer::new(LIFECYCLE_PEER, "Org1MSP")],
            transport.clone(),
            Arc::new(StaticIdentity::new("Org1MSP")),
        ));
        let discovery = Arc::new(StaticDiscovery::new(peers));
        let service = SelectionService::with_config(CHANNEL, config, discovery.clone(), provider.clone());

        Ok(Self {
            service,
            provider,
            transport,
            discovery,
        })
    }
}
