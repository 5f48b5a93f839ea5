//! Core entities for endorser selection
//!
//! Peers are supplied by the discovery collaborator and never owned here;
//! the selection engine only groups references to them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Organization (MSP) identifier
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MspId(pub String);

impl MspId {
    /// Create a new MSP identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MspId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MspId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MspId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A live network peer as reported by discovery
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Peer {
    /// Network endpoint (host:port), unique per peer
    pub endpoint: String,
    /// Organization the peer belongs to
    pub msp_id: MspId,
    /// Last known ledger height, if discovery reports one
    pub ledger_height: Option<u64>,
}

impl Peer {
    /// Create a peer without ledger height metadata
    pub fn new(endpoint: impl Into<String>, msp_id: impl Into<MspId>) -> Self {
        Self {
            endpoint: endpoint.into(),
            msp_id: msp_id.into(),
            ledger_height: None,
        }
    }

    /// Attach a ledger height
    pub fn with_ledger_height(mut self, height: u64) -> Self {
        self.ledger_height = Some(height);
        self
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.endpoint, self.msp_id)
    }
}

/// A chaincode invoked by a transaction
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChaincodeCall {
    /// Chaincode ID
    pub id: String,
    /// Private data collections touched by the call (carried, not interpreted)
    pub collections: Vec<String>,
}

impl ChaincodeCall {
    /// Call without collections
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collections: Vec::new(),
        }
    }

    /// Attach collection names
    pub fn with_collections(mut self, collections: Vec<String>) -> Self {
        self.collections = collections;
        self
    }
}

/// Live peers grouped by organization.
///
/// Peer order within an organization follows the input order, so a caller's
/// sorter decides which peer is preferred. Organizations iterate in MSP ID
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrgPeers {
    orgs: BTreeMap<MspId, Vec<Peer>>,
}

impl OrgPeers {
    /// Group a peer slice by organization, dropping duplicate endpoints
    pub fn from_peers(peers: &[Peer]) -> Self {
        peers.iter().cloned().collect()
    }

    /// Live peers of an organization (empty if none)
    pub fn peers_of(&self, msp_id: &MspId) -> &[Peer] {
        self.orgs.get(msp_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Organizations with at least one live peer
    pub fn orgs(&self) -> impl Iterator<Item = &MspId> {
        self.orgs.keys()
    }

    /// Total number of peers across organizations
    pub fn peer_count(&self) -> usize {
        self.orgs.values().map(Vec::len).sum()
    }

    /// Check if no peers are known
    pub fn is_empty(&self) -> bool {
        self.orgs.is_empty()
    }
}

impl FromIterator<Peer> for OrgPeers {
    fn from_iter<I: IntoIterator<Item = Peer>>(iter: I) -> Self {
        let mut orgs: BTreeMap<MspId, Vec<Peer>> = BTreeMap::new();
        for peer in iter {
            let members = orgs.entry(peer.msp_id.clone()).or_default();
            if !members.iter().any(|p| p.endpoint == peer.endpoint) {
                members.push(peer);
            }
        }
        Self { orgs }
    }
}

/// Cache key for a peer group resolver.
///
/// Chaincode IDs are sorted and de-duplicated so the order in which a caller
/// names them never changes the key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolverKey {
    channel_id: String,
    chaincode_ids: Vec<String>,
}

impl ResolverKey {
    /// Build the key for a set of chaincode calls on a channel
    pub fn new(channel_id: impl Into<String>, chaincodes: &[ChaincodeCall]) -> Self {
        let mut chaincode_ids: Vec<String> = chaincodes.iter().map(|cc| cc.id.clone()).collect();
        chaincode_ids.sort();
        chaincode_ids.dedup();
        Self {
            channel_id: channel_id.into(),
            chaincode_ids,
        }
    }

    /// Channel the key belongs to
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Sorted chaincode IDs
    pub fn chaincode_ids(&self) -> &[String] {
        &self.chaincode_ids
    }
}

impl fmt::Display for ResolverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel_id, self.chaincode_ids.join(","))
    }
}

/// Query sent to the lifecycle system chaincode
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChaincodeQuery {
    /// Target chaincode
    pub chaincode: String,
    /// Function to invoke
    pub function: String,
    /// Raw arguments
    pub args: Vec<Vec<u8>>,
    /// Serialized identity of the caller, used by the transport to sign
    pub creator: Vec<u8>,
}

impl ChaincodeQuery {
    /// Create a query
    pub fn new(
        chaincode: impl Into<String>,
        function: impl Into<String>,
        args: Vec<Vec<u8>>,
        creator: Vec<u8>,
    ) -> Self {
        Self {
            chaincode: chaincode.into(),
            function: function.into(),
            args,
            creator,
        }
    }
}
