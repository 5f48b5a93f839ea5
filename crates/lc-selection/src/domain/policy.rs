//! Signature policies and the chaincode metadata that carries them
//!
//! A policy is a boolean tree over indices into a principal table:
//! `SignedBy(i)` leaves and `NOutOf { n, rules }` internal nodes.
//!
//! On the wire the tree is a flat post-order node list whose internal nodes
//! name their children by index, root last. Decoding rebuilds the tree
//! without recursion and rejects payloads over [`MAX_POLICY_BYTES`] or
//! nesting deeper than [`MAX_POLICY_DEPTH`].

use super::entities::MspId;
use super::errors::PolicyError;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest encoded policy envelope accepted
pub const MAX_POLICY_BYTES: u64 = 1 << 20;

/// Largest encoded lifecycle response accepted
pub const MAX_CHAINCODE_DATA_BYTES: u64 = MAX_POLICY_BYTES + (64 << 10);

/// Deepest policy nesting accepted; a lone `SignedBy` has depth 1
pub const MAX_POLICY_DEPTH: usize = 64;

fn wire_options(limit: u64) -> impl Options {
    bincode::DefaultOptions::new().with_limit(limit)
}

/// Role a principal must hold within its organization
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalRole {
    #[default]
    Member,
    Admin,
    Client,
    Peer,
}

/// Identity descriptor referenced by policy leaves
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub msp_id: MspId,
    pub role: PrincipalRole,
}

impl Principal {
    /// Principal with an explicit role
    pub fn new(msp_id: impl Into<MspId>, role: PrincipalRole) -> Self {
        Self {
            msp_id: msp_id.into(),
            role,
        }
    }

    /// Any member of the organization
    pub fn member(msp_id: impl Into<MspId>) -> Self {
        Self::new(msp_id, PrincipalRole::Member)
    }
}

/// Boolean signature requirement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "PolicyWire", try_from = "PolicyWire")]
pub enum SignaturePolicy {
    /// Signature from the principal at this index
    SignedBy(usize),
    /// At least `n` of the nested rules
    NOutOf { n: usize, rules: Vec<SignaturePolicy> },
}

impl SignaturePolicy {
    pub fn signed_by(index: usize) -> Self {
        Self::SignedBy(index)
    }

    pub fn n_out_of(n: usize, rules: Vec<SignaturePolicy>) -> Self {
        Self::NOutOf { n, rules }
    }

    /// Every rule must hold
    pub fn and(rules: Vec<SignaturePolicy>) -> Self {
        Self::NOutOf {
            n: rules.len(),
            rules,
        }
    }

    /// Any one rule must hold
    pub fn or(rules: Vec<SignaturePolicy>) -> Self {
        Self::NOutOf { n: 1, rules }
    }

    /// Principal indices referenced anywhere in the tree
    pub fn principal_indices(&self) -> BTreeSet<usize> {
        let mut indices = BTreeSet::new();
        self.collect_indices(&mut indices);
        indices
    }

    fn collect_indices(&self, out: &mut BTreeSet<usize>) {
        match self {
            Self::SignedBy(index) => {
                out.insert(*index);
            }
            Self::NOutOf { rules, .. } => rules.iter().for_each(|r| r.collect_indices(out)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum PolicyNode {
    SignedBy(usize),
    NOutOf { n: usize, rules: Vec<usize> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct PolicyWire {
    nodes: Vec<PolicyNode>,
}

fn flatten(policy: SignaturePolicy, nodes: &mut Vec<PolicyNode>) -> usize {
    let node = match policy {
        SignaturePolicy::SignedBy(index) => PolicyNode::SignedBy(index),
        SignaturePolicy::NOutOf { n, rules } => PolicyNode::NOutOf {
            n,
            rules: rules.into_iter().map(|rule| flatten(rule, nodes)).collect(),
        },
    };
    nodes.push(node);
    nodes.len() - 1
}

impl From<SignaturePolicy> for PolicyWire {
    fn from(policy: SignaturePolicy) -> Self {
        let mut nodes = Vec::new();
        flatten(policy, &mut nodes);
        Self { nodes }
    }
}

impl TryFrom<PolicyWire> for SignaturePolicy {
    type Error = String;

    fn try_from(wire: PolicyWire) -> Result<Self, Self::Error> {
        // (subtree, depth), taken once its parent claims it
        let mut built: Vec<Option<(SignaturePolicy, usize)>> = Vec::with_capacity(wire.nodes.len());

        for (index, node) in wire.nodes.into_iter().enumerate() {
            let entry = match node {
                PolicyNode::SignedBy(principal) => (SignaturePolicy::SignedBy(principal), 1),
                PolicyNode::NOutOf { n, rules } => {
                    let mut children = Vec::with_capacity(rules.len());
                    let mut depth = 0;
                    for child in rules {
                        if child >= index {
                            return Err(format!("policy node {index} references later node {child}"));
                        }
                        let (subtree, child_depth) = built[child]
                            .take()
                            .ok_or_else(|| format!("policy node {child} referenced twice"))?;
                        depth = depth.max(child_depth);
                        children.push(subtree);
                    }
                    if depth + 1 > MAX_POLICY_DEPTH {
                        return Err(format!(
                            "policy nesting exceeds {MAX_POLICY_DEPTH} levels"
                        ));
                    }
                    (
                        SignaturePolicy::NOutOf {
                            n,
                            rules: children,
                        },
                        depth + 1,
                    )
                }
            };
            built.push(Some(entry));
        }

        let (root, _) = built
            .pop()
            .flatten()
            .ok_or_else(|| "empty policy".to_string())?;
        if built.iter().any(Option::is_some) {
            return Err("policy has unreferenced nodes".to_string());
        }
        Ok(root)
    }
}

/// Policy tree plus the principal table it references
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePolicyEnvelope {
    pub version: i32,
    pub rule: SignaturePolicy,
    pub identities: Vec<Principal>,
}

impl SignaturePolicyEnvelope {
    pub fn new(rule: SignaturePolicy, identities: Vec<Principal>) -> Self {
        Self {
            version: 0,
            rule,
            identities,
        }
    }

    /// Organizations referenced by the rule
    pub fn required_orgs(&self) -> BTreeSet<MspId> {
        self.rule
            .principal_indices()
            .into_iter()
            .filter_map(|i| self.identities.get(i))
            .map(|p| p.msp_id.clone())
            .collect()
    }

    pub fn encode(&self) -> Result<Vec<u8>, PolicyError> {
        wire_options(MAX_POLICY_BYTES)
            .serialize(self)
            .map_err(|e| PolicyError::MalformedPolicy(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PolicyError> {
        wire_options(MAX_POLICY_BYTES)
            .deserialize(bytes)
            .map_err(|e| PolicyError::MalformedPolicy(e.to_string()))
    }
}

/// Chaincode metadata returned by the lifecycle system chaincode
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeData {
    pub name: String,
    pub version: String,
    /// Serialized `SignaturePolicyEnvelope`
    pub policy: Vec<u8>,
}

impl ChaincodeData {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        envelope: &SignaturePolicyEnvelope,
    ) -> Result<Self, PolicyError> {
        Ok(Self {
            name: name.into(),
            version: version.into(),
            policy: envelope.encode()?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, PolicyError> {
        wire_options(MAX_CHAINCODE_DATA_BYTES)
            .serialize(self)
            .map_err(|e| PolicyError::MalformedResponse(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PolicyError> {
        wire_options(MAX_CHAINCODE_DATA_BYTES)
            .deserialize(bytes)
            .map_err(|e| PolicyError::MalformedResponse(e.to_string()))
    }

    /// Decode the embedded endorsement policy
    pub fn policy_envelope(&self) -> Result<SignaturePolicyEnvelope, PolicyError> {
        if self.policy.is_empty() {
            return Err(PolicyError::MalformedPolicy(format!(
                "chaincode {} carries no endorsement policy",
                self.name
            )));
        }
        SignaturePolicyEnvelope::decode(&self.policy)
    }
}
