//! Error types for endorser selection

use super::entities::MspId;
use std::fmt;
use thiserror::Error;

/// All errors surfaced by the selection service.
///
/// `Clone` so a single failed resolver initialization can be handed to every
/// caller that was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// Caller named no chaincodes
    #[error("No chaincode IDs provided")]
    NoChaincodeIds,

    /// Policy could not be retrieved or compiled for an invoked chaincode
    #[error(
        "Endorsement policy unavailable for chaincode '{chaincode_id}' on channel '{channel_id}': {source}"
    )]
    Policy {
        channel_id: String,
        chaincode_id: String,
        #[source]
        source: PolicyError,
    },

    /// A required organization has no live peers
    #[error("No peers for organization {0}")]
    NoPeersForOrganization(MspId),

    /// An N-of-M requirement had fewer than N satisfiable children
    #[error(
        "Insufficient satisfying children: required {required}, satisfied {satisfied} [{}]",
        .reasons.join("; ")
    )]
    InsufficientSatisfyingChildren {
        required: usize,
        satisfied: usize,
        reasons: Vec<String>,
    },

    /// Candidate generation exceeded the configured bound
    #[error("Candidate peer group limit exceeded: more than {limit} groups")]
    TooManyCandidateGroups { limit: usize },

    /// No candidate group can be satisfied by the current live peers
    #[error("Endorsement policy unsatisfiable by live peers: {reason}")]
    Unsatisfiable { reason: String },

    /// Discovery collaborator failed
    #[error("Peer discovery failed: {0}")]
    Discovery(String),

    /// Resolver cache was closed
    #[error("Selection service is closed")]
    CacheClosed,
}

/// Errors retrieving or decoding a chaincode's endorsement policy
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// No target peers configured for the channel
    #[error("No target peers configured for policy queries")]
    NoTargets,

    /// Every configured target failed
    #[error("Policy query failed on all {} target peers: {}", .0.len(), join_failures(.0))]
    AllTargetsFailed(Vec<TargetFailure>),

    /// Chaincode data could not be decoded
    #[error("Malformed chaincode data: {0}")]
    MalformedResponse(String),

    /// Embedded signature policy could not be decoded
    #[error("Malformed signature policy: {0}")]
    MalformedPolicy(String),

    /// Policy decoded but is structurally invalid
    #[error("Invalid signature policy: {0}")]
    InvalidPolicy(String),
}

/// One target peer's failure during a policy query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    /// Endpoint of the peer
    pub peer: String,
    /// Failure reason reported by the transport
    pub reason: String,
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.peer, self.reason)
    }
}

fn join_failures(failures: &[TargetFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Transport-level failure querying a peer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    #[error("Query rejected with status {status}: {message}")]
    Rejected { status: i32, message: String },

    #[error("Query timed out")]
    Timeout,
}

/// Discovery collaborator failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Discovery unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}
