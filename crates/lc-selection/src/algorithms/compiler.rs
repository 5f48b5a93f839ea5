//! # Policy Compiler
//!
//! Turns a signature policy plus its principal table into a
//! [`GroupRetriever`]: an immutable evaluation tree that is compiled once
//! (and cached with its resolver) but evaluated against the current live
//! peers on every resolution.
//!
//! ## Evaluation rules
//!
//! - `SignedBy(i)`: the organization of `principals[i]` must have at least one
//!   live peer; yields a single leaf holding all of them.
//! - `NOutOf(n, rules)`: children that fail are discarded; with fewer than `n`
//!   survivors the node fails. Otherwise every size-`n` subset of survivors is
//!   taken, the cartesian product of the subset's candidate sets is formed and
//!   each tuple is unioned into one composite candidate.

use super::combinations::{union_product, Subsets};
use crate::config::DEFAULT_MAX_CANDIDATE_GROUPS;
use crate::domain::{
    CandidateSet, Group, MspId, OrgPeers, PolicyError, Principal, SelectionError,
    SignaturePolicy, SignaturePolicyEnvelope,
};
use std::collections::BTreeSet;
use tracing::trace;

/// Compiled requirement node
#[derive(Clone, Debug, PartialEq, Eq)]
enum RetrieverNode {
    SignedBy(MspId),
    NOutOf {
        n: usize,
        children: Vec<RetrieverNode>,
    },
}

/// Deferred candidate-group producer for one or more policies
#[derive(Clone, Debug)]
pub struct GroupRetriever {
    root: RetrieverNode,
    max_candidate_groups: usize,
}

impl GroupRetriever {
    /// Evaluate against the current org -> peers mapping
    pub fn retrieve(&self, org_peers: &OrgPeers) -> Result<CandidateSet, SelectionError> {
        evaluate(&self.root, org_peers, self.max_candidate_groups)
    }

    /// Conjunction of several retrievers: every one must be satisfied by the
    /// same chosen peer set. Returns `None` for an empty input.
    pub fn all_of(retrievers: Vec<GroupRetriever>) -> Option<GroupRetriever> {
        let max_candidate_groups = retrievers.iter().map(|r| r.max_candidate_groups).min()?;
        let mut children: Vec<RetrieverNode> = retrievers.into_iter().map(|r| r.root).collect();

        if children.len() == 1 {
            return children.pop().map(|root| GroupRetriever {
                root,
                max_candidate_groups,
            });
        }

        Some(GroupRetriever {
            root: RetrieverNode::NOutOf {
                n: children.len(),
                children,
            },
            max_candidate_groups,
        })
    }

    /// Organizations referenced anywhere in the tree
    pub fn required_orgs(&self) -> BTreeSet<MspId> {
        let mut orgs = BTreeSet::new();
        collect_orgs(&self.root, &mut orgs);
        orgs
    }

    pub fn max_candidate_groups(&self) -> usize {
        self.max_candidate_groups
    }
}

fn collect_orgs(node: &RetrieverNode, out: &mut BTreeSet<MspId>) {
    match node {
        RetrieverNode::SignedBy(msp_id) => {
            out.insert(msp_id.clone());
        }
        RetrieverNode::NOutOf { children, .. } => {
            children.iter().for_each(|c| collect_orgs(c, out));
        }
    }
}

fn evaluate(
    node: &RetrieverNode,
    org_peers: &OrgPeers,
    limit: usize,
) -> Result<CandidateSet, SelectionError> {
    match node {
        RetrieverNode::SignedBy(msp_id) => {
            let peers = org_peers.peers_of(msp_id);
            if peers.is_empty() {
                return Err(SelectionError::NoPeersForOrganization(msp_id.clone()));
            }
            Ok(CandidateSet::single(Group::leaf(peers.to_vec())))
        }
        RetrieverNode::NOutOf { n, children } => {
            let mut satisfied = Vec::with_capacity(children.len());
            let mut reasons = Vec::new();

            for child in children {
                match evaluate(child, org_peers, limit) {
                    Ok(candidates) => satisfied.push(candidates),
                    Err(err @ SelectionError::TooManyCandidateGroups { .. }) => return Err(err),
                    Err(err) => {
                        trace!(error = %err, "Discarding unsatisfiable policy branch");
                        reasons.push(err.to_string());
                    }
                }
            }

            if satisfied.len() < *n {
                return Err(SelectionError::InsufficientSatisfyingChildren {
                    required: *n,
                    satisfied: satisfied.len(),
                    reasons,
                });
            }

            let mut out = CandidateSet::new();
            let mut generated = 0usize;
            for subset in Subsets::new(satisfied.len(), *n) {
                let sets: Vec<&CandidateSet> = subset.iter().map(|&i| &satisfied[i]).collect();
                union_product(&sets, &mut out, &mut generated, limit)?;
            }
            Ok(out)
        }
    }
}

/// Compiles signature policies into group retrievers
#[derive(Clone, Debug)]
pub struct PolicyCompiler {
    max_candidate_groups: usize,
}

impl Default for PolicyCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CANDIDATE_GROUPS)
    }
}

impl PolicyCompiler {
    pub fn new(max_candidate_groups: usize) -> Self {
        Self {
            max_candidate_groups,
        }
    }

    /// Compile an envelope's rule against its identity table
    pub fn compile(
        &self,
        envelope: &SignaturePolicyEnvelope,
    ) -> Result<GroupRetriever, PolicyError> {
        self.compile_policy(&envelope.rule, &envelope.identities)
    }

    /// Compile a policy tree; principal indices and thresholds are validated
    /// here so evaluation never has to.
    pub fn compile_policy(
        &self,
        policy: &SignaturePolicy,
        principals: &[Principal],
    ) -> Result<GroupRetriever, PolicyError> {
        Ok(GroupRetriever {
            root: compile_node(policy, principals)?,
            max_candidate_groups: self.max_candidate_groups,
        })
    }
}

fn compile_node(
    policy: &SignaturePolicy,
    principals: &[Principal],
) -> Result<RetrieverNode, PolicyError> {
    match policy {
        SignaturePolicy::SignedBy(index) => principals
            .get(*index)
            .map(|p| RetrieverNode::SignedBy(p.msp_id.clone()))
            .ok_or_else(|| {
                PolicyError::InvalidPolicy(format!(
                    "principal index {} out of range ({} principals)",
                    index,
                    principals.len()
                ))
            }),
        SignaturePolicy::NOutOf { n, rules } => {
            // 0-of-M requires no signatures; rejected as malformed
            if *n == 0 {
                return Err(PolicyError::InvalidPolicy(
                    "n-out-of threshold must be at least 1".to_string(),
                ));
            }
            if *n > rules.len() {
                return Err(PolicyError::InvalidPolicy(format!(
                    "n-out-of threshold {} exceeds {} rules",
                    n,
                    rules.len()
                )));
            }
            let children = rules
                .iter()
                .map(|rule| compile_node(rule, principals))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RetrieverNode::NOutOf { n: *n, children })
        }
    }
}
