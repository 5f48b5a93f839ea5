//! # Domain Invariants
//!
//! Rules every resolved peer group must satisfy.

use super::entities::MspId;
use super::group::{Group, PeerGroup};
use super::policy::SignaturePolicyEnvelope;
use std::collections::BTreeSet;

/// Invariant: every peer in a resolved group belongs to an organization the
/// policy requires.
pub fn invariant_peers_from_required_orgs(
    group: &PeerGroup,
    required: &BTreeSet<MspId>,
) -> bool {
    group.peers().iter().all(|p| required.contains(&p.msp_id))
}

/// Organizations required by any of the given envelopes
pub fn required_orgs<'a>(
    envelopes: impl IntoIterator<Item = &'a SignaturePolicyEnvelope>,
) -> BTreeSet<MspId> {
    envelopes
        .into_iter()
        .flat_map(SignaturePolicyEnvelope::required_orgs)
        .collect()
}

/// Invariant: conjunction is commutative and idempotent.
pub fn invariant_union_laws(a: &Group, b: &Group) -> bool {
    a.union(b) == b.union(a) && a.union(a) == *a
}

/// Invariant: a conjoined group covers every peer of both sides.
pub fn invariant_union_superset(a: &Group, b: &Group) -> bool {
    let joined = a.union(b);
    let peers = joined.peer_set();
    a.peer_set().is_subset(&peers) && b.peer_set().is_subset(&peers)
}
