//! Peer groups
//!
//! A [`Group`] is a requirement shape over live peers: a leaf is "any one of
//! these peers of one organization", a composite is "all of these leaves at
//! once". Groups compare by their peer sets, so structurally different but
//! equivalent constructions collapse during deduplication.

use super::entities::{MspId, Peer};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Requirement over live peers
#[derive(Clone, Debug)]
pub enum Group {
    /// Interchangeable peers of one organization; any one satisfies it
    Leaf(Vec<Peer>),
    /// Every member group must be satisfied simultaneously
    Composite(Vec<Group>),
}

impl Group {
    /// Leaf over the given peers, dropping duplicates
    pub fn leaf(peers: Vec<Peer>) -> Self {
        let mut unique: Vec<Peer> = Vec::with_capacity(peers.len());
        for peer in peers {
            if !unique.contains(&peer) {
                unique.push(peer);
            }
        }
        Self::Leaf(unique)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Leaf peer lists, flattened through nested composites
    pub fn leaves(&self) -> Vec<&[Peer]> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a [Peer]>) {
        match self {
            Self::Leaf(peers) => out.push(peers.as_slice()),
            Self::Composite(members) => members.iter().for_each(|m| m.collect_leaves(out)),
        }
    }

    /// Conjunction of two groups.
    ///
    /// The result is the literal union of both sides' leaves; leaves with the
    /// same peer set appear once. Idempotent and commutative up to equality.
    pub fn union(&self, other: &Group) -> Group {
        let mut leaves: Vec<&[Peer]> = Vec::new();
        for leaf in self.leaves().into_iter().chain(other.leaves()) {
            if !leaves.iter().any(|known| same_peers(known, leaf)) {
                leaves.push(leaf);
            }
        }

        if leaves.len() == 1 {
            return Group::Leaf(leaves[0].to_vec());
        }
        Group::Composite(
            leaves
                .into_iter()
                .map(|leaf| Group::Leaf(leaf.to_vec()))
                .collect(),
        )
    }

    /// Every peer the group may draw on
    pub fn peer_set(&self) -> BTreeSet<&Peer> {
        self.leaves().into_iter().flatten().collect()
    }

    /// Organizations the group spans
    pub fn orgs(&self) -> BTreeSet<&MspId> {
        self.peer_set().into_iter().map(|p| &p.msp_id).collect()
    }

    /// Number of concrete peer groups `realize` can yield (saturating)
    pub fn realization_bound(&self) -> usize {
        self.leaves()
            .iter()
            .fold(1usize, |acc, leaf| acc.saturating_mul(leaf.len()))
    }

    /// Concrete endorsement targets: one peer from every leaf.
    ///
    /// Yields the cartesian product over leaves, deduplicated, in leaf order.
    pub fn realize(&self) -> Vec<PeerGroup> {
        let mut partials: Vec<Vec<Peer>> = vec![Vec::new()];

        for leaf in self.leaves() {
            let mut next = Vec::with_capacity(partials.len() * leaf.len());
            for partial in &partials {
                for peer in leaf {
                    let mut extended = partial.clone();
                    if !extended.contains(peer) {
                        extended.push(peer.clone());
                    }
                    next.push(extended);
                }
            }
            partials = next;
        }

        let mut seen = HashSet::new();
        partials
            .into_iter()
            .map(PeerGroup::new)
            .filter(|group| seen.insert(group.clone()))
            .collect()
    }
}

fn same_peers(a: &[Peer], b: &[Peer]) -> bool {
    a.len() == b.len() && a.iter().all(|p| b.contains(p))
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.peer_set() == other.peer_set()
    }
}

impl Eq for Group {}

impl Hash for Group {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for peer in self.peer_set() {
            peer.hash(state);
        }
    }
}

/// Deduplicated, order-stable set of candidate groups
#[derive(Clone, Debug, Default)]
pub struct CandidateSet {
    groups: Vec<Group>,
    seen: HashSet<Group>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set with a single candidate
    pub fn single(group: Group) -> Self {
        let mut set = Self::new();
        set.insert(group);
        set
    }

    /// Add a candidate; returns false if an equal group is already present
    pub fn insert(&mut self, group: Group) -> bool {
        if self.seen.contains(&group) {
            return false;
        }
        self.seen.insert(group.clone());
        self.groups.push(group);
        true
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Group> {
        self.groups.iter()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn contains(&self, group: &Group) -> bool {
        self.seen.contains(group)
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Group;
    type IntoIter = std::slice::Iter<'a, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Concrete peers proposed as joint endorsement targets
#[derive(Clone, Debug)]
pub struct PeerGroup {
    peers: Vec<Peer>,
}

impl PeerGroup {
    pub fn new(peers: Vec<Peer>) -> Self {
        Self { peers }
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn into_peers(self) -> Vec<Peer> {
        self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Sorted endpoints, for display and comparison in logs
    pub fn endpoints(&self) -> BTreeSet<&str> {
        self.peers.iter().map(|p| p.endpoint.as_str()).collect()
    }

    fn peer_set(&self) -> BTreeSet<&Peer> {
        self.peers.iter().collect()
    }
}

impl PartialEq for PeerGroup {
    fn eq(&self, other: &Self) -> bool {
        self.peer_set() == other.peer_set()
    }
}

impl Eq for PeerGroup {}

impl Hash for PeerGroup {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for peer in self.peer_set() {
            peer.hash(state);
        }
    }
}

impl fmt::Display for PeerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endpoints: Vec<&str> = self.endpoints().into_iter().collect();
        write!(f, "[{}]", endpoints.join(", "))
    }
}
