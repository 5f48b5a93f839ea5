//! Per-call selection options

use crate::domain::entities::Peer;
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

/// Keeps a live peer when it returns true
pub type PeerFilter = Arc<dyn Fn(&Peer) -> bool + Send + Sync>;

/// Reorders live peers before resolution
pub type PeerSorter = Arc<dyn Fn(&mut [Peer]) + Send + Sync>;

/// Caller hooks applied to live peers before resolution
#[derive(Clone, Default)]
pub struct SelectionOptions {
    peer_filter: Option<PeerFilter>,
    peer_sorter: Option<PeerSorter>,
}

impl SelectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peer_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Peer) -> bool + Send + Sync + 'static,
    {
        self.peer_filter = Some(Arc::new(filter));
        self
    }

    pub fn with_peer_sorter<S>(mut self, sorter: S) -> Self
    where
        S: Fn(&mut [Peer]) + Send + Sync + 'static,
    {
        self.peer_sorter = Some(Arc::new(sorter));
        self
    }

    /// Filtered, sorted copy of `peers`; the input is left untouched
    pub fn apply(&self, peers: &[Peer]) -> Vec<Peer> {
        let mut selected: Vec<Peer> = match &self.peer_filter {
            Some(filter) => peers.iter().filter(|p| filter(p)).cloned().collect(),
            None => peers.to_vec(),
        };
        if let Some(sorter) = &self.peer_sorter {
            sorter(&mut selected);
        }
        selected
    }
}

impl fmt::Debug for SelectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionOptions")
            .field("peer_filter", &self.peer_filter.is_some())
            .field("peer_sorter", &self.peer_sorter.is_some())
            .finish()
    }
}

/// Highest ledger height first; peers without a height go last.
/// Stable, so equal heights keep discovery order.
pub fn sort_by_ledger_height(peers: &mut [Peer]) {
    peers.sort_by_key(|p| Reverse(p.ledger_height));
}
