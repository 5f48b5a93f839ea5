//! Application layer: the selection service and its per-call options.

pub mod options;
pub mod service;

pub use options::{sort_by_ledger_height, PeerFilter, PeerSorter, SelectionOptions};
pub use service::SelectionService;
