//! # Endorser Selection
//!
//! Chooses which peers should endorse a transaction so that their combined
//! signatures satisfy the endorsement policies of every invoked chaincode.
//!
//! **Architecture:** Hexagonal (Domain + Ports/Adapters)
//!
//! ## Pipeline
//!
//! 1. Fetch each chaincode's signature policy from the lifecycle chaincode
//! 2. Compile it once into a [`GroupRetriever`]
//! 3. Conjoin the retrievers of all invoked chaincodes into one resolver,
//!    cached per (channel, sorted chaincode IDs)
//! 4. Per call: evaluate against live peers, realize concrete peer groups,
//!    and let the load-balance policy pick one
//!
//! ## Guarantees
//!
//! | Property | Where |
//! |----------|-------|
//! | Deterministic candidates for equal inputs | `algorithms::compiler` |
//! | One resolver build per key, shared by concurrent callers | `cache` |
//! | Key independent of chaincode order | `domain::entities::ResolverKey` |
//! | Bounded candidate generation | `SelectionConfig::max_candidate_groups` |
//!
//! ## Module Structure
//!
//! ```text
//! lc-selection/
//! ├── domain/        # Peers, policies, groups, errors
//! ├── algorithms/    # Policy compiler, combinatorics, resolver, load balancing
//! ├── cache/         # Lazy single-flight keyed cache with expiry
//! ├── ports/         # API trait + collaborator traits
//! ├── adapters/      # Lifecycle-chaincode and static policy providers
//! └── application/   # SelectionService and per-call options
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{ChaincodePolicyProvider, StaticPolicyProvider};
pub use algorithms::{
    GroupRetriever, LoadBalancePolicy, PeerGroupResolver, PolicyCompiler, RandomLoadBalancer,
    RoundRobinLoadBalancer,
};
pub use application::{sort_by_ledger_height, SelectionOptions, SelectionService};
pub use cache::{CacheError, Expiration, LazyCache};
pub use config::{LoadBalanceStrategy, SelectionConfig};
pub use domain::*;
pub use ports::{
    DiscoveryService, EndorserSelectionApi, IdentityContext, PolicyProvider, QueryTransport,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
