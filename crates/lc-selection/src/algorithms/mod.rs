//! Algorithms for endorser selection
//!
//! - `compiler`: signature policy -> group retriever
//! - `combinations`: subset enumeration and union-product
//! - `resolver`: peer group resolution over live peers
//! - `load_balance`: choice among resolved candidates

pub mod combinations;
pub mod compiler;
pub mod load_balance;
pub mod resolver;

pub use compiler::{GroupRetriever, PolicyCompiler};
pub use load_balance::{LoadBalancePolicy, RandomLoadBalancer, RoundRobinLoadBalancer};
pub use resolver::PeerGroupResolver;
