//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the `PolicyProvider` outbound port.

mod policy_provider;
mod static_provider;

pub use policy_provider::{ChaincodePolicyProvider, GET_CHAINCODE_DATA, LIFECYCLE_CHAINCODE};
pub use static_provider::StaticPolicyProvider;
