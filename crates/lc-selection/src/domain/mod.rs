//! Domain module for endorser selection
//!
//! Contains entities, policies, peer groups, errors, and invariants.

pub mod entities;
pub mod errors;
pub mod group;
pub mod invariants;
pub mod policy;

pub use entities::*;
pub use errors::*;
pub use group::*;
pub use invariants::*;
pub use policy::*;
