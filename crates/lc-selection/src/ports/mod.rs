//! Ports module for Endorser Selection
//!
//! Defines inbound (API) and outbound (SPI) port traits.

pub mod inbound;
pub mod outbound;

pub use inbound::EndorserSelectionApi;
pub use outbound::{DiscoveryService, IdentityContext, PolicyProvider, QueryTransport};
