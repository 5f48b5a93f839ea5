//! Inbound Ports (Driving Ports / API)

use crate::application::options::SelectionOptions;
use crate::domain::entities::{ChaincodeCall, Peer};
use crate::domain::errors::SelectionError;
use async_trait::async_trait;

/// Primary Endorser Selection API
#[async_trait]
pub trait EndorserSelectionApi: Send + Sync {
    /// Choose the peers that should endorse a transaction invoking `chaincodes`.
    ///
    /// The returned peers jointly satisfy the endorsement policy of every
    /// invoked chaincode, given the peers currently live on the channel.
    async fn get_endorsers_for_chaincode(
        &self,
        chaincodes: &[ChaincodeCall],
        options: SelectionOptions,
    ) -> Result<Vec<Peer>, SelectionError>;
}
