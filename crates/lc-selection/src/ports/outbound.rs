//! Outbound Ports (Driven Ports / SPI)
//!
//! Collaborators the selection engine depends on but does not implement:
//! channel membership, peer query transport and the caller's identity.

use crate::domain::entities::{ChaincodeQuery, MspId, Peer};
use crate::domain::errors::{DiscoveryError, PolicyError, TransportError};
use crate::domain::policy::SignaturePolicyEnvelope;
use async_trait::async_trait;
use std::sync::Arc;

/// Live channel membership
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Peers currently live on the channel, with their organization.
    async fn get_peers(&self) -> Result<Vec<Peer>, DiscoveryError>;
}

/// Sends a chaincode query to one peer and returns the raw payload
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn query(&self, target: &Peer, query: &ChaincodeQuery) -> Result<Vec<u8>, TransportError>;
}

/// Identity of the client issuing queries
pub trait IdentityContext: Send + Sync {
    fn msp_id(&self) -> &MspId;

    /// Serialized identity placed in the query's creator field
    fn serialized_identity(&self) -> Vec<u8>;
}

/// Source of chaincode endorsement policies
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    async fn get_chaincode_policy(
        &self,
        chaincode_id: &str,
    ) -> Result<Arc<SignaturePolicyEnvelope>, PolicyError>;
}

/// Mock implementations for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks {
    use super::*;
    use parking_lot::{Mutex, RwLock};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Discovery returning a mutable, fixed peer list
    #[derive(Debug, Default)]
    pub struct StaticDiscovery {
        peers: RwLock<Vec<Peer>>,
        failure: RwLock<Option<DiscoveryError>>,
    }

    impl StaticDiscovery {
        pub fn new(peers: Vec<Peer>) -> Self {
            Self {
                peers: RwLock::new(peers),
                failure: RwLock::new(None),
            }
        }

        /// Replace the live peers seen by later calls
        pub fn set_peers(&self, peers: Vec<Peer>) {
            *self.peers.write() = peers;
        }

        /// Make later calls fail with `error` (`None` to recover)
        pub fn set_failure(&self, error: Option<DiscoveryError>) {
            *self.failure.write() = error;
        }
    }

    #[async_trait]
    impl DiscoveryService for StaticDiscovery {
        async fn get_peers(&self) -> Result<Vec<Peer>, DiscoveryError> {
            if let Some(err) = self.failure.read().clone() {
                return Err(err);
            }
            Ok(self.peers.read().clone())
        }
    }

    type ResponseKey = (String, Option<String>);

    /// Transport with canned responses that counts calls.
    ///
    /// Responses are keyed by endpoint, optionally narrowed to one chaincode
    /// ID (the second lifecycle query argument). Unknown endpoints are
    /// unreachable.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        responses: RwLock<HashMap<ResponseKey, Result<Vec<u8>, TransportError>>>,
        calls: AtomicUsize,
        received: Mutex<Vec<(String, ChaincodeQuery)>>,
        delay: Option<Duration>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sleep this long before answering each query
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Answer every query sent to `endpoint`
        pub fn respond(&self, endpoint: &str, payload: Vec<u8>) {
            self.set(endpoint, None, Ok(payload));
        }

        /// Answer queries for `chaincode_id` sent to `endpoint`
        pub fn respond_to(&self, endpoint: &str, chaincode_id: &str, payload: Vec<u8>) {
            self.set(endpoint, Some(chaincode_id), Ok(payload));
        }

        pub fn fail(&self, endpoint: &str, error: TransportError) {
            self.set(endpoint, None, Err(error));
        }

        fn set(&self, endpoint: &str, chaincode_id: Option<&str>, response: Result<Vec<u8>, TransportError>) {
            self.responses.write().insert(
                (endpoint.to_string(), chaincode_id.map(str::to_string)),
                response,
            );
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Queries received so far, with the endpoint they were sent to
        pub fn received(&self) -> Vec<(String, ChaincodeQuery)> {
            self.received.lock().clone()
        }

        /// Queries received for one chaincode ID
        pub fn queries_for(&self, chaincode_id: &str) -> usize {
            self.received
                .lock()
                .iter()
                .filter(|(_, q)| queried_chaincode(q).as_deref() == Some(chaincode_id))
                .count()
        }
    }

    fn queried_chaincode(query: &ChaincodeQuery) -> Option<String> {
        query
            .args
            .get(1)
            .map(|arg| String::from_utf8_lossy(arg).into_owned())
    }

    #[async_trait]
    impl QueryTransport for MockTransport {
        async fn query(&self, target: &Peer, query: &ChaincodeQuery) -> Result<Vec<u8>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.received
                .lock()
                .push((target.endpoint.clone(), query.clone()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let responses = self.responses.read();
            let specific = (target.endpoint.clone(), queried_chaincode(query));
            let any = (target.endpoint.clone(), None);
            responses
                .get(&specific)
                .or_else(|| responses.get(&any))
                .cloned()
                .unwrap_or_else(|| Err(TransportError::Unreachable(target.endpoint.clone())))
        }
    }

    /// Fixed client identity
    #[derive(Debug, Clone)]
    pub struct StaticIdentity {
        msp_id: MspId,
        serialized: Vec<u8>,
    }

    impl StaticIdentity {
        pub fn new(msp_id: impl Into<MspId>) -> Self {
            let msp_id = msp_id.into();
            let serialized = format!("identity:{msp_id}").into_bytes();
            Self { msp_id, serialized }
        }
    }

    impl IdentityContext for StaticIdentity {
        fn msp_id(&self) -> &MspId {
            &self.msp_id
        }

        fn serialized_identity(&self) -> Vec<u8> {
            self.serialized.clone()
        }
    }
}
