//! Endorser Selection Service
//!
//! Main service implementing EndorserSelectionApi.

use super::options::SelectionOptions;
use crate::algorithms::{GroupRetriever, PeerGroupResolver, PolicyCompiler};
use crate::cache::{CacheError, LazyCache};
use crate::config::{LoadBalanceStrategy, SelectionConfig};
use crate::domain::entities::{ChaincodeCall, OrgPeers, Peer, ResolverKey};
use crate::domain::errors::{PolicyError, SelectionError};
use crate::ports::inbound::EndorserSelectionApi;
use crate::ports::outbound::{DiscoveryService, PolicyProvider};
use async_trait::async_trait;
use lc_telemetry::metrics::{RESOLUTION_FAILURES, RESOLVER_INITIALIZATIONS, SELECTION_REQUESTS};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Endorser Selection Service for one channel
///
/// Orchestrates a selection:
/// 1. Validate input
/// 2. Get or build the resolver for the invoked chaincode set
/// 3. Fetch live peers and apply caller options
/// 4. Resolve and return one satisfying peer group
pub struct SelectionService {
    channel_id: String,
    config: SelectionConfig,
    discovery: Arc<dyn DiscoveryService>,
    resolvers: LazyCache<ResolverKey, PeerGroupResolver, SelectionError>,
}

impl SelectionService {
    /// Create a new service with default config
    pub fn new(
        channel_id: impl Into<String>,
        discovery: Arc<dyn DiscoveryService>,
        policies: Arc<dyn PolicyProvider>,
    ) -> Self {
        Self::with_config(channel_id, SelectionConfig::default(), discovery, policies)
    }

    /// Create a new service with custom config
    pub fn with_config(
        channel_id: impl Into<String>,
        config: SelectionConfig,
        discovery: Arc<dyn DiscoveryService>,
        policies: Arc<dyn PolicyProvider>,
    ) -> Self {
        let compiler = PolicyCompiler::new(config.max_candidate_groups);
        let strategy = config.load_balance;
        let resolvers = LazyCache::new(config.expiration(), move |key: ResolverKey| {
            let policies = Arc::clone(&policies);
            let compiler = compiler.clone();
            async move { build_resolver(policies.as_ref(), &compiler, strategy, &key).await }
        });

        Self {
            channel_id: channel_id.into(),
            config,
            discovery,
            resolvers,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Resolvers currently cached, including ones still initializing
    pub fn cached_resolvers(&self) -> usize {
        self.resolvers.len()
    }

    /// Tear down the resolver cache; later selections fail with `CacheClosed`.
    pub fn close(&self) {
        info!(channel_id = %self.channel_id, "Closing endorser selection service");
        self.resolvers.close();
    }

    /// Peers that should endorse a transaction invoking `chaincodes`.
    pub async fn get_endorsers_for_chaincode(
        &self,
        chaincodes: &[ChaincodeCall],
        options: SelectionOptions,
    ) -> Result<Vec<Peer>, SelectionError> {
        let result = self.select(chaincodes, &options).await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        SELECTION_REQUESTS.with_label_values(&[outcome]).inc();
        result
    }

    async fn select(
        &self,
        chaincodes: &[ChaincodeCall],
        options: &SelectionOptions,
    ) -> Result<Vec<Peer>, SelectionError> {
        // 1. Validate input
        if chaincodes.is_empty() {
            return Err(SelectionError::NoChaincodeIds);
        }

        // 2. Resolver for this chaincode set
        let key = ResolverKey::new(self.channel_id.clone(), chaincodes);
        let resolver = self.resolvers.get(&key).await.map_err(|err| match err {
            CacheError::Closed => SelectionError::CacheClosed,
            CacheError::Init(err) => err,
        })?;

        // 3. Live peers, filtered and sorted
        let live = self
            .discovery
            .get_peers()
            .await
            .map_err(|err| SelectionError::Discovery(err.to_string()))?;
        let candidates = options.apply(&live);
        let org_peers = OrgPeers::from_peers(&candidates);
        debug!(
            cache_key = %key,
            live = live.len(),
            eligible = org_peers.peer_count(),
            "Selecting endorsers"
        );

        // 4. Resolve
        let group = resolver.resolve(&org_peers).map_err(|err| {
            RESOLUTION_FAILURES.inc();
            warn!(cache_key = %key, error = %err, "No endorsement peer group available");
            err
        })?;

        Ok(group.into_peers())
    }
}

async fn build_resolver(
    policies: &dyn PolicyProvider,
    compiler: &PolicyCompiler,
    strategy: LoadBalanceStrategy,
    key: &ResolverKey,
) -> Result<PeerGroupResolver, SelectionError> {
    let mut retrievers = Vec::with_capacity(key.chaincode_ids().len());
    for chaincode_id in key.chaincode_ids() {
        let with_context = |source: PolicyError| SelectionError::Policy {
            channel_id: key.channel_id().to_string(),
            chaincode_id: chaincode_id.clone(),
            source,
        };
        let envelope = policies
            .get_chaincode_policy(chaincode_id)
            .await
            .map_err(with_context)?;
        retrievers.push(compiler.compile(&envelope).map_err(with_context)?);
    }

    let retriever = GroupRetriever::all_of(retrievers).ok_or(SelectionError::NoChaincodeIds)?;
    RESOLVER_INITIALIZATIONS.inc();
    info!(
        cache_key = %key,
        orgs = ?retriever.required_orgs(),
        strategy = ?strategy,
        "Created peer group resolver"
    );
    Ok(PeerGroupResolver::new(retriever, strategy.build()))
}

#[async_trait]
impl EndorserSelectionApi for SelectionService {
    async fn get_endorsers_for_chaincode(
        &self,
        chaincodes: &[ChaincodeCall],
        options: SelectionOptions,
    ) -> Result<Vec<Peer>, SelectionError> {
        SelectionService::get_endorsers_for_chaincode(self, chaincodes, options).await
    }
}

impl std::fmt::Debug for SelectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionService")
            .field("channel_id", &self.channel_id)
            .field("config", &self.config)
            .field("resolvers", &self.resolvers)
            .finish_non_exhaustive()
    }
}
