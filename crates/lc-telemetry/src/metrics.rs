//! Prometheus metrics for the ledger client.
//!
//! All metrics follow the naming convention: `lc_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ENDORSER SELECTION
    // =========================================================================

    /// Endorser selection requests by outcome
    pub static ref SELECTION_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("lc_selection_requests_total", "Endorser selection requests"),
        &["outcome"]  // success / failure
    ).expect("metric creation failed");

    /// Resolver initializations (resolver cache misses)
    pub static ref RESOLVER_INITIALIZATIONS: IntCounter = IntCounter::new(
        "lc_selection_resolver_initializations_total",
        "Peer group resolvers built from chaincode policies"
    ).expect("metric creation failed");

    /// Selections that found no satisfiable peer group
    pub static ref RESOLUTION_FAILURES: IntCounter = IntCounter::new(
        "lc_selection_resolution_failures_total",
        "Selections where live peers could not satisfy the endorsement policy"
    ).expect("metric creation failed");

    /// Concrete candidate groups per resolution
    pub static ref CANDIDATE_GROUPS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "lc_selection_candidate_groups",
            "Concrete peer groups satisfying the policy per resolution"
        ).buckets(exponential_buckets(1.0, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // POLICY RETRIEVAL
    // =========================================================================

    /// Lifecycle policy queries by outcome
    pub static ref POLICY_QUERIES: IntCounterVec = IntCounterVec::new(
        Opts::new("lc_policy_queries_total", "Chaincode policy queries sent to peers"),
        &["outcome"]  // success / transport_error / malformed
    ).expect("metric creation failed");
}

/// Proof that metrics were registered
#[derive(Debug)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with the global registry.
///
/// Fails with `MetricsInit` if called twice.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SELECTION_REQUESTS.clone()),
        Box::new(RESOLVER_INITIALIZATIONS.clone()),
        Box::new(RESOLUTION_FAILURES.clone()),
        Box::new(CANDIDATE_GROUPS.clone()),
        Box::new(POLICY_QUERIES.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle { _private: () })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
