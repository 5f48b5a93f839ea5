//! # Endorser Selection Benchmarks
//!
//! | Path | Input | Expectation |
//! |------|-------|-------------|
//! | Policy compile | N-of-M over M orgs | Microseconds, done once per resolver |
//! | Candidate generation | N-of-M, P peers per org | Dominated by C(M, N) x P^N |
//! | Cached selection | Warm resolver | No policy queries, sub-millisecond |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lc_selection::ports::outbound::mocks::MockTransport;
use lc_selection::{
    ChaincodeCall, OrgPeers, PeerGroupResolver, PolicyCompiler, RoundRobinLoadBalancer,
    SelectionConfig, SelectionOptions,
};
use lc_tests::fixtures::{n_of, org_peers, Channel};
use std::sync::Arc;
use std::time::Duration;

fn org_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Org{i}MSP")).collect()
}

fn bench_policy_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy-compile");

    for orgs in [3, 7, 15] {
        let names = org_names(orgs);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let envelope = n_of(orgs / 2 + 1, &refs);
        let compiler = PolicyCompiler::default();

        group.bench_with_input(BenchmarkId::new("majority", orgs), &envelope, |b, envelope| {
            b.iter(|| black_box(compiler.compile(envelope).is_ok()))
        });
    }

    group.finish();
}

fn bench_candidate_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidate-generation");
    group.measurement_time(Duration::from_secs(10));

    for (orgs, threshold, per_org) in [(4, 2, 2), (5, 3, 2), (7, 4, 2), (5, 2, 4)] {
        let names = org_names(orgs);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let retriever = PolicyCompiler::default()
            .compile(&n_of(threshold, &refs))
            .expect("valid policy");
        let resolver = PeerGroupResolver::new(retriever, Arc::new(RoundRobinLoadBalancer::new()));
        let live = OrgPeers::from_peers(&org_peers(orgs, per_org));
        let expected = resolver.candidate_groups(&live).map(|g| g.len()).unwrap_or(0);

        group.throughput(Throughput::Elements(expected as u64));
        group.bench_with_input(
            BenchmarkId::new(format!("{threshold}-of-{orgs}"), per_org),
            &live,
            |b, live| b.iter(|| black_box(resolver.resolve(live).is_ok())),
        );
    }

    group.finish();
}

fn bench_cached_selection(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");

    let names = org_names(4);
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let channel = Channel::new(
        SelectionConfig::default(),
        MockTransport::new(),
        &[("cc1", n_of(2, &refs)), ("cc2", n_of(1, &refs[..2]))],
        org_peers(4, 3),
    )
    .expect("channel");
    let calls = vec![ChaincodeCall::new("cc1"), ChaincodeCall::new("cc2")];

    // Warm the resolver cache
    runtime
        .block_on(
            channel
                .service
                .get_endorsers_for_chaincode(&calls, SelectionOptions::default()),
        )
        .expect("warm selection");

    c.bench_function("cached-selection", |b| {
        b.iter(|| {
            runtime.block_on(async {
                black_box(
                    channel
                        .service
                        .get_endorsers_for_chaincode(&calls, SelectionOptions::default())
                        .await
                        .is_ok(),
                )
            })
        })
    });
}

criterion_group!(
    benches,
    bench_policy_compile,
    bench_candidate_generation,
    bench_cached_selection
);
criterion_main!(benches);
