//! # Integration Test Flows
//!
//! Lifecycle policy retrieval through candidate resolution, with a mock
//! transport standing in for the channel's peers.
//!
//! 1. Policies are fetched once per chaincode and compiled into a resolver
//! 2. Selections conjoin every invoked chaincode's policy
//! 3. Failures surface with the chaincode and channel they belong to

#[cfg(test)]
mod tests {
    use crate::fixtures::{all_of, n_of, one_of, org_peers, Channel, CHANNEL, LIFECYCLE_PEER};
    use lc_selection::ports::outbound::mocks::MockTransport;
    use lc_selection::{
        invariant_peers_from_required_orgs, required_orgs, ChaincodeCall, LoadBalanceStrategy,
        MspId, Peer, PeerGroup, PolicyError, SelectionConfig, SelectionError, SelectionOptions,
        TransportError,
    };
    use std::collections::BTreeSet;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn calls(ids: &[&str]) -> Vec<ChaincodeCall> {
        ids.iter().map(|id| ChaincodeCall::new(*id)).collect()
    }

    fn orgs_of(peers: &[Peer]) -> BTreeSet<String> {
        peers.iter().map(|p| p.msp_id.to_string()).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // =============================================================================
    // POLICY RETRIEVAL → SELECTION
    // =============================================================================

    #[tokio::test]
    async fn test_single_chaincode_end_to_end() {
        let channel = Channel::new(
            SelectionConfig::default(),
            MockTransport::new(),
            &[("basic", all_of(&["Org1MSP", "Org2MSP"]))],
            org_peers(3, 2),
        )
        .unwrap();

        let peers = channel
            .service
            .get_endorsers_for_chaincode(&calls(&["basic"]), SelectionOptions::default())
            .await
            .unwrap();

        assert_eq!(peers.len(), 2);
        assert_eq!(orgs_of(&peers), set(&["Org1MSP", "Org2MSP"]));
        assert_eq!(channel.transport.queries_for("basic"), 1);

        let (endpoint, query) = &channel.transport.received()[0];
        assert_eq!(endpoint, LIFECYCLE_PEER);
        assert_eq!(query.args[0], CHANNEL.as_bytes());
    }

    #[tokio::test]
    async fn test_pure_conjunction_always_includes_required_org() {
        // Org1 AND (Org2 OR Org3 OR Org4) across two chaincodes
        let channel = Channel::new(
            SelectionConfig::default(),
            MockTransport::new(),
            &[
                ("cc1", one_of(&["Org1MSP"])),
                ("cc2", one_of(&["Org2MSP", "Org3MSP", "Org4MSP"])),
            ],
            org_peers(4, 1),
        )
        .unwrap();
        let required: BTreeSet<MspId> = ["Org1MSP", "Org2MSP", "Org3MSP", "Org4MSP"]
            .into_iter()
            .map(MspId::from)
            .collect();

        for _ in 0..50 {
            let peers = channel
                .service
                .get_endorsers_for_chaincode(&calls(&["cc1", "cc2"]), SelectionOptions::default())
                .await
                .unwrap();

            assert!(orgs_of(&peers).contains("Org1MSP"));
            assert_eq!(peers.len(), 2);
            assert!(invariant_peers_from_required_orgs(&PeerGroup::new(peers), &required));
        }
        assert_eq!(channel.transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_required_orgs_match_selection() {
        let policies = [("cc1", n_of(2, &["Org1MSP", "Org2MSP", "Org3MSP"]))];
        let required = required_orgs(policies.iter().map(|(_, envelope)| envelope));
        let channel = Channel::new(
            SelectionConfig {
                load_balance: LoadBalanceStrategy::RoundRobin,
                ..SelectionConfig::default()
            },
            MockTransport::new(),
            &policies,
            org_peers(3, 2),
        )
        .unwrap();

        // 3 org pairs x 2 x 2 peer choices
        for _ in 0..12 {
            let peers = channel
                .service
                .get_endorsers_for_chaincode(&calls(&["cc1"]), SelectionOptions::default())
                .await
                .unwrap();
            assert_eq!(orgs_of(&peers).len(), 2);
            assert!(invariant_peers_from_required_orgs(&PeerGroup::new(peers), &required));
        }
    }

    #[tokio::test]
    async fn test_filter_correctness() {
        let channel = Channel::new(
            SelectionConfig::default(),
            MockTransport::new(),
            &[("cc1", one_of(&["Org1MSP"]))],
            org_peers(1, 3),
        )
        .unwrap();
        let only_peer1 = SelectionOptions::new().with_peer_filter(|p| p.endpoint == "peer1.org1");

        for _ in 0..20 {
            let peers = channel
                .service
                .get_endorsers_for_chaincode(&calls(&["cc1"]), only_peer1.clone())
                .await
                .unwrap();
            assert_eq!(peers, vec![Peer::new("peer1.org1", "Org1MSP")]);
        }
    }

    #[tokio::test]
    async fn test_ledger_height_sorter_with_round_robin_starts_highest() {
        let peers = vec![
            Peer::new("peer0.org1", "Org1MSP").with_ledger_height(5),
            Peer::new("peer1.org1", "Org1MSP").with_ledger_height(9),
            Peer::new("peer2.org1", "Org1MSP"),
        ];
        let channel = Channel::new(
            SelectionConfig {
                load_balance: LoadBalanceStrategy::RoundRobin,
                ..SelectionConfig::default()
            },
            MockTransport::new(),
            &[("cc1", one_of(&["Org1MSP"]))],
            peers,
        )
        .unwrap();
        let options = SelectionOptions::new().with_peer_sorter(lc_selection::sort_by_ledger_height);

        let first = channel
            .service
            .get_endorsers_for_chaincode(&calls(&["cc1"]), options)
            .await
            .unwrap();

        assert_eq!(first[0].endpoint, "peer1.org1");
    }

    // =============================================================================
    // FAILURE PROPAGATION
    // =============================================================================

    #[tokio::test]
    async fn test_unsatisfiable_when_org_offline() {
        let channel = Channel::new(
            SelectionConfig::default(),
            MockTransport::new(),
            &[("cc1", all_of(&["Org1MSP", "Org2MSP"]))],
            org_peers(1, 2),
        )
        .unwrap();

        let err = channel
            .service
            .get_endorsers_for_chaincode(&calls(&["cc1"]), SelectionOptions::default())
            .await
            .unwrap_err();

        match err {
            SelectionError::Unsatisfiable { reason } => assert!(reason.contains("Org2MSP")),
            other => panic!("unexpected error: {other}"),
        }

        // Org2 comes back: same resolver, now satisfiable
        channel.discovery.set_peers(org_peers(2, 1));
        let peers = channel
            .service
            .get_endorsers_for_chaincode(&calls(&["cc1"]), SelectionOptions::default())
            .await
            .unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(channel.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_targets_failed_is_wrapped_with_context() {
        let transport = MockTransport::new();
        transport.fail(LIFECYCLE_PEER, TransportError::Timeout);
        let channel = Channel::new(SelectionConfig::default(), transport, &[], org_peers(2, 1)).unwrap();

        let err = channel
            .service
            .get_endorsers_for_chaincode(&calls(&["missing"]), SelectionOptions::default())
            .await
            .unwrap_err();

        match &err {
            SelectionError::Policy {
                channel_id,
                chaincode_id,
                source: PolicyError::AllTargetsFailed(failures),
            } => {
                assert_eq!(channel_id, CHANNEL);
                assert_eq!(chaincode_id, "missing");
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].peer, LIFECYCLE_PEER);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("missing"));
        assert_eq!(channel.service.cached_resolvers(), 0);
    }

    #[tokio::test]
    async fn test_one_failing_chaincode_fails_the_set() {
        let channel = Channel::new(
            SelectionConfig::default(),
            MockTransport::new(),
            &[("cc1", one_of(&["Org1MSP"]))],
            org_peers(2, 1),
        )
        .unwrap();
        channel
            .transport
            .respond_to(LIFECYCLE_PEER, "x-broken", vec![1, 2, 3]);

        let err = channel
            .service
            .get_endorsers_for_chaincode(&calls(&["cc1", "x-broken"]), SelectionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SelectionError::Policy {
                source: PolicyError::MalformedResponse(_),
                ref chaincode_id,
                ..
            } if chaincode_id == "x-broken"
        ));
        // cc1's policy was cached by the provider on the way
        assert_eq!(channel.provider.cached_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_picks_up_upgraded_policy() {
        let channel = Channel::new(
            SelectionConfig {
                resolver_cache_ttl_secs: 0,
                ..SelectionConfig::default()
            },
            MockTransport::new(),
            &[("cc1", one_of(&["Org1MSP"]))],
            org_peers(2, 1),
        )
        .unwrap();
        let first = channel
            .service
            .get_endorsers_for_chaincode(&calls(&["cc1"]), SelectionOptions::default())
            .await
            .unwrap();
        assert_eq!(orgs_of(&first), set(&["Org1MSP"]));

        // Upgrade: a new service over the same provider sees the new policy
        // once the provider entry is invalidated
        channel.transport.respond_to(
            LIFECYCLE_PEER,
            "cc1",
            crate::fixtures::chaincode_payload("cc1", &one_of(&["Org2MSP"])).unwrap(),
        );
        assert!(channel.provider.invalidate("cc1"));
        let upgraded = lc_selection::SelectionService::new(
            CHANNEL,
            channel.discovery.clone(),
            channel.provider.clone(),
        );

        let peers = upgraded
            .get_endorsers_for_chaincode(&calls(&["cc1"]), SelectionOptions::default())
            .await
            .unwrap();
        assert_eq!(orgs_of(&peers), set(&["Org2MSP"]));
        assert_eq!(channel.transport.queries_for("cc1"), 2);
    }

    // =============================================================================
    // TELEMETRY
    // =============================================================================

    #[tokio::test]
    async fn test_selection_outcomes_are_exported() {
        // Another test may have registered already
        let _ = lc_telemetry::register_metrics();
        let channel = Channel::new(
            SelectionConfig::default(),
            MockTransport::new(),
            &[("cc1", one_of(&["Org1MSP"]))],
            org_peers(1, 1),
        )
        .unwrap();

        channel
            .service
            .get_endorsers_for_chaincode(&calls(&["cc1"]), SelectionOptions::default())
            .await
            .unwrap();

        let text = lc_telemetry::encode_metrics().unwrap();
        assert!(text.contains("lc_selection_requests_total"));
        assert!(text.contains("lc_policy_queries_total"));
    }
}
