//! # Concurrency
//!
//! Many tasks selecting endorsers at once: the resolver for a chaincode set
//! is built once, and round-robin balancing stays fair under contention.

#[cfg(test)]
mod tests {
    use crate::fixtures::{one_of, org_peers, Channel};
    use futures::future::join_all;
    use lc_selection::ports::outbound::mocks::MockTransport;
    use lc_selection::{
        ChaincodeCall, LoadBalanceStrategy, SelectionConfig, SelectionError, SelectionOptions,
    };
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn calls(ids: &[&str]) -> Vec<ChaincodeCall> {
        ids.iter().map(|id| ChaincodeCall::new(*id)).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_calls_query_each_policy_once() {
        let channel = Arc::new(
            Channel::new(
                SelectionConfig::default(),
                MockTransport::new().with_delay(Duration::from_millis(50)),
                &[
                    ("cc1", one_of(&["Org1MSP"])),
                    ("cc2", one_of(&["Org2MSP"])),
                ],
                org_peers(2, 2),
            )
            .unwrap(),
        );

        let tasks = (0..32).map(|i| {
            let channel = Arc::clone(&channel);
            // Half the callers name the chaincodes in reverse order
            let ids = if i % 2 == 0 { ["cc1", "cc2"] } else { ["cc2", "cc1"] };
            tokio::spawn(async move {
                channel
                    .service
                    .get_endorsers_for_chaincode(&calls(&ids), SelectionOptions::default())
                    .await
            })
        });

        for result in join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap().len(), 2);
        }
        assert_eq!(channel.transport.queries_for("cc1"), 1);
        assert_eq!(channel.transport.queries_for("cc2"), 1);
        assert_eq!(channel.service.cached_resolvers(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failure_is_shared_then_retried() {
        let channel = Arc::new(
            Channel::new(
                SelectionConfig::default(),
                MockTransport::new().with_delay(Duration::from_millis(200)),
                &[],
                org_peers(1, 1),
            )
            .unwrap(),
        );

        let tasks = (0..8).map(|_| {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move {
                channel
                    .service
                    .get_endorsers_for_chaincode(&calls(&["late"]), SelectionOptions::default())
                    .await
            })
        });
        for result in join_all(tasks).await {
            assert!(matches!(result.unwrap(), Err(SelectionError::Policy { .. })));
        }
        assert_eq!(channel.transport.queries_for("late"), 1);

        // Deployed afterwards: the failed entry was evicted, so this retries
        channel.transport.respond_to(
            crate::fixtures::LIFECYCLE_PEER,
            "late",
            crate::fixtures::chaincode_payload("late", &one_of(&["Org1MSP"])).unwrap(),
        );
        let peers = channel
            .service
            .get_endorsers_for_chaincode(&calls(&["late"]), SelectionOptions::default())
            .await
            .unwrap();
        assert_eq!(peers[0].endpoint, "peer0.org1");
        assert_eq!(channel.transport.queries_for("late"), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_round_robin_fair_under_contention() {
        let channel = Arc::new(
            Channel::new(
                SelectionConfig {
                    load_balance: LoadBalanceStrategy::RoundRobin,
                    ..SelectionConfig::default()
                },
                MockTransport::new(),
                &[("cc1", one_of(&["Org1MSP"]))],
                org_peers(1, 3),
            )
            .unwrap(),
        );

        let tasks = (0..300).map(|_| {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move {
                channel
                    .service
                    .get_endorsers_for_chaincode(&calls(&["cc1"]), SelectionOptions::default())
                    .await
            })
        });

        let mut picks: HashMap<String, usize> = HashMap::new();
        for result in join_all(tasks).await {
            let peers = result.unwrap().unwrap();
            *picks.entry(peers[0].endpoint.clone()).or_default() += 1;
        }

        assert_eq!(picks.len(), 3);
        assert!(picks.values().all(|&n| n == 100), "{picks:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_close_during_traffic() {
        let channel = Arc::new(
            Channel::new(
                SelectionConfig::default(),
                MockTransport::new(),
                &[("cc1", one_of(&["Org1MSP"]))],
                org_peers(1, 2),
            )
            .unwrap(),
        );
        channel
            .service
            .get_endorsers_for_chaincode(&calls(&["cc1"]), SelectionOptions::default())
            .await
            .unwrap();

        channel.service.close();

        let tasks = (0..8).map(|_| {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move {
                channel
                    .service
                    .get_endorsers_for_chaincode(&calls(&["cc1"]), SelectionOptions::default())
                    .await
            })
        });
        for result in join_all(tasks).await {
            assert_eq!(result.unwrap(), Err(SelectionError::CacheClosed));
        }
    }
}
