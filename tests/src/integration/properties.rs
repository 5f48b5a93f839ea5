//! # Selection Properties
//!
//! Randomized N-of-M policies against randomized live membership.

#[cfg(test)]
mod tests {
    use crate::fixtures::{n_of, org_peers};
    use lc_selection::ports::outbound::mocks::StaticDiscovery;
    use lc_selection::{
        ChaincodeCall, Peer, SelectionError, SelectionOptions, SelectionService,
        StaticPolicyProvider,
    };
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn select(
        orgs: usize,
        threshold: usize,
        live: Vec<Peer>,
    ) -> Result<Vec<Peer>, SelectionError> {
        let names: Vec<String> = (1..=orgs).map(|i| format!("Org{i}MSP")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let policies = Arc::new(StaticPolicyProvider::new().with_policy("cc", n_of(threshold, &refs)));
        let service = SelectionService::new("ch", Arc::new(StaticDiscovery::new(live)), policies);

        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(service.get_endorsers_for_chaincode(
                &[ChaincodeCall::new("cc")],
                SelectionOptions::default(),
            ))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_selection_satisfies_threshold(
            orgs in 1usize..6,
            threshold_seed in 0usize..6,
            per_org in 1usize..3,
            offline_mask in 0u8..64,
        ) {
            let threshold = threshold_seed % orgs + 1;
            let live: Vec<Peer> = org_peers(orgs, per_org)
                .into_iter()
                .filter(|p| {
                    let org: usize = p.msp_id.as_str()[3..p.msp_id.as_str().len() - 3].parse().unwrap();
                    offline_mask & (1 << (org - 1)) == 0
                })
                .collect();
            let live_orgs: BTreeSet<String> = live.iter().map(|p| p.msp_id.to_string()).collect();

            match select(orgs, threshold, live.clone()) {
                Ok(peers) => {
                    let chosen: BTreeSet<String> = peers.iter().map(|p| p.msp_id.to_string()).collect();
                    prop_assert!(live_orgs.len() >= threshold);
                    prop_assert_eq!(chosen.len(), threshold);
                    prop_assert_eq!(peers.len(), threshold);
                    prop_assert!(peers.iter().all(|p| live.contains(p)));
                }
                Err(SelectionError::Unsatisfiable { .. }) => {
                    prop_assert!(live_orgs.len() < threshold);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}
