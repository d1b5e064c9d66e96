//! # Cross-Node Flows
//!
//! Shards published by a producer reach the attesters they are assigned to,
//! and each attester reports exactly the slots it holds its shards for.
//!
//! ## Flow Tested
//!
//! ```text
//!   block P (header + committee P+lag)
//!        │
//!        ↓
//!   Producer ──shard i on topic (slot, owner_i)──→ Attester(owner_i)
//!                                                     │
//!                                                     ↓
//!                                      attestable_slots(owner_i, P+lag)
//! ```

#[cfg(test)]
mod tests {
    use dal_04_gossip::adapters::MemoryHub;
    use dal_07_attestation::AttestationError;
    use proptest::prelude::*;
    use shared_types::{FinalizedBlock, Profile, PublicKeyHash, Topic};

    use crate::harness::{
        committee, empty_block, header, mesh_up, pkh, slot_bytes, small_parameters, TestNode,
    };

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    struct Network {
        hub: std::sync::Arc<MemoryHub>,
        producer: TestNode,
        alice: TestNode,
        bob: TestNode,
    }

    const ALICE: u8 = 0xA1;
    const BOB: u8 = 0xB0;

    /// Producer on slot 0, plus two attesters splitting the shards.
    fn network() -> Network {
        let hub = MemoryHub::new();
        let p = small_parameters();
        let producer = TestNode::new(&hub, 1, p, 50, vec![Profile::Producer(0)]);
        let alice = TestNode::new(&hub, 2, p, 50, vec![Profile::Attester(pkh(ALICE))]);
        let bob = TestNode::new(&hub, 3, p, 50, vec![Profile::Attester(pkh(BOB))]);
        Network {
            hub,
            producer,
            alice,
            bob,
        }
    }

    fn nodes(net: &Network) -> [&TestNode; 3] {
        [&net.producer, &net.alice, &net.bob]
    }

    // =========================================================================
    // ROUTING
    // =========================================================================

    #[test]
    fn test_each_attester_receives_only_its_shards() {
        let net = network();
        let p = net.producer.parameters;
        let encoded = net.producer.post_slot(&slot_bytes(&p, 4));
        let c = encoded.commitment;

        let block = FinalizedBlock {
            level: 10,
            headers: vec![header(0, c, 100)],
            attestation: None,
            committees: vec![committee(10 + p.attestation_lag, &p, &[pkh(ALICE), pkh(BOB)])],
        };
        for node in nodes(&net) {
            node.finalize(&block);
        }
        mesh_up(&net.hub, &nodes(&net));

        let published = net.producer.publisher.publish_all(10, 0, &encoded.shards);
        assert_eq!(published, p.number_of_shards);
        net.hub.run_until_idle();

        let c12 = net.producer.membership.committee(12).unwrap();
        for (node, owner) in [(&net.alice, pkh(ALICE)), (&net.bob, pkh(BOB))] {
            let mut held = node.store.shard_indices(&c).unwrap();
            held.sort_unstable();
            assert_eq!(held, c12.shards_of(&owner).to_vec());
        }
    }

    #[test]
    fn test_shards_route_to_committee_of_attested_level() {
        let net = network();
        let p = net.producer.parameters;
        let encoded = net.producer.post_slot(&slot_bytes(&p, 8));
        let c = encoded.commitment;

        // Alice owns everything at 10, Bob everything at 12.
        let block = FinalizedBlock {
            level: 10,
            headers: vec![header(0, c, 100)],
            attestation: None,
            committees: vec![
                committee(10, &p, &[pkh(ALICE)]),
                committee(10 + p.attestation_lag, &p, &[pkh(BOB)]),
            ],
        };
        for node in nodes(&net) {
            node.finalize(&block);
        }
        mesh_up(&net.hub, &nodes(&net));

        net.producer.publisher.publish_all(10, 0, &encoded.shards);
        net.hub.run_until_idle();

        assert_eq!(net.bob.shard_count(&c), p.number_of_shards);
        assert_eq!(net.alice.shard_count(&c), 0);
    }

    // =========================================================================
    // ATTESTATION
    // =========================================================================

    #[test]
    fn test_attester_reports_slots_it_holds() {
        let net = network();
        let p = net.producer.parameters;
        let encoded = net.producer.post_slot(&slot_bytes(&p, 2));
        let c = encoded.commitment;
        let attested_level = 10 + p.attestation_lag;

        let block = FinalizedBlock {
            level: 10,
            headers: vec![header(0, c, 100)],
            attestation: None,
            committees: vec![committee(attested_level, &p, &[pkh(ALICE), pkh(BOB)])],
        };
        for node in nodes(&net) {
            node.finalize(&block);
        }

        // Nothing received yet.
        let bits = net
            .alice
            .attestation
            .attestable_slots(&pkh(ALICE), attested_level)
            .unwrap();
        assert_eq!(bits, vec![false; p.number_of_slots as usize]);

        mesh_up(&net.hub, &nodes(&net));
        net.producer.publisher.publish_all(10, 0, &encoded.shards);
        net.hub.run_until_idle();

        let bits = net
            .alice
            .attestation
            .attestable_slots(&pkh(ALICE), attested_level)
            .unwrap();
        assert_eq!(bits, vec![true, false, false, false]);
    }

    #[test]
    fn test_attestation_errors() {
        let net = network();
        let p = net.producer.parameters;
        let attested_level = 10 + p.attestation_lag;
        net.alice
            .finalize(&empty_block(10, vec![committee(attested_level, &p, &[pkh(ALICE)])]));

        let stranger = pkh(0x99);
        assert!(matches!(
            net.alice.attestation.attestable_slots(&stranger, attested_level),
            Err(AttestationError::NotInCommittee { pkh, level }) if pkh == stranger && level == attested_level
        ));
        assert!(matches!(
            net.alice.attestation.attestable_slots(&pkh(ALICE), attested_level + 5),
            Err(AttestationError::CommitteeUnknown(_))
        ));
        assert!(matches!(
            net.alice.attestation.attestable_slots(&pkh(ALICE), 1),
            Err(AttestationError::LevelTooLow { .. })
        ));
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    #[test]
    fn test_producer_follows_committee_rotation() {
        let net = network();
        let p = net.producer.parameters;
        let lag = p.attestation_lag;

        net.producer
            .finalize(&empty_block(10, vec![committee(10 + lag, &p, &[pkh(ALICE)])]));
        assert_eq!(
            net.producer.membership.joined_topics(),
            vec![Topic::new(0, pkh(ALICE))]
        );

        net.producer
            .finalize(&empty_block(11, vec![committee(11 + lag, &p, &[pkh(BOB)])]));
        let joined = net.producer.membership.joined_topics();
        assert!(joined.contains(&Topic::new(0, pkh(BOB))));

        net.producer.finalize(&empty_block(13, vec![]));
        assert!(net.producer.membership.joined_topics().is_empty());
        assert!(net.producer.gossip.topics().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_attester_topics_cover_every_slot(owner in any::<[u8; 20]>()) {
            let hub = MemoryHub::new();
            let p = small_parameters();
            let pkh = PublicKeyHash(owner);
            let node = TestNode::new(&hub, 1, p, 50, vec![Profile::Attester(pkh)]);
            node.finalize(&empty_block(1, vec![]));

            let joined = node.membership.joined_topics();
            prop_assert_eq!(joined.len(), p.number_of_slots as usize);
            prop_assert!(joined.iter().all(|t| t.pkh == pkh));
            prop_assert_eq!(node.gossip.topics().len(), joined.len());
        }
    }
}
