//! # Node Scenarios
//!
//! End-to-end behaviours of the DAL node, one per test:
//!
//! | Test | Behaviour |
//! |------|-----------|
//! | `test_posted_slot_is_retrievable` | post → commit → store → read back |
//! | `test_highest_fee_header_wins_and_is_attested` | per-slot arbitration and attestation |
//! | `test_observer_amplifies_at_threshold` | reconstruction and republication |
//! | `test_tampered_shard_is_penalized_and_not_relayed` | validation and peer scoring |
//! | `test_gc_removes_commitment_after_retention` | retention boundary |

#[cfg(test)]
mod tests {
    use dal_04_gossip::adapters::MemoryHub;
    use dal_04_gossip::{Frame, GossipMessage, MessageId};
    use dal_06_amplification::AmplificationStatus;
    use dal_08_rpc::DalBackend;
    use dal_node::adapters::NodeBackend;
    use dal_node::container::config::StorageBackend;
    use dal_node::l1::PROTO_ALPHA;
    use dal_node::{NodeConfig, SubsystemContainer};
    use shared_types::{Commitment, FinalizedBlock, HeaderStatus, Profile};
    use tempfile::TempDir;

    use crate::harness::{
        attestation, committee, empty_block, header, mesh_up, pkh, slot_bytes, small_parameters,
        TestNode,
    };

    // =========================================================================
    // PUBLISH AND RETRIEVE
    // =========================================================================

    #[tokio::test]
    async fn test_posted_slot_is_retrievable() {
        let dir = TempDir::new().unwrap();
        let mut config = NodeConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.storage.backend = StorageBackend::Directory;
        config.l1.protocol = PROTO_ALPHA.to_string();
        let container = SubsystemContainer::new(config).unwrap();
        assert_eq!(container.parameters.slot_size, 126_944);

        let backend = NodeBackend::new(&container);
        let slot = slot_bytes(&container.parameters, 7);
        let commitment = backend.post_slot(&slot).unwrap();

        assert_eq!(backend.slot(&commitment).unwrap(), slot);
        assert_eq!(
            container.store.count(&commitment).unwrap(),
            container.parameters.number_of_shards
        );

        let unknown = Commitment([0xEE; 32]);
        assert_eq!(backend.slot(&unknown).unwrap_err().status.as_u16(), 404);
    }

    // =========================================================================
    // HEADER ARBITRATION
    // =========================================================================

    #[test]
    fn test_highest_fee_header_wins_and_is_attested() {
        let hub = MemoryHub::new();
        let p = small_parameters();
        let node = TestNode::new(&hub, 1, p, 50, vec![]);

        let cheap = Commitment([0x01; 32]);
        let rich = Commitment([0x02; 32]);
        let report = node.finalize(&FinalizedBlock {
            level: 100,
            headers: vec![header(2, cheap, 1_200), header(2, rich, 1_500)],
            attestation: None,
            committees: vec![],
        });
        assert_eq!(report.selected.len(), 1);
        assert_eq!(report.selected[0].commitment, rich);
        assert_eq!(node.tracker.commitment_at(100, 2), Some(rich));
        assert_eq!(
            node.tracker.status_of(100, 2),
            Some(HeaderStatus::WaitingAttestation)
        );
        assert_eq!(
            node.tracker.headers_of(&cheap)[0].status,
            HeaderStatus::NotSelected
        );

        node.finalize(&empty_block(101, vec![]));
        let report = node.finalize(&FinalizedBlock {
            level: 100 + p.attestation_lag,
            headers: vec![],
            attestation: Some(attestation(&p, 100, &[2])),
            committees: vec![],
        });
        assert_eq!(report.attested.len(), 1);
        assert_eq!(node.tracker.status_of(100, 2), Some(HeaderStatus::Attested));
        // The losing header never moves again.
        assert_eq!(
            node.tracker.headers_of(&cheap)[0].status,
            HeaderStatus::NotSelected
        );
    }

    #[test]
    fn test_unset_bit_marks_header_unattested() {
        let hub = MemoryHub::new();
        let p = small_parameters();
        let node = TestNode::new(&hub, 1, p, 50, vec![]);
        let c = Commitment([0x03; 32]);

        node.finalize(&FinalizedBlock {
            level: 10,
            headers: vec![header(1, c, 10)],
            attestation: None,
            committees: vec![],
        });
        node.finalize(&FinalizedBlock {
            level: 10 + p.attestation_lag,
            headers: vec![],
            attestation: Some(attestation(&p, 10, &[])),
            committees: vec![],
        });
        assert_eq!(node.tracker.status_of(10, 1), Some(HeaderStatus::Unattested));
    }

    // =========================================================================
    // AMPLIFICATION
    // =========================================================================

    #[test]
    fn test_observer_amplifies_at_threshold() {
        let hub = MemoryHub::new();
        let p = small_parameters();
        let producer = TestNode::new(&hub, 1, p, 50, vec![Profile::Producer(0)]);
        let observer = TestNode::new(&hub, 2, p, 50, vec![Profile::Observer(0)]);

        let attesters = [pkh(0xA1), pkh(0xA2)];
        let block = empty_block(10, vec![committee(10 + p.attestation_lag, &p, &attesters)]);
        producer.finalize(&block);
        observer.finalize(&block);
        mesh_up(&hub, &[&producer, &observer]);

        let encoded = producer.post_slot(&slot_bytes(&p, 1));
        let c = encoded.commitment;
        let threshold = p.reconstruction_threshold();

        for shard in &encoded.shards[..threshold - 1] {
            producer.publisher.publish_all(10, 0, std::slice::from_ref(shard));
        }
        hub.run_until_idle();
        assert_eq!(observer.shard_count(&c), threshold - 1);
        assert_eq!(observer.amplifier.status(&c), None);

        producer
            .publisher
            .publish_all(10, 0, std::slice::from_ref(&encoded.shards[threshold - 1]));
        hub.run_until_idle();
        assert_eq!(observer.shard_count(&c), p.number_of_shards);
        assert_eq!(observer.amplifier.status(&c), Some(AmplificationStatus::Done));
    }

    // =========================================================================
    // INVALID SHARDS
    // =========================================================================

    #[test]
    fn test_tampered_shard_is_penalized_and_not_relayed() {
        let hub = MemoryHub::new();
        let p = small_parameters();
        let owner = pkh(0xA1);
        let victim = TestNode::new(&hub, 1, p, 50, vec![Profile::Attester(owner)]);
        let witness = TestNode::new(&hub, 2, p, 50, vec![Profile::Attester(owner)]);
        let mallory = TestNode::new(&hub, 3, p, 50, vec![]);

        let block = empty_block(10, vec![committee(10 + p.attestation_lag, &p, &[owner, pkh(0xA2)])]);
        for node in [&victim, &witness, &mallory] {
            node.finalize(&block);
        }
        mesh_up(&hub, &[&victim, &witness, &mallory]);

        let encoded = mallory.cryptobox.commit_slot(&slot_bytes(&p, 3)).unwrap();
        let c = encoded.commitment;
        let id = MessageId {
            commitment: c,
            level: 10,
            slot_index: 0,
            shard_index: 0,
            pkh: owner,
        };
        let mut tampered = encoded.shards[0].clone();
        tampered.share[0] ^= 0xFF;

        let before = victim.gossip.peer(&mallory.peer_id).unwrap().score;
        victim
            .gossip
            .handle_frame(mallory.peer_id, Frame::Publish(GossipMessage::new(id, tampered)));
        hub.run_until_idle();

        let after = victim.gossip.peer(&mallory.peer_id).unwrap().score;
        assert!(after < before, "score {after} should drop below {before}");
        assert_eq!(victim.shard_count(&c), 0);
        assert_eq!(witness.shard_count(&c), 0);

        // The genuine shard still goes through.
        victim.gossip.handle_frame(
            mallory.peer_id,
            Frame::Publish(GossipMessage::new(id, encoded.shards[0].clone())),
        );
        hub.run_until_idle();
        assert_eq!(victim.shard_count(&c), 1);
        assert_eq!(witness.shard_count(&c), 1);
    }

    // =========================================================================
    // RETENTION
    // =========================================================================

    #[test]
    fn test_gc_removes_commitment_after_retention() {
        let hub = MemoryHub::new();
        let p = small_parameters();
        let retention = 5;
        let node = TestNode::new(&hub, 1, p, retention, vec![]);

        let encoded = node.post_slot(&slot_bytes(&p, 9));
        let c = encoded.commitment;
        node.finalize(&FinalizedBlock {
            level: 20,
            headers: vec![header(0, c, 1)],
            attestation: None,
            committees: vec![],
        });
        let attested_at = 20 + p.attestation_lag;
        let report = node.finalize(&FinalizedBlock {
            level: attested_at,
            headers: vec![],
            attestation: Some(attestation(&p, 20, &[0])),
            committees: vec![],
        });
        assert_eq!(report.attested_level, Some(attested_at));

        assert!(node.store.gc(attested_at + retention - 1).unwrap().is_empty());
        assert!(node.store.gc(attested_at + retention).unwrap().is_empty());
        assert_eq!(node.shard_count(&c), p.number_of_shards);

        assert_eq!(node.store.gc(attested_at + retention + 1).unwrap(), vec![c]);
        assert_eq!(node.shard_count(&c), 0);
        assert!(node.store.commitment_proof(&c).is_err());
    }
}
