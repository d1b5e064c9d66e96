//! # End-to-End Over TCP
//!
//! Two full node runtimes on localhost. A producer posts a slot, both nodes
//! finalize the block that publishes it, and the observer ends up holding
//! every shard.
//!
//! ```text
//!   Node A (Producer 1)  ←──TCP bootstrap──  Node B (Observer 1)
//!        │ post_slot, publish_intent               │
//!        │ block 2 finalized → publish_all ───────→ store + amplify
//! ```

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dal_04_gossip::GossipConfig;
    use dal_08_rpc::DalBackend;
    use dal_node::adapters::NodeBackend;
    use dal_node::container::config::StorageBackend;
    use dal_node::l1::{ProtocolServices, RawFinalizedBlock, PROTO_BETA};
    use dal_node::{NodeConfig, NodeRuntime};
    use shared_types::{FinalizedBlock, HeaderStatus, PeerId, Profile};
    use tempfile::TempDir;

    use crate::harness::{committee, header, pkh, slot_bytes};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn config(dir: &TempDir, profiles: Vec<Profile>) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.storage.backend = StorageBackend::Directory;
        config.l1.protocol = PROTO_BETA.to_string();
        config.network.listen_addr = "127.0.0.1:0".into();
        config.rpc.listen_addr = "127.0.0.1:0".parse().unwrap();
        config.gossip = GossipConfig::for_testing();
        config.profiles = profiles;
        config
    }

    fn encode(block: &FinalizedBlock) -> RawFinalizedBlock {
        ProtocolServices::ProtoBeta.encode_block(block).unwrap()
    }

    /// Poll `check` every 20ms for up to ten seconds.
    async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {what}");
    }

    fn meshed_with(runtime: &NodeRuntime, peer: PeerId) -> bool {
        runtime
            .container()
            .gossip
            .mesh()
            .values()
            .any(|peers| peers.contains(&peer))
    }

    // =========================================================================
    // PRODUCER → OBSERVER
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_observer_receives_every_shard_over_tcp() {
        let a_dir = TempDir::new().unwrap();
        let a = NodeRuntime::new(config(&a_dir, vec![Profile::Producer(1)])).unwrap();
        a.start().await.unwrap();

        let b_dir = TempDir::new().unwrap();
        let mut b_config = config(&b_dir, vec![Profile::Observer(1)]);
        b_config.network.bootstrap_peers = vec![a.p2p_addr().unwrap().to_string()];
        let b = NodeRuntime::new(b_config).unwrap();
        b.start().await.unwrap();

        let (a_node, b_node) = (a.container(), b.container());
        let p = a_node.parameters;
        let lag = p.attestation_lag;
        let attesters = [pkh(0xA1), pkh(0xA2)];

        // Level 1 installs the committees that level 2 publications route to.
        let block1 = FinalizedBlock {
            level: 1,
            committees: vec![
                committee(1 + lag, &p, &attesters),
                committee(2 + lag, &p, &attesters),
            ],
            ..FinalizedBlock::default()
        };
        a.feed().push(encode(&block1)).await.unwrap();
        b.feed().push(encode(&block1)).await.unwrap();

        let (a_id, b_id) = (a_node.local_peer_id, b_node.local_peer_id);
        eventually("meshes to form", || meshed_with(&a, b_id) && meshed_with(&b, a_id)).await;

        let backend = NodeBackend::new(&a_node);
        let slot = slot_bytes(&p, 21);
        let c = backend.post_slot(&slot).unwrap();
        backend.publish_intent(c, 2, 1).unwrap();
        assert_eq!(backend.status_at(2, 1), Some(HeaderStatus::Unseen));

        let block2 = FinalizedBlock {
            level: 2,
            headers: vec![header(1, c, 500)],
            committees: vec![committee(3 + lag, &p, &attesters)],
            ..FinalizedBlock::default()
        };
        b.feed().push(encode(&block2)).await.unwrap();
        eventually("observer to process level 2", || {
            b_node.tracker.last_processed_level() == Some(2)
        })
        .await;
        a.feed().push(encode(&block2)).await.unwrap();

        eventually("observer to hold every shard", || {
            b_node.store.count(&c).unwrap() == p.number_of_shards
        })
        .await;
        assert_eq!(
            a_node.tracker.status_of(2, 1),
            Some(HeaderStatus::WaitingAttestation)
        );
        assert_eq!(NodeBackend::new(&b_node).slot(&c).unwrap(), slot);

        b.shutdown().await;
        a.shutdown().await;
    }

    #[tokio::test]
    async fn test_garbage_block_does_not_stop_the_node() {
        let dir = TempDir::new().unwrap();
        let runtime = NodeRuntime::new(config(&dir, vec![])).unwrap();
        runtime.start().await.unwrap();
        let feed = runtime.feed();

        feed.push(RawFinalizedBlock {
            level: 1,
            protocol: PROTO_BETA.to_string(),
            payload: vec![0xFF; 3],
        })
        .await
        .unwrap();
        feed.push(encode(&FinalizedBlock {
            level: 2,
            ..FinalizedBlock::default()
        }))
        .await
        .unwrap();

        let container = runtime.container();
        eventually("level 2", || container.tracker.last_processed_level() == Some(2)).await;
        runtime.shutdown().await;
    }
}
