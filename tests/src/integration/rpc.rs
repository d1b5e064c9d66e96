//! # RPC Flows
//!
//! The HTTP API served over a real subsystem container: every request goes
//! through `NodeBackend` into the store, tracker and membership.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use dal_08_rpc::{build_router, RpcConfig};
    use dal_node::adapters::NodeBackend;
    use dal_node::container::config::StorageBackend;
    use dal_node::l1::PROTO_BETA;
    use dal_node::{NodeConfig, SubsystemContainer};
    use shared_types::{Commitment, Profile};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::harness::slot_bytes;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    struct Api {
        _dir: TempDir,
        container: SubsystemContainer,
        app: Router,
    }

    fn api() -> Api {
        let dir = TempDir::new().unwrap();
        let mut config = NodeConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.storage.backend = StorageBackend::Directory;
        config.l1.protocol = PROTO_BETA.to_string();
        let container = SubsystemContainer::new(config).unwrap();
        let app = build_router(
            Arc::new(NodeBackend::new(&container)),
            &RpcConfig::default(),
        );
        Api {
            _dir: dir,
            container,
            app,
        }
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn json(bytes: &[u8]) -> serde_json::Value {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn post_slot(api: &Api, seed: u8) -> (String, Vec<u8>) {
        let slot = slot_bytes(&api.container.parameters, seed);
        let (status, body) = send(&api.app, "POST", "/commitments", Body::from(slot.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let commitment = json(&body)["commitment"].as_str().unwrap().to_string();
        (commitment, slot)
    }

    // =========================================================================
    // SLOTS
    // =========================================================================

    #[tokio::test]
    async fn test_post_and_fetch_slot() {
        let api = api();
        let (commitment, slot) = post_slot(&api, 11).await;

        let (status, body) = send(
            &api.app,
            "GET",
            &format!("/commitments/{commitment}/slot"),
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, slot);

        let (status, body) = send(
            &api.app,
            "GET",
            &format!("/commitments/{commitment}/proof"),
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json(&body)["proof"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_commitment_is_not_found() {
        let api = api();
        let unknown = Commitment([0x42; 32]).to_string();
        let (status, body) = send(
            &api.app,
            "GET",
            &format!("/commitments/{unknown}/slot"),
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["code"], "not_found");
    }

    #[tokio::test]
    async fn test_wrong_slot_size_rejected() {
        let api = api();
        let (status, body) =
            send(&api.app, "POST", "/commitments", Body::from(vec![1u8; 10])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["code"], "invalid_slot_size");
    }

    // =========================================================================
    // PUBLICATION INTENTS
    // =========================================================================

    #[tokio::test]
    async fn test_publish_intent_is_visible_as_unseen() {
        let api = api();
        let (commitment, _) = post_slot(&api, 12).await;

        let (status, _) = send(
            &api.app,
            "PATCH",
            &format!("/commitments/{commitment}"),
            Body::from(r#"{"slot_level":5,"slot_index":1}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &api.app,
            "GET",
            "/levels/5/slot_indices/1/commitment",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["commitment"], commitment.as_str());

        let (_, body) = send(&api.app, "GET", "/levels/5/slot_indices/1/status", Body::empty()).await;
        assert_eq!(json(&body)["status"], "unseen");
    }

    #[tokio::test]
    async fn test_publish_intent_requires_local_slot() {
        let api = api();
        let unknown = Commitment([0x43; 32]).to_string();
        let (status, _) = send(
            &api.app,
            "PATCH",
            &format!("/commitments/{unknown}"),
            Body::from(r#"{"slot_level":5,"slot_index":1}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // =========================================================================
    // PROFILES
    // =========================================================================

    #[tokio::test]
    async fn test_patch_profiles_adds_and_persists() {
        let api = api();
        let (status, body) = send(
            &api.app,
            "PATCH",
            "/profiles",
            Body::from(r#"[{"observer":1}]"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let profiles: Vec<Profile> = serde_json::from_slice(&body).unwrap();
        assert_eq!(profiles, vec![Profile::Observer(1)]);

        send(&api.app, "PATCH", "/profiles", Body::from(r#"[{"producer":0}]"#)).await;
        assert_eq!(
            api.container.membership.profiles(),
            vec![Profile::Producer(0), Profile::Observer(1)]
        );
    }

    #[tokio::test]
    async fn test_attestable_slots_without_committee() {
        let api = api();
        let pkh = shared_types::PublicKeyHash([9; 20]).to_string();
        let (status, body) = send(
            &api.app,
            "GET",
            &format!("/profiles/{pkh}/attested_levels/50/attestable_slots"),
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["code"], "committee_unknown");
    }
}
