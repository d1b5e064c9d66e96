//! Routes and handlers.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use shared_types::{Commitment, Level, PeerId, Profile, PublicKeyHash, ShardIndex, SlotIndex};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::domain::{
    ApiError, ApiResult, AttestableSlotsResponse, CommitmentResponse, MeshEntry, PagesResponse,
    PeerAclRequest, ProofResponse, PublishIntentRequest, RpcConfig, ShardResponse, StatusResponse,
};
use crate::ports::DalBackend;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn DalBackend>,
}

pub fn build_router(backend: Arc<dyn DalBackend>, config: &RpcConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/commitments", post(post_commitment))
        .route("/commitments/:commitment", axum::routing::patch(patch_commitment))
        .route("/commitments/:commitment/slot", get(get_slot))
        .route("/commitments/:commitment/proof", get(get_proof))
        .route("/commitments/:commitment/headers", get(get_headers))
        .route(
            "/levels/:level/slot_indices/:slot_index/commitment",
            get(get_commitment_at),
        )
        .route("/levels/:level/slot_indices/:slot_index/status", get(get_status_at))
        .route("/levels/:level/slot_indices/:slot_index/pages", get(get_pages))
        .route("/shards/:commitment/:shard_index", get(get_shard))
        .route("/profiles", get(get_profiles).patch(patch_profiles))
        .route(
            "/profiles/:pkh/attested_levels/:level/attestable_slots",
            get(get_attestable_slots),
        )
        .route("/p2p/peers", get(get_peers))
        .route("/p2p/peers/:peer_id", get(get_peer).patch(patch_peer))
        .route("/p2p/gossipsub/topics", get(get_topics))
        .route("/p2p/gossipsub/mesh", get(get_mesh))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { backend })
}

// =============================================================================
// HELPERS
// =============================================================================

fn parse<T>(raw: &str, what: &str) -> ApiResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| ApiError::invalid_parameter(format!("{what} `{raw}`: {e}")))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::invalid_parameter(e.body_text()))
}

async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ApiResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiError::internal)?
}

fn coordinates(level: &str, slot_index: &str) -> ApiResult<(Level, SlotIndex)> {
    Ok((parse(level, "level")?, parse(slot_index, "slot index")?))
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.backend.health())
}

async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let text = state.backend.metrics()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text))
}

async fn post_commitment(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<CommitmentResponse>> {
    let backend = state.backend.clone();
    let commitment = blocking(move || backend.post_slot(&body)).await?;
    info!(commitment = %commitment, "[dal-08] Slot posted");
    Ok(Json(CommitmentResponse { commitment }))
}

async fn patch_commitment(
    State(state): State<AppState>,
    Path(commitment): Path<String>,
    body: Result<Json<PublishIntentRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let commitment: Commitment = parse(&commitment, "commitment")?;
    let request = json_body(body)?;
    state
        .backend
        .publish_intent(commitment, request.slot_level, request.slot_index)?;
    Ok(StatusCode::OK)
}

async fn get_slot(State(state): State<AppState>, Path(commitment): Path<String>) -> ApiResult<impl IntoResponse> {
    let commitment: Commitment = parse(&commitment, "commitment")?;
    let backend = state.backend.clone();
    let slot = blocking(move || backend.slot(&commitment)).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], slot))
}

async fn get_proof(State(state): State<AppState>, Path(commitment): Path<String>) -> ApiResult<Json<ProofResponse>> {
    let commitment: Commitment = parse(&commitment, "commitment")?;
    let proof = state.backend.commitment_proof(&commitment)?;
    Ok(Json(ProofResponse {
        proof: proof.to_string(),
    }))
}

async fn get_headers(State(state): State<AppState>, Path(commitment): Path<String>) -> ApiResult<impl IntoResponse> {
    let commitment: Commitment = parse(&commitment, "commitment")?;
    Ok(Json(state.backend.headers_of(&commitment)))
}

async fn get_commitment_at(
    State(state): State<AppState>,
    Path((level, slot_index)): Path<(String, String)>,
) -> ApiResult<Json<CommitmentResponse>> {
    let (level, slot_index) = coordinates(&level, &slot_index)?;
    let commitment = state
        .backend
        .commitment_at(level, slot_index)
        .ok_or_else(|| ApiError::not_found(format!("commitment at {level}/{slot_index}")))?;
    Ok(Json(CommitmentResponse { commitment }))
}

async fn get_status_at(
    State(state): State<AppState>,
    Path((level, slot_index)): Path<(String, String)>,
) -> ApiResult<Json<StatusResponse>> {
    let (level, slot_index) = coordinates(&level, &slot_index)?;
    let status = state
        .backend
        .status_at(level, slot_index)
        .ok_or_else(|| ApiError::not_found(format!("header at {level}/{slot_index}")))?;
    Ok(Json(StatusResponse { status }))
}

async fn get_pages(
    State(state): State<AppState>,
    Path((level, slot_index)): Path<(String, String)>,
) -> ApiResult<Json<PagesResponse>> {
    let (level, slot_index) = coordinates(&level, &slot_index)?;
    let backend = state.backend.clone();
    let (commitment, pages) = blocking(move || backend.pages(level, slot_index)).await?;
    Ok(Json(PagesResponse {
        commitment,
        pages: pages.iter().map(hex::encode).collect(),
    }))
}

async fn get_shard(
    State(state): State<AppState>,
    Path((commitment, shard_index)): Path<(String, String)>,
) -> ApiResult<Json<ShardResponse>> {
    let commitment: Commitment = parse(&commitment, "commitment")?;
    let shard_index: ShardIndex = parse(&shard_index, "shard index")?;
    let shard = state.backend.shard(&commitment, shard_index)?;
    Ok(Json(shard.into()))
}

async fn get_profiles(State(state): State<AppState>) -> Json<Vec<Profile>> {
    Json(state.backend.profiles())
}

async fn patch_profiles(
    State(state): State<AppState>,
    body: Result<Json<Vec<Profile>>, JsonRejection>,
) -> ApiResult<Json<Vec<Profile>>> {
    let profiles = json_body(body)?;
    Ok(Json(state.backend.add_profiles(profiles)?))
}

async fn get_attestable_slots(
    State(state): State<AppState>,
    Path((pkh, level)): Path<(String, String)>,
) -> ApiResult<Json<AttestableSlotsResponse>> {
    let pkh: PublicKeyHash = parse(&pkh, "public key hash")?;
    let level: Level = parse(&level, "level")?;
    let attestable_slots = state.backend.attestable_slots(&pkh, level)?;
    Ok(Json(AttestableSlotsResponse { attestable_slots }))
}

async fn get_peers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.backend.peers())
}

async fn get_peer(State(state): State<AppState>, Path(peer_id): Path<String>) -> ApiResult<impl IntoResponse> {
    let peer_id: PeerId = parse(&peer_id, "peer id")?;
    let info = state
        .backend
        .peer(&peer_id)
        .ok_or_else(|| ApiError::not_found(format!("peer {peer_id}")))?;
    Ok(Json(info))
}

async fn patch_peer(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    body: Result<Json<PeerAclRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let peer_id: PeerId = parse(&peer_id, "peer id")?;
    let request = json_body(body)?;
    state.backend.set_peer_acl(peer_id, request.acl, request.addr)?;
    info!(peer = %peer_id.short(), acl = ?request.acl, "[dal-08] Peer ACL updated");
    Ok(StatusCode::OK)
}

async fn get_topics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.backend.topics())
}

async fn get_mesh(State(state): State<AppState>) -> Json<Vec<MeshEntry>> {
    Json(
        state
            .backend
            .mesh()
            .into_iter()
            .map(|(topic, peers)| MeshEntry { topic, peers })
            .collect(),
    )
}
