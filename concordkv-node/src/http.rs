//! The admin REST surface (§6): topology introspection, the NDJSON event
//! stream, health overrides and migration control, plus a prometheus
//! exposition endpoint. Grounded on the teacher's
//! `gateway-rust::main`'s `AppState`/`axum::Router` wiring.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use topology_types::{HealthStatus, NodeHealth, NodeId, ShardId, Topology};

use crate::error::ApiError;
use crate::state::AppState;

/// Build the admin router for a constructed [`AppState`].
pub fn router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/topology/snapshot", get(get_snapshot))
        .route("/topology/shards", get(get_shards))
        .route("/topology/nodes", get(get_nodes))
        .route("/topology/version", get(get_version))
        .route("/topology/subscribe", get(subscribe))
        .route("/topology/health", post(post_health))
        .route("/topology/shards/:id/migrate", post(post_migrate))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .with_state(state)
}

async fn get_snapshot(State(state): State<AppState>) -> Json<Topology> {
    Json(state.service.get_topology_snapshot())
}

#[derive(Serialize)]
struct ShardsResponse {
    shards: Vec<topology_types::Shard>,
}

async fn get_shards(State(state): State<AppState>) -> Json<ShardsResponse> {
    let topology = state.service.get_topology_snapshot();
    Json(ShardsResponse {
        shards: topology.shards.values().cloned().collect(),
    })
}

#[derive(Serialize)]
struct NodesResponse {
    nodes: Vec<topology_types::NodeRecord>,
}

async fn get_nodes(State(state): State<AppState>) -> Json<NodesResponse> {
    let topology = state.service.get_topology_snapshot();
    Json(NodesResponse {
        nodes: topology.nodes.values().cloned().collect(),
    })
}

#[derive(Serialize)]
struct VersionResponse {
    version: u64,
    config_hash: String,
}

async fn get_version(State(state): State<AppState>) -> Json<VersionResponse> {
    let topology = state.service.get_topology_snapshot();
    Json(VersionResponse {
        version: topology.version,
        config_hash: topology.config_hash_hex(),
    })
}

#[derive(Deserialize)]
struct SubscribeQuery {
    #[serde(rename = "lastAckedVersion")]
    last_acked_version: Option<u64>,
}

async fn subscribe(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let (_id, rx) = state.notifier.subscribe(query.last_acked_version);
    let stream = tokio_stream::wrappers::ReceiverStream::new(rx).map(|event| {
        let frame = change_notifier::framing::encode(&event).unwrap_or_default();
        Ok(Event::default().data(frame))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)))
}

#[derive(Deserialize)]
struct HealthOverride {
    #[serde(rename = "nodeId")]
    node_id: String,
    status: HealthStatusWire,
}

#[derive(Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum HealthStatusWire {
    Healthy,
    Suspect,
    Failed,
}

async fn post_health(
    State(state): State<AppState>,
    Json(body): Json<HealthOverride>,
) -> Result<Json<Topology>, ApiError> {
    let status = match body.status {
        HealthStatusWire::Healthy => HealthStatus::Healthy,
        HealthStatusWire::Suspect => HealthStatus::Suspect,
        HealthStatusWire::Failed => HealthStatus::Failed,
    };
    let node_id = NodeId::new(body.node_id);
    let topology = state.topology.snapshot();
    let mut health = topology
        .nodes
        .get(&node_id)
        .map(|record| record.health)
        .unwrap_or_else(NodeHealth::default);
    health.status = status;
    let updated = state
        .topology
        .propose(topology_store::MutationOp::UpdateNodeHealth { node_id, health })
        .await?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
struct MigrateRequest {
    target: String,
}

async fn post_migrate(
    State(state): State<AppState>,
    Path(id): Path<u16>,
    Json(body): Json<MigrateRequest>,
) -> Result<Json<Topology>, ApiError> {
    let topology = state
        .service
        .start_migration(ShardId::new(id), NodeId::new(body.target))
        .await?;
    Ok(Json(topology))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let families = state.gather_metrics();
    let mut buffer = Vec::new();
    let _ = encoder.encode(&families, &mut buffer);
    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
}
