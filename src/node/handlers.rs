use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::Node;
use crate::membership::types::NodeId;
use crate::transport::protocol::{ENDPOINT_HEALTH, ENDPOINT_RPC, Message, RawMessage};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub node_id: NodeId,
    pub members: usize,
    pub hosts_store: bool,
}

pub async fn handle_rpc(
    Extension(node): Extension<Arc<Node>>,
    Json(raw): Json<RawMessage>,
) -> Json<Message> {
    Json(node.handle_message(raw).await)
}

pub async fn handle_health(
    Extension(node): Extension<Arc<Node>>,
) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            node_id: node.id().clone(),
            members: node.membership.member_count(),
            hosts_store: node.hosts_store(),
        }),
    )
}

pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route(ENDPOINT_RPC, post(handle_rpc))
        .route(ENDPOINT_HEALTH, get(handle_health))
        .layer(Extension(node))
}
