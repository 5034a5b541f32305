//! Registry service

use crate::client::RegistrySnapshot;
use crate::error::ApiError;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use synapsed_onion::{InMemoryDirectory, Node, RelayPublicKey};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Registration request. The key stays a string here so a bad key is a 400
/// rather than a body rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterNodeBody {
    node_id: u32,
    pub_key: String,
}

pub fn registry_router(directory: InMemoryDirectory) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/registerNode", post(register_node))
        .route("/getNodeRegistry", get(node_registry))
        .with_state(directory)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn status() -> &'static str {
    "live"
}

async fn register_node(
    State(directory): State<InMemoryDirectory>,
    Json(body): Json<RegisterNodeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let public_key = RelayPublicKey::from_base64(&body.pub_key)?;
    directory.insert(Node::new(body.node_id, public_key));
    tracing::info!(node_id = body.node_id, registered = directory.len(), "Node registered");
    Ok("success")
}

async fn node_registry(State(directory): State<InMemoryDirectory>) -> impl IntoResponse {
    Json(RegistrySnapshot {
        nodes: directory.snapshot(),
    })
}
