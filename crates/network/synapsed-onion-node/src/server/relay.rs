//! Relay service: one onion layer per `POST /message`.

use super::ResultBody;
use crate::client::MessageBody;
use crate::error::ApiError;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use synapsed_onion::RelayForwarder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn relay_router(relay: Arc<RelayForwarder>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/message", post(receive_message))
        .route("/getLastReceivedEncryptedMessage", get(last_received_encrypted))
        .route("/getLastReceivedDecryptedMessage", get(last_received_decrypted))
        .route("/getLastMessageDestination", get(last_destination))
        .route("/getLastForwardedNode", get(last_forwarded_node))
        .route("/getLastForwardedMessage", get(last_forwarded_message))
        .route("/getPrivateKey", get(private_key))
        .with_state(relay)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn status() -> &'static str {
    "live"
}

async fn receive_message(
    State(relay): State<Arc<RelayForwarder>>,
    Json(body): Json<MessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    relay.handle(body.message).await?;
    Ok("success")
}

async fn last_received_encrypted(State(relay): State<Arc<RelayForwarder>>) -> impl IntoResponse {
    ResultBody::new(relay.diagnostics().last_received_encrypted())
}

async fn last_received_decrypted(State(relay): State<Arc<RelayForwarder>>) -> impl IntoResponse {
    ResultBody::new(relay.diagnostics().last_received_decrypted())
}

async fn last_destination(State(relay): State<Arc<RelayForwarder>>) -> impl IntoResponse {
    ResultBody::new(relay.diagnostics().last_destination().map(|a| a.value()))
}

async fn last_forwarded_node(State(relay): State<Arc<RelayForwarder>>) -> impl IntoResponse {
    ResultBody::new(relay.diagnostics().last_forwarded_node().map(|a| a.value()))
}

async fn last_forwarded_message(State(relay): State<Arc<RelayForwarder>>) -> impl IntoResponse {
    ResultBody::new(relay.diagnostics().last_forwarded_message())
}

async fn private_key(State(relay): State<Arc<RelayForwarder>>) -> impl IntoResponse {
    ResultBody::new(relay.keys().export_private_base64())
}
