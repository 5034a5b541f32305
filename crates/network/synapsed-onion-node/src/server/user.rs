//! User service: sender and terminal recipient.

use super::ResultBody;
use crate::client::MessageBody;
use crate::error::ApiError;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use synapsed_onion::{SentMessage, UserNode};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody {
    message: String,
    destination_user_id: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    circuit: Vec<u32>,
    envelope_length: usize,
}

impl From<SentMessage> for SendMessageResponse {
    fn from(sent: SentMessage) -> Self {
        Self {
            circuit: sent.circuit,
            envelope_length: sent.envelope_len,
        }
    }
}

pub fn user_router(user: Arc<UserNode>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/message", post(receive_message))
        .route("/sendMessage", post(send_message))
        .route("/getLastReceivedMessage", get(last_received))
        .route("/getLastSentMessage", get(last_sent))
        .route("/getLastCircuit", get(last_circuit))
        .with_state(user)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn status() -> &'static str {
    "live"
}

async fn receive_message(
    State(user): State<Arc<UserNode>>,
    Json(body): Json<MessageBody>,
) -> impl IntoResponse {
    user.deliver(body.message);
    "success"
}

async fn send_message(
    State(user): State<Arc<UserNode>>,
    Json(body): Json<SendMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    let sent = user
        .send_message(&body.message, body.destination_user_id)
        .await?;
    Ok(Json(SendMessageResponse::from(sent)))
}

async fn last_received(State(user): State<Arc<UserNode>>) -> impl IntoResponse {
    ResultBody::new(user.last_received())
}

async fn last_sent(State(user): State<Arc<UserNode>>) -> impl IntoResponse {
    ResultBody::new(user.last_sent())
}

async fn last_circuit(State(user): State<Arc<UserNode>>) -> impl IntoResponse {
    ResultBody::new(user.last_circuit())
}
