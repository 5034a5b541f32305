//! Service errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use synapsed_onion::RoutingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// Error body returned by every `POST` endpoint.
#[derive(Debug)]
pub struct ApiError(pub RoutingError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_malformed_input() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<RoutingError> for ApiError {
    fn from(error: RoutingError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
