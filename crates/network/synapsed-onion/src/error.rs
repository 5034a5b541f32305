//! Routing error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Not enough nodes to build a circuit: {available} available, {required} required")]
    InsufficientNodes { available: usize, required: usize },

    #[error("Layer decryption failed: {0}")]
    DecryptionFailure(String),

    #[error("Malformed layer: {0}")]
    MalformedLayer(String),

    #[error("Address {0:010} is outside the recipient and relay ranges")]
    InvalidDestination(u64),

    #[error("Dispatch to {target} failed: {reason}")]
    DispatchFailure { target: String, reason: String },

    #[error("Circuit creation failed: {0}")]
    CircuitCreation(String),

    #[error("Layer encryption failed: {0}")]
    EncryptionError(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RoutingError {
    pub fn dispatch(target: impl ToString, reason: impl ToString) -> Self {
        Self::DispatchFailure {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller sent something unusable, as opposed to a failure
    /// while processing a well-formed request.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedLayer(_) | Self::InvalidKey(_))
    }
}

pub type Result<T> = std::result::Result<T, RoutingError>;
