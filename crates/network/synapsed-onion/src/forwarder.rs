//! Relay-side handling of inbound envelopes.
//!
//! Each inbound message runs `Received → Unwrapped → {Forwarded | Delivered |
//! Failed}` on its own. The only state shared between messages is
//! [`RelayDiagnostics`], a set of "last seen" fields that are overwritten on
//! every message and never read by the forwarding logic. Each field sits
//! behind its own lock, so concurrent messages resolve to last-write-wins per
//! field with no ordering across fields.

use crate::address::{Address, AddressSpace, HopTarget};
use crate::codec::LayerCodec;
use crate::keys::RelayKeyPair;
use crate::transport::{Dispatcher, MessageSink};
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Terminal state of one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    Forwarded,
    Delivered,
    Failed,
}

/// What happened to a successfully processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    Forwarded { to: Address },
    Delivered { to: Address },
}

/// Observational "last message" fields of one relay.
#[derive(Debug, Default)]
pub struct RelayDiagnostics {
    last_received_encrypted: RwLock<Option<String>>,
    last_received_decrypted: RwLock<Option<String>>,
    last_destination: RwLock<Option<Address>>,
    last_forwarded_node: RwLock<Option<Address>>,
    last_forwarded_message: RwLock<Option<String>>,
    last_state: RwLock<Option<RelayState>>,
}

impl RelayDiagnostics {
    pub fn last_received_encrypted(&self) -> Option<String> {
        self.last_received_encrypted.read().clone()
    }

    pub fn last_received_decrypted(&self) -> Option<String> {
        self.last_received_decrypted.read().clone()
    }

    pub fn last_destination(&self) -> Option<Address> {
        *self.last_destination.read()
    }

    pub fn last_forwarded_node(&self) -> Option<Address> {
        *self.last_forwarded_node.read()
    }

    pub fn last_forwarded_message(&self) -> Option<String> {
        self.last_forwarded_message.read().clone()
    }

    pub fn last_state(&self) -> Option<RelayState> {
        *self.last_state.read()
    }
}

/// Unwraps one layer per message and dispatches the remainder.
pub struct RelayForwarder {
    node_id: u32,
    keys: RelayKeyPair,
    codec: LayerCodec,
    space: AddressSpace,
    dispatcher: Arc<dyn Dispatcher>,
    diagnostics: RelayDiagnostics,
}

impl RelayForwarder {
    pub fn new(
        node_id: u32,
        keys: RelayKeyPair,
        codec: LayerCodec,
        space: AddressSpace,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            node_id,
            keys,
            codec,
            space,
            dispatcher,
            diagnostics: RelayDiagnostics::default(),
        }
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn keys(&self) -> &RelayKeyPair {
        &self.keys
    }

    pub fn diagnostics(&self) -> &RelayDiagnostics {
        &self.diagnostics
    }

    /// Processes one inbound envelope end to end.
    pub async fn handle(&self, envelope: String) -> Result<ForwardOutcome> {
        let result = self.process(envelope).await;
        let state = match &result {
            Ok(ForwardOutcome::Forwarded { .. }) => RelayState::Forwarded,
            Ok(ForwardOutcome::Delivered { .. }) => RelayState::Delivered,
            Err(e) => {
                tracing::warn!(node_id = self.node_id, error = %e, "Relay failed to process message");
                RelayState::Failed
            }
        };
        *self.diagnostics.last_state.write() = Some(state);
        result
    }

    async fn process(&self, envelope: String) -> Result<ForwardOutcome> {
        // Received
        *self.diagnostics.last_received_encrypted.write() = Some(envelope.clone());

        // Unwrapped
        let layer = self.codec.unwrap_layer(&envelope, &self.keys)?;
        let inner = layer.payload_text()?;
        *self.diagnostics.last_received_decrypted.write() = Some(inner.clone());
        *self.diagnostics.last_destination.write() = Some(layer.next_hop);

        let target = self.space.classify(layer.next_hop)?;
        tracing::debug!(
            node_id = self.node_id,
            next_hop = %layer.next_hop,
            ?target,
            "Unwrapped onion layer"
        );

        *self.diagnostics.last_forwarded_node.write() = Some(target.address());
        *self.diagnostics.last_forwarded_message.write() = Some(inner.clone());

        self.dispatcher.dispatch(target.address(), inner).await?;

        match target {
            HopTarget::Relay { address, .. } => {
                tracing::info!(node_id = self.node_id, to = %address, "Forwarded envelope to relay");
                Ok(ForwardOutcome::Forwarded { to: address })
            }
            HopTarget::Recipient { address, .. } => {
                tracing::info!(node_id = self.node_id, to = %address, "Delivered message to recipient");
                Ok(ForwardOutcome::Delivered { to: address })
            }
        }
    }
}

#[async_trait]
impl MessageSink for RelayForwarder {
    async fn receive(&self, message: String) -> Result<()> {
        self.handle(message).await.map(|_| ())
    }
}

impl std::fmt::Debug for RelayForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayForwarder")
            .field("node_id", &self.node_id)
            .field("public_key", &self.keys.public_key())
            .finish_non_exhaustive()
    }
}
