//! Users: senders that build circuits and the terminal hop of every circuit.

use crate::circuit::CircuitBuilder;
use crate::directory::NodeDirectory;
use crate::transport::{Dispatcher, MessageSink};
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Relay ids in entry → exit order.
    pub circuit: Vec<u32>,
    pub envelope_len: usize,
}

pub struct UserNode {
    user_id: u32,
    builder: CircuitBuilder,
    directory: Arc<dyn NodeDirectory>,
    dispatcher: Arc<dyn Dispatcher>,
    last_received: RwLock<Option<String>>,
    last_sent: RwLock<Option<String>>,
    last_circuit: RwLock<Option<Vec<u32>>>,
}

impl UserNode {
    pub fn new(
        user_id: u32,
        builder: CircuitBuilder,
        directory: Arc<dyn NodeDirectory>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            user_id,
            builder,
            directory,
            dispatcher,
            last_received: RwLock::new(None),
            last_sent: RwLock::new(None),
            last_circuit: RwLock::new(None),
        }
    }

    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    /// Terminal hop: stores the plaintext.
    pub fn deliver(&self, message: String) {
        tracing::info!(user_id = self.user_id, len = message.len(), "Message received");
        *self.last_received.write() = Some(message);
    }

    /// Sends `message` to user `destination_user_id` through a fresh circuit.
    ///
    /// The circuit is chosen from one directory snapshot, the envelope is
    /// built in full before anything leaves this node, and a failed hand-off
    /// to the entry relay means the message was not sent.
    pub async fn send_message(&self, message: &str, destination_user_id: u32) -> Result<SentMessage> {
        *self.last_sent.write() = Some(message.to_string());

        let space = self.builder.address_space();
        let destination = space.recipient_address(destination_user_id)?;

        let snapshot = self.directory.list_nodes().await?;
        let circuit = self.builder.select_circuit(&snapshot)?;
        let ids = circuit.node_ids();
        *self.last_circuit.write() = Some(ids.clone());

        let envelope = self
            .builder
            .build_envelope(&circuit, destination, message.as_bytes())?;
        let envelope_len = envelope.len();
        let entry = space.relay_address(circuit.entry().id)?;

        tracing::info!(
            user_id = self.user_id,
            to = %destination,
            circuit = ?ids,
            "Sending message through circuit"
        );
        self.dispatcher.dispatch(entry, envelope.into_string()).await?;

        Ok(SentMessage {
            circuit: ids,
            envelope_len,
        })
    }

    pub fn last_received(&self) -> Option<String> {
        self.last_received.read().clone()
    }

    pub fn last_sent(&self) -> Option<String> {
        self.last_sent.read().clone()
    }

    pub fn last_circuit(&self) -> Option<Vec<u32>> {
        self.last_circuit.read().clone()
    }
}

#[async_trait]
impl MessageSink for UserNode {
    async fn receive(&self, message: String) -> Result<()> {
        self.deliver(message);
        Ok(())
    }
}
