//! Message delivery between hops.
//!
//! [`Dispatcher`] is the outbound half (send a message to an address),
//! [`MessageSink`] the inbound half (a node's message interface). The HTTP
//! implementation lives in the node crate; the in-memory network here routes
//! between sinks in one process.

use crate::address::Address;
use crate::{Result, RoutingError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Sends a message to the node listening at an address.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Fails with [`RoutingError::DispatchFailure`] if the message could not
    /// be handed over. Never retries.
    async fn dispatch(&self, target: Address, message: String) -> Result<()>;
}

/// The message-receiving interface of a relay or recipient.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn receive(&self, message: String) -> Result<()>;
}

/// In-process network: addresses map directly to sinks.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    sinks: Arc<RwLock<HashMap<Address, Arc<dyn MessageSink>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, address: Address, sink: Arc<dyn MessageSink>) {
        self.sinks.write().insert(address, sink);
    }

    pub fn detach(&self, address: Address) {
        self.sinks.write().remove(&address);
    }
}

#[async_trait]
impl Dispatcher for MemoryNetwork {
    async fn dispatch(&self, target: Address, message: String) -> Result<()> {
        let sink = self
            .sinks
            .read()
            .get(&target)
            .cloned()
            .ok_or_else(|| RoutingError::dispatch(target, "no node listening"))?;

        sink.receive(message)
            .await
            .map_err(|e| RoutingError::dispatch(target, e))
    }
}

/// Captures outbound messages instead of delivering them, so a caller can
/// carry each hop's output to the next hop by hand.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<(Address, String)>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(Address, String)> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn last(&self) -> Option<(Address, String)> {
        self.sent.lock().last().cloned()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, target: Address, message: String) -> Result<()> {
        self.sent.lock().push((target, message));
        Ok(())
    }
}
