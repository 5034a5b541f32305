//! Sender-side circuit selection and envelope construction.

use crate::address::{Address, AddressSpace};
use crate::codec::{Envelope, LayerCodec};
use crate::keys::RelayPublicKey;
use crate::{Result, RoutingError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of relays in every circuit: entry, middle, exit.
pub const CIRCUIT_LENGTH: usize = 3;

/// A relay as published by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "nodeId")]
    pub id: u32,
    #[serde(rename = "pubKey")]
    pub public_key: RelayPublicKey,
}

impl Node {
    pub fn new(id: u32, public_key: RelayPublicKey) -> Self {
        Self { id, public_key }
    }
}

/// An ordered entry → middle → exit path of distinct relays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    nodes: [Node; CIRCUIT_LENGTH],
}

impl Circuit {
    /// Checks the length and distinctness invariants.
    pub fn new(nodes: Vec<Node>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(nodes.len());
        if let Some(duplicate) = nodes.iter().find(|node| !seen.insert(node.id)) {
            return Err(RoutingError::CircuitCreation(format!(
                "node {} appears more than once",
                duplicate.id
            )));
        }

        let count = nodes.len();
        let nodes: [Node; CIRCUIT_LENGTH] = nodes.try_into().map_err(|_| {
            RoutingError::CircuitCreation(format!(
                "a circuit needs exactly {CIRCUIT_LENGTH} nodes, got {count}"
            ))
        })?;
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn entry(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn node_ids(&self) -> Vec<u32> {
        self.nodes.iter().map(|node| node.id).collect()
    }
}

/// Picks circuits from directory snapshots and wraps messages for them.
pub struct CircuitBuilder {
    codec: LayerCodec,
    space: AddressSpace,
    rng: Mutex<StdRng>,
}

impl CircuitBuilder {
    pub fn new(codec: LayerCodec, space: AddressSpace) -> Self {
        Self::with_rng(codec, space, StdRng::from_entropy())
    }

    /// Deterministic node selection, for tests and reproducible runs.
    pub fn with_seed(codec: LayerCodec, space: AddressSpace, seed: u64) -> Self {
        Self::with_rng(codec, space, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(codec: LayerCodec, space: AddressSpace, rng: StdRng) -> Self {
        Self {
            codec,
            space,
            rng: Mutex::new(rng),
        }
    }

    pub fn codec(&self) -> &LayerCodec {
        &self.codec
    }

    pub fn address_space(&self) -> &AddressSpace {
        &self.space
    }

    /// Samples three distinct relays uniformly without replacement.
    pub fn select_circuit(&self, snapshot: &[Node]) -> Result<Circuit> {
        let mut seen = HashSet::with_capacity(snapshot.len());
        let candidates: Vec<&Node> = snapshot.iter().filter(|node| seen.insert(node.id)).collect();

        if candidates.len() < CIRCUIT_LENGTH {
            return Err(RoutingError::InsufficientNodes {
                available: candidates.len(),
                required: CIRCUIT_LENGTH,
            });
        }

        let chosen: Vec<Node> = {
            let mut rng = self.rng.lock();
            candidates
                .choose_multiple(&mut *rng, CIRCUIT_LENGTH)
                .map(|node| (*node).clone())
                .collect()
        };

        Circuit::new(chosen)
    }

    /// Wraps `plaintext` exit-first so that layer *i* is readable only by
    /// node *i* and names node *i + 1* (the recipient for the exit layer).
    pub fn build_envelope(
        &self,
        circuit: &Circuit,
        destination: Address,
        plaintext: &[u8],
    ) -> Result<Envelope> {
        let mut target = destination;
        let mut payload = plaintext.to_vec();

        for node in circuit.nodes().iter().rev() {
            let layer = self.codec.wrap_layer(target, &payload, &node.public_key)?;
            tracing::debug!(
                node_id = node.id,
                next_hop = %target,
                layer_len = layer.len(),
                "Wrapped onion layer"
            );
            payload = layer.into_string().into_bytes();
            target = self.space.relay_address(node.id)?;
        }

        String::from_utf8(payload)
            .map(Envelope::from)
            .map_err(|_| RoutingError::EncryptionError("envelope is not text".to_string()))
    }
}
