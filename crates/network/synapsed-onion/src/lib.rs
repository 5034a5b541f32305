//! # Synapsed Onion
//!
//! Layered onion encryption for the Synapsed overlay.
//!
//! A sender wraps a message in one encryption layer per relay of a three-hop
//! circuit. Each relay peels exactly one layer, learns only the next hop, and
//! passes the rest on; the exit relay hands the plaintext to the recipient.
//!
//! - **Layer codec**: fixed-offset framing, X25519 key wrap, AES-GCM payloads
//! - **Circuit builder**: uniform selection of three distinct relays and
//!   exit-first envelope construction
//! - **Relay forwarder**: one unwrap per message, dispatch by address range
//! - **Directory**: id → public key registry fed by relays at startup
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use synapsed_onion::{
//!     CircuitBuilder, InMemoryDirectory, LayerCodec, MemoryNetwork, OnionConfig,
//!     RelayForwarder, RelayKeyPair, UserNode, Node, NodeDirectory,
//! };
//!
//! # async fn demo() -> synapsed_onion::Result<()> {
//! let config = OnionConfig::default();
//! let space = config.address_space()?;
//! let network = MemoryNetwork::new();
//! let directory = Arc::new(InMemoryDirectory::new());
//!
//! for id in 0..3 {
//!     let keys = RelayKeyPair::generate();
//!     directory.register(Node::new(id, keys.public_key())).await?;
//!     let relay = RelayForwarder::new(
//!         id, keys, LayerCodec::new(&config.codec)?, space.clone(), Arc::new(network.clone()),
//!     );
//!     network.attach(space.relay_address(id)?, Arc::new(relay));
//! }
//!
//! let builder = CircuitBuilder::new(LayerCodec::new(&config.codec)?, space.clone());
//! let alice = UserNode::new(0, builder, directory, Arc::new(network.clone()));
//! alice.send_message("hello", 1).await?;
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod circuit;
pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod forwarder;
pub mod keys;
pub mod transport;
pub mod user;

// Re-exports for convenience
pub use address::{Address, AddressSpace, HopTarget, ADDRESS_WIDTH};
pub use circuit::{Circuit, CircuitBuilder, Node, CIRCUIT_LENGTH};
pub use codec::{Envelope, LayerCodec, SymmetricCipher, UnwrappedLayer};
pub use config::{CodecConfig, NetworkConfig, OnionConfig, TransportConfig};
pub use directory::{InMemoryDirectory, NodeDirectory};
pub use error::{Result, RoutingError};
pub use forwarder::{ForwardOutcome, RelayDiagnostics, RelayForwarder, RelayState};
pub use keys::{RelayKeyPair, RelayPublicKey};
pub use transport::{Dispatcher, MemoryNetwork, MessageSink, RecordingDispatcher};
pub use user::{SentMessage, UserNode};
