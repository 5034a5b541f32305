//! # Synapsed Onion Node
//!
//! HTTP services for the onion overlay in [`synapsed_onion`]:
//!
//! - **Registry**: relays publish `(nodeId, pubKey)`, users list them
//! - **Relay**: peels one layer per `POST /message` and posts the rest onward
//! - **User**: sends through random three-hop circuits and receives plaintext
//!
//! Each node listens on the port equal to its overlay address, so a next-hop
//! address is also the port to post to.

pub mod client;
pub mod error;
pub mod launcher;
pub mod server;

pub use client::{HttpDirectory, HttpDispatcher};
pub use error::{ApiError, NodeError, Result};
pub use launcher::{
    launch_network, spawn_registry, spawn_relay, spawn_user, OverlayHandle, RelayHandle,
    UserHandle,
};
pub use server::{registry_router, relay_router, user_router, ServiceHandle};
