//! Starting nodes and whole networks on one runtime.

use crate::client::{HttpDirectory, HttpDispatcher};
use crate::server::{self, ServiceHandle};
use crate::{NodeError, Result};
use std::sync::Arc;
use synapsed_onion::{
    CircuitBuilder, InMemoryDirectory, LayerCodec, Node, NodeDirectory, OnionConfig,
    RelayForwarder, RelayKeyPair, RoutingError, UserNode,
};

/// A running relay.
#[derive(Debug)]
pub struct RelayHandle {
    pub relay: Arc<RelayForwarder>,
    pub service: ServiceHandle,
}

/// A running user.
pub struct UserHandle {
    pub user: Arc<UserNode>,
    pub service: ServiceHandle,
}

pub async fn spawn_registry(config: &OnionConfig) -> Result<(InMemoryDirectory, ServiceHandle)> {
    let directory = InMemoryDirectory::new();
    let listener = server::bind(&config.network.host, config.network.registry_port).await?;
    let service = server::spawn(
        "registry",
        listener,
        server::registry_router(directory.clone()),
    )?;
    Ok((directory, service))
}

/// Starts relay `node_id` with a fresh key pair and registers it once its
/// port is bound.
pub async fn spawn_relay(config: &OnionConfig, node_id: u32) -> Result<RelayHandle> {
    let space = config.address_space()?;
    let address = space.relay_address(node_id)?;
    let keys = RelayKeyPair::generate();
    let public_key = keys.public_key();

    let relay = Arc::new(RelayForwarder::new(
        node_id,
        keys,
        LayerCodec::new(&config.codec)?,
        space,
        Arc::new(HttpDispatcher::new(config)?),
    ));

    let listener = server::bind(&config.network.host, port(address.value())?).await?;
    let service = server::spawn(
        format!("relay-{node_id}"),
        listener,
        server::relay_router(relay.clone()),
    )?;

    HttpDirectory::new(config)?
        .register(Node::new(node_id, public_key))
        .await?;
    tracing::info!(node_id, %address, "Relay registered");

    Ok(RelayHandle { relay, service })
}

pub async fn spawn_user(config: &OnionConfig, user_id: u32) -> Result<UserHandle> {
    let space = config.address_space()?;
    let address = space.recipient_address(user_id)?;
    let builder = CircuitBuilder::new(LayerCodec::new(&config.codec)?, space);

    let user = Arc::new(UserNode::new(
        user_id,
        builder,
        Arc::new(HttpDirectory::new(config)?),
        Arc::new(HttpDispatcher::new(config)?),
    ));

    let listener = server::bind(&config.network.host, port(address.value())?).await?;
    let service = server::spawn(
        format!("user-{user_id}"),
        listener,
        server::user_router(user.clone()),
    )?;

    Ok(UserHandle { user, service })
}

/// Registry, relays and users of one simulated overlay.
pub struct OverlayHandle {
    pub directory: InMemoryDirectory,
    pub registry: ServiceHandle,
    pub relays: Vec<RelayHandle>,
    pub users: Vec<UserHandle>,
}

impl OverlayHandle {
    /// Stops users, then relays, then the registry.
    pub async fn shutdown(self) -> Result<()> {
        for user in self.users {
            user.service.shutdown().await?;
        }
        for relay in self.relays {
            relay.service.shutdown().await?;
        }
        self.registry.shutdown().await
    }
}

/// Starts a registry plus `relays` relays and `users` users. Returns once
/// every relay is registered.
pub async fn launch_network(config: &OnionConfig, relays: u32, users: u32) -> Result<OverlayHandle> {
    config.validate()?;
    let (directory, registry) = spawn_registry(config).await?;

    let mut relay_handles = Vec::with_capacity(relays as usize);
    for node_id in 0..relays {
        relay_handles.push(spawn_relay(config, node_id).await?);
    }

    let mut user_handles = Vec::with_capacity(users as usize);
    for user_id in 0..users {
        user_handles.push(spawn_user(config, user_id).await?);
    }

    tracing::info!(
        relays,
        users,
        registered = directory.len(),
        "Overlay network running"
    );
    Ok(OverlayHandle {
        directory,
        registry,
        relays: relay_handles,
        users: user_handles,
    })
}

fn port(address: u32) -> Result<u16> {
    u16::try_from(address).map_err(|_| {
        NodeError::from(RoutingError::InvalidConfig(format!(
            "address {address} is not a TCP port"
        )))
    })
}
