//! HTTP implementations of the overlay's outbound collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use synapsed_onion::{
    Address, Dispatcher, Node, NodeDirectory, OnionConfig, Result, RoutingError,
};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MessageBody {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RegistrySnapshot {
    pub nodes: Vec<Node>,
}

fn build_client(config: &OnionConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if config.transport.request_timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.transport.request_timeout_ms));
    }
    builder
        .build()
        .map_err(|e| RoutingError::InvalidConfig(format!("failed to build HTTP client: {e}")))
}

/// Posts `{"message": ...}` to `http://{host}:{address}/message`.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    host: String,
}

impl HttpDispatcher {
    pub fn new(config: &OnionConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            host: config.network.host.clone(),
        })
    }

    fn url(&self, target: Address) -> String {
        format!("http://{}:{}/message", self.host, target.value())
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, target: Address, message: String) -> Result<()> {
        let url = self.url(target);
        let response = self
            .client
            .post(&url)
            .json(&MessageBody { message })
            .send()
            .await
            .map_err(|e| RoutingError::dispatch(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RoutingError::dispatch(&url, format!("{status}: {body}")));
        }
        tracing::trace!(%target, "Message handed over");
        Ok(())
    }
}

/// Client for the registry service.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectory {
    pub fn new(config: &OnionConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: format!(
                "http://{}:{}",
                config.network.host, config.network.registry_port
            ),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl NodeDirectory for HttpDirectory {
    async fn register(&self, node: Node) -> Result<()> {
        let url = format!("{}/registerNode", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&node)
            .send()
            .await
            .map_err(|e| RoutingError::dispatch(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RoutingError::dispatch(&url, format!("{status}: {body}")));
        }
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let url = format!("{}/getNodeRegistry", self.base_url);
        let snapshot: RegistrySnapshot = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RoutingError::dispatch(&url, e))?
            .json()
            .await
            .map_err(|e| RoutingError::dispatch(&url, format!("invalid registry response: {e}")))?;
        Ok(snapshot.nodes)
    }
}
