//! Node directory: the id → public key registry relays publish to.

use crate::circuit::Node;
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read/write access to the relay registry.
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// Publishes a relay, replacing any previous entry with the same id.
    async fn register(&self, node: Node) -> Result<()>;

    /// Snapshot of every registered relay.
    async fn list_nodes(&self) -> Result<Vec<Node>>;
}

/// Process-local directory; also backs the registry service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    nodes: Arc<RwLock<BTreeMap<u32, Node>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, node: Node) {
        let id = node.id;
        if self.nodes.write().insert(id, node).is_some() {
            tracing::debug!(node_id = id, "Replaced existing directory entry");
        }
    }

    pub fn snapshot(&self) -> Vec<Node> {
        self.nodes.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

#[async_trait]
impl NodeDirectory for InMemoryDirectory {
    async fn register(&self, node: Node) -> Result<()> {
        self.insert(node);
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RelayKeyPair;

    #[tokio::test]
    async fn test_reregistration_replaces() {
        let directory = InMemoryDirectory::new();
        let first = RelayKeyPair::generate().public_key();
        let second = RelayKeyPair::generate().public_key();

        directory.register(Node::new(1, first)).await.unwrap();
        directory.register(Node::new(2, first)).await.unwrap();
        directory.register(Node::new(1, second)).await.unwrap();

        let nodes = directory.list_nodes().await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0], Node::new(1, second));
    }
}
