//! HTTP services for the overlay roles

mod registry;
mod relay;
mod user;

pub use registry::registry_router;
pub use relay::relay_router;
pub use user::user_router;

use crate::{NodeError, Result};
use axum::Router;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Body of every diagnostic `GET` endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct ResultBody<T> {
    pub result: T,
}

impl<T> ResultBody<T> {
    pub fn new(result: T) -> axum::Json<Self> {
        axum::Json(Self { result })
    }
}

/// Binds `host:port`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| NodeError::Server(format!("Invalid address {host}:{port}: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| NodeError::Server(format!("Failed to bind {addr}: {e}")))?;
    Ok(listener)
}

/// A running service; dropping it leaves the server running.
#[derive(Debug)]
pub struct ServiceHandle {
    name: String,
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ServiceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task
            .await
            .map_err(|e| NodeError::Server(format!("{} task failed: {e}", self.name)))?
    }

    /// Waits until the server stops on its own.
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| NodeError::Server(format!("{} task failed: {e}", self.name)))?
    }
}

/// Serves `router` on `listener` in a background task.
pub fn spawn(name: impl Into<String>, listener: TcpListener, router: Router) -> Result<ServiceHandle> {
    let name = name.into();
    let local_addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel::<()>();

    tracing::info!(service = %name, %local_addr, "Service listening");
    let task_name = name.clone();
    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                // A dropped handle keeps the server up.
                if rx.await.is_err() {
                    std::future::pending::<()>().await;
                }
            })
            .await
            .map_err(|e| NodeError::Server(format!("{task_name}: {e}")))?;
        tracing::info!(service = %task_name, "Service stopped");
        Ok(())
    });

    Ok(ServiceHandle {
        name,
        local_addr,
        shutdown: Some(tx),
        task,
    })
}
