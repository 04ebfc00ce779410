//! Observer startup helper for embedding in the engine binary.
//!
//! [`spawn_observer`] binds eagerly, so a taken port fails startup instead
//! of surfacing later on a background task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use simgate_core::config::ServerConfig;
use tokio::task::JoinHandle;

use crate::server::{self, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A running observer server.
#[derive(Debug)]
pub struct ObserverHandle {
    /// Address the server is bound to.
    pub addr: SocketAddr,
    /// Task serving requests; finishes after the shutdown future resolves.
    pub task: JoinHandle<()>,
}

/// Bind the observer and serve it on a background Tokio task.
///
/// # Errors
///
/// [`StartupError::Server`] if the listener cannot bind.
pub async fn spawn_observer<F>(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<ObserverHandle, StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no address: {e}")))?;

    let task = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");
    Ok(ObserverHandle { addr, task })
}
