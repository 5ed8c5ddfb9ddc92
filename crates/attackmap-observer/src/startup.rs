//! Background startup helper for the client binary.
//!
//! [`spawn_observer`] binds eagerly, so a taken port is reported to the
//! caller instead of being logged from inside a detached task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, bind, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind the snapshot API and serve it on a background task.
///
/// Returns the task handle and the bound address. The server runs until
/// the handle is aborted or the runtime shuts down.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address cannot be bound.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<(JoinHandle<()>, SocketAddr), StartupError> {
    let listener = bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "Snapshot API exited with error");
        }
    });

    tracing::info!(%addr, "Snapshot API spawned on background task");
    Ok((handle, addr))
}
