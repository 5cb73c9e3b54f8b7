//! WebSocket bridge server using tokio-tungstenite
//!
//! Carries MessagePack-RPC frames between the sandboxed UI and the host.
//! Listens on loopback only and validates the handshake origin.
//!
//! ## Module Structure
//! - `protocol`: origin validation
//! - `connection`: handshake, per-connection reader and writer tasks

mod connection;
mod protocol;

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;

use crate::bridge::HostBridge;

pub use connection::handle_connection;
pub use protocol::{validate_origin, ALLOWED_ORIGINS};

/// Accept bridge connections until the listener fails
pub async fn serve(listener: TcpListener, bridge: Arc<HostBridge>) -> Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Bridge listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let bridge = bridge.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, bridge).await {
                        tracing::warn!(peer = %peer, error = %e, "Connection error");
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Accept failed");
            }
        }
    }
}
