//! WebSocket connection handling
//!
//! One writer task owns the socket sink and merges invoke responses with
//! host events. The reader spawns a task per frame so a dialog waiting on
//! the user never holds up chunk reads.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use crate::bridge::HostBridge;

use super::protocol::request_origin_allowed;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Serve a single UI connection until either side closes it
pub async fn handle_connection<S>(stream: S, bridge: Arc<HostBridge>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let callback = |req: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
        let (allowed, origin) = request_origin_allowed(req);
        if allowed {
            return Ok(response);
        }
        tracing::warn!(origin = ?origin, "Rejected connection from invalid origin");
        let mut rejection = ErrorResponse::new(Some("Origin not allowed".to_string()));
        *rejection.status_mut() = http::StatusCode::FORBIDDEN;
        Err(rejection)
    };

    let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => bail!("handshake failed: {e}"),
    };
    let (mut ws_tx, mut ws_rx) = ws.split();
    tracing::info!("UI connected");

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let mut events = bridge.subscribe_events();

    // Dedicated sender task
    let sender_handle = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            let msg = tokio::select! {
                Some(msg) = out_rx.recv() => msg,
                event = events.recv() => match event {
                    Ok(frame) => Message::Binary(frame),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(dropped = n, "Event stream lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = heartbeat.tick() => Message::Ping(Vec::new()),
            };
            if let Err(e) = ws_tx.send(msg).await {
                tracing::debug!(error = %e, "Send failed, stopping sender");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Binary(data)) => {
                let bridge = bridge.clone();
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    match bridge.handle_message(&data).await {
                        Ok(Some(response)) => {
                            // Receiver is gone only once the connection is closing
                            let _ = out_tx.send(Message::Binary(response));
                        }
                        Ok(None) => {}
                        Err(e) => tracing::warn!(error = %e, "Dropping undecodable frame"),
                    }
                });
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Read failed");
                break;
            }
        }
    }

    sender_handle.abort();
    bridge.on_ui_disconnected();
    tracing::info!("UI disconnected");
    Ok(())
}
