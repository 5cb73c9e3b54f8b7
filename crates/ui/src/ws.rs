//! WebSocket connection to the host bridge

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::client::{BridgeClient, ClientConfig};

/// A live bridge connection; dropping it tears the socket down
pub struct Connection {
    client: Arc<BridgeClient>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    pub fn client(&self) -> Arc<BridgeClient> {
        self.client.clone()
    }

    /// Resolves when the host closes the connection
    pub async fn closed(&mut self) {
        if !self.reader.is_finished() {
            let _ = (&mut self.reader).await;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
        self.client.disconnect();
    }
}

/// Connect to the host at `url`, e.g. `ws://127.0.0.1:9417`
pub async fn connect(url: &str, config: ClientConfig) -> Result<Connection> {
    let (ws, _) = connect_async(url)
        .await
        .with_context(|| format!("connecting to {url}"))?;
    let (mut ws_tx, mut ws_rx) = ws.split();
    tracing::info!(url, "Connected to host");

    let (client, mut frames) = BridgeClient::new(config);
    let client = Arc::new(client);

    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Err(e) = ws_tx.send(Message::Binary(frame)).await {
                tracing::warn!(error = %e, "Send to host failed");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let reader = {
        let client = client.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Binary(data)) => client.handle_incoming(&data),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "Read from host failed");
                        break;
                    }
                }
            }
            client.disconnect();
            tracing::info!("Host connection closed");
        })
    };

    Ok(Connection {
        client,
        reader,
        writer,
    })
}
