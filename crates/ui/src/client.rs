//! Bridge client
//!
//! The UI's only way to reach the host. Invokes are correlated with their
//! responses by request id; host events fan out to subscribers. Channel
//! names are checked against the allowlist before anything is sent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use firedoc_protocol::{
    ChunkRequest, Choice, ConfirmRequest, Event, FileMetadata, Invoke, MetadataRequest,
    OpenViewerRequest, ProtocolError, Request, RpcMessage, SaveRequest, Signal,
};
use rmpv::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

const EVENT_CAPACITY: usize = 16;

/// UI-side timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Deadline for a single invoke round trip. Channels that wait on a
    /// person at a dialog never time out.
    pub request_timeout: Duration,
    /// Deadline for a whole byte range, across however many reads it takes
    pub range_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            range_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Channel is not on the allowlist; nothing was sent
    #[error("channel not allowed: {0}")]
    Denied(String),

    /// Host rejected the invoke; carries the host's message
    #[error("{0}")]
    Rejected(String),

    #[error("bridge disconnected")]
    Disconnected,

    #[error("request timed out")]
    Timeout,

    #[error("unexpected result: {0}")]
    UnexpectedResult(String),

    #[error(transparent)]
    Protocol(ProtocolError),
}

impl From<ProtocolError> for BridgeError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Denied(name) => Self::Denied(name),
            other => Self::Protocol(other),
        }
    }
}

impl BridgeError {
    /// The host's convention for a dismissed save dialog
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Rejected(message) if message == "Cancelled")
    }
}

type Reply = Result<Value, BridgeError>;

/// Registry of in-flight invokes
#[derive(Debug, Default)]
struct PendingRequests {
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
}

impl PendingRequests {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a pending request and return the receiving slot
    fn register(&self, id: u64) -> PendingSlot<'_> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        PendingSlot {
            registry: self,
            id,
            rx,
        }
    }

    /// Resolve a pending request; `false` if nobody is waiting for `id`
    fn resolve(&self, id: u64, reply: Reply) -> bool {
        let tx = self.lock().remove(&id);
        tx.is_some_and(|tx| tx.send(reply).is_ok())
    }

    fn cancel(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Drop every waiter; they observe `Disconnected`
    fn clear(&self) -> usize {
        let mut pending = self.lock();
        let count = pending.len();
        pending.clear();
        count
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Removes its id from the registry when dropped, so abandoned and
/// timed-out invokes never linger
struct PendingSlot<'a> {
    registry: &'a PendingRequests,
    id: u64,
    rx: oneshot::Receiver<Reply>,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.registry.cancel(self.id);
    }
}

#[derive(Debug)]
pub struct BridgeClient {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    pending: PendingRequests,
    events: broadcast::Sender<Event>,
    next_id: AtomicU64,
    config: ClientConfig,
}

impl BridgeClient {
    /// Create a client plus the stream of encoded frames it wants sent
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (outbound, frames) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let client = Self {
            outbound,
            pending: PendingRequests::default(),
            events,
            next_id: AtomicU64::new(1),
            config,
        };
        (client, frames)
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Invokes still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Feed one frame received from the host
    pub fn handle_incoming(&self, data: &[u8]) {
        let message = match RpcMessage::decode(data) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable frame from host");
                return;
            }
        };

        match message {
            RpcMessage::Response { id, error, result } => {
                let reply = error.map_or(Ok(result), |message| Err(BridgeError::Rejected(message)));
                if !self.pending.resolve(id, reply) {
                    tracing::debug!(id, "Response for an invoke nobody awaits");
                }
            }
            RpcMessage::Notification { channel, .. } => match Event::try_from(channel.as_str()) {
                Ok(event) => {
                    // No subscribers is fine
                    let _ = self.events.send(event);
                }
                Err(e) => tracing::warn!(error = %e, "Dropping event"),
            },
            RpcMessage::Request { id, channel, .. } => {
                tracing::warn!(id, channel = %channel, "Host sent a request; ignoring");
            }
        }
    }

    /// Fail every outstanding invoke with `Disconnected`
    pub fn disconnect(&self) {
        let dropped = self.pending.clear();
        if dropped > 0 {
            tracing::warn!(dropped, "Bridge closed with invokes in flight");
        }
    }

    /// Subscribe to host events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Subscribe by event name; unknown names are denied
    pub fn subscribe_named(&self, name: &str) -> Result<broadcast::Receiver<Event>, BridgeError> {
        Event::try_from(name)?;
        Ok(self.subscribe())
    }

    pub async fn invoke(&self, request: Request) -> Reply {
        let deadline = (!request.channel().waits_on_user()).then_some(self.config.request_timeout);
        self.invoke_within(request, deadline).await
    }

    /// Invoke by channel name with raw params, validated before sending
    pub async fn invoke_named(&self, channel: &str, params: &[Value]) -> Reply {
        let channel = Invoke::try_from(channel)?;
        let request = Request::decode(channel, params)?;
        self.invoke(request).await
    }

    async fn invoke_within(&self, request: Request, deadline: Option<Duration>) -> Reply {
        let channel = request.channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = RpcMessage::Request {
            id,
            channel: channel.as_str().to_string(),
            params: request.into_params(),
        }
        .encode()?;

        let mut slot = self.pending.register(id);
        if self.outbound.send(frame).is_err() {
            return Err(BridgeError::Disconnected);
        }

        let received = match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, &mut slot.rx).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::warn!(id, channel = %channel, "Invoke timed out");
                    return Err(BridgeError::Timeout);
                }
            },
            None => (&mut slot.rx).await,
        };
        received.unwrap_or(Err(BridgeError::Disconnected))
    }

    /// Fire-and-forget signal
    pub fn send(&self, signal: Signal) -> Result<(), BridgeError> {
        let frame = RpcMessage::notification(signal.as_str()).encode()?;
        self.outbound
            .send(frame)
            .map_err(|_| BridgeError::Disconnected)
    }

    pub fn send_named(&self, name: &str) -> Result<(), BridgeError> {
        self.send(Signal::try_from(name)?)
    }

    // Typed helpers, one per channel

    /// `None` when the user dismissed the dialog
    pub async fn select_pdf(&self) -> Result<Option<String>, BridgeError> {
        match self.invoke(Request::SelectPdf).await? {
            Value::Nil => Ok(None),
            Value::String(s) => s
                .into_str()
                .map(Some)
                .ok_or_else(|| BridgeError::UnexpectedResult("path is not UTF-8".into())),
            other => Err(BridgeError::UnexpectedResult(other.to_string())),
        }
    }

    pub async fn get_file_metadata(&self, path: &str) -> Result<FileMetadata, BridgeError> {
        let result = self
            .invoke(Request::GetFileMetadata(MetadataRequest { path: path.into() }))
            .await?;
        Ok(FileMetadata::from_value(&result)?)
    }

    pub async fn read_file_chunk(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, BridgeError> {
        let request = Request::ReadFileChunk(ChunkRequest {
            path: path.into(),
            offset,
            length,
        });
        match self.invoke(request).await? {
            Value::Binary(data) => Ok(data),
            other => Err(BridgeError::UnexpectedResult(format!(
                "expected binary, got {other}"
            ))),
        }
    }

    /// Returns the saved path; a dismissed dialog is `Rejected("Cancelled")`
    pub async fn save_pdf(&self, filename: &str, data: Vec<u8>) -> Result<String, BridgeError> {
        let request = Request::SavePdf(SaveRequest {
            filename: filename.into(),
            data,
        });
        match self.invoke(request).await? {
            Value::String(s) => s
                .into_str()
                .ok_or_else(|| BridgeError::UnexpectedResult("path is not UTF-8".into())),
            other => Err(BridgeError::UnexpectedResult(other.to_string())),
        }
    }

    pub async fn navigate_to_home(&self) -> Result<(), BridgeError> {
        self.invoke(Request::NavigateToHome).await.map(drop)
    }

    pub async fn confirm_discard(&self, title: Option<&str>, message: Option<&str>) -> Result<Choice, BridgeError> {
        let request = Request::ConfirmDiscard(ConfirmRequest {
            title: title.map(String::from),
            message: message.map(String::from),
        });
        let result = self.invoke(request).await?;
        result
            .as_str()
            .and_then(Choice::parse)
            .ok_or_else(|| BridgeError::UnexpectedResult(result.to_string()))
    }

    pub async fn open_viewer(&self, path: &str) -> Result<(), BridgeError> {
        self.invoke(Request::OpenViewer(OpenViewerRequest { path: path.into() }))
            .await
            .map(drop)
    }

    pub async fn set_titlebar_visible(&self, visible: bool) -> Result<(), BridgeError> {
        self.invoke(Request::SetTitlebarVisible(visible))
            .await
            .map(drop)
    }

    pub fn minimize(&self) -> Result<(), BridgeError> {
        self.send(Signal::WindowMinimize)
    }

    pub fn maximize(&self) -> Result<(), BridgeError> {
        self.send(Signal::WindowMaximize)
    }

    pub fn close(&self) -> Result<(), BridgeError> {
        self.send(Signal::WindowClose)
    }

    pub fn close_final(&self) -> Result<(), BridgeError> {
        self.send(Signal::WindowCloseFinal)
    }

    /// Give the host's outstanding `request-close` back unanswered
    pub fn close_cancel(&self) -> Result<(), BridgeError> {
        self.send(Signal::WindowCloseCancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Answer every request in `frames` with `reply`
    fn answer_with(
        client: Arc<BridgeClient>,
        mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
        reply: impl Fn(&str, &[Value]) -> (Option<String>, Value) + Send + 'static,
    ) {
        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if let Ok(RpcMessage::Request { id, channel, params }) = RpcMessage::decode(&frame) {
                    let (error, result) = reply(&channel, &params);
                    let response = RpcMessage::Response { id, error, result }.encode().unwrap();
                    client.handle_incoming(&response);
                }
            }
        });
    }

    #[tokio::test]
    async fn denied_channels_never_hit_the_wire() {
        let (client, mut frames) = BridgeClient::new(ClientConfig::default());
        assert_eq!(
            client.invoke_named("delete_everything", &[]).await,
            Err(BridgeError::Denied("delete_everything".into()))
        );
        assert_eq!(
            client.send_named("window-explode"),
            Err(BridgeError::Denied("window-explode".into()))
        );
        assert!(client.subscribe_named("file-changed").is_err());
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn responses_resolve_by_id() {
        let (client, frames) = BridgeClient::new(ClientConfig::default());
        let client = Arc::new(client);
        answer_with(client.clone(), frames, |channel, _| match channel {
            "select_pdf" => (None, Value::from("/docs/a.pdf")),
            "save_pdf" => (Some("Cancelled".into()), Value::Nil),
            _ => (Some("unexpected".into()), Value::Nil),
        });

        assert_eq!(client.select_pdf().await.unwrap().as_deref(), Some("/docs/a.pdf"));
        let err = client.save_pdf("a.pdf", vec![1; 500]).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn timeout_clears_pending_slot() {
        let config = ClientConfig {
            request_timeout: Duration::from_millis(50),
            ..ClientConfig::default()
        };
        let (client, _frames) = BridgeClient::new(config);
        assert_eq!(client.navigate_to_home().await, Err(BridgeError::Timeout));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn dialog_channels_outlive_request_timeout() {
        let config = ClientConfig {
            request_timeout: Duration::from_millis(50),
            ..ClientConfig::default()
        };
        let (client, mut frames) = BridgeClient::new(config);
        let client = Arc::new(client);
        {
            let client = client.clone();
            tokio::spawn(async move {
                while let Some(frame) = frames.recv().await {
                    if let Ok(RpcMessage::Request { id, .. }) = RpcMessage::decode(&frame) {
                        // The user takes a while to decide
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        client.handle_incoming(&RpcMessage::ok(id, Value::from("discard")).encode().unwrap());
                    }
                }
            });
        }

        assert_eq!(client.confirm_discard(None, None).await, Ok(Choice::Discard));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn disconnect_fails_waiters() {
        let (client, mut frames) = BridgeClient::new(ClientConfig::default());
        let client = Arc::new(client);
        let waiter = {
            let client = client.clone();
            tokio::spawn(async move { client.select_pdf().await })
        };
        // Request is on the wire before the bridge goes away
        frames.recv().await.unwrap();
        client.disconnect();
        assert_eq!(waiter.await.unwrap(), Err(BridgeError::Disconnected));
    }

    #[tokio::test]
    async fn events_reach_subscribers() {
        let (client, _frames) = BridgeClient::new(ClientConfig::default());
        let mut events = client.subscribe();

        client.handle_incoming(&RpcMessage::notification("not-an-event").encode().unwrap());
        client.handle_incoming(&RpcMessage::notification("request-close").encode().unwrap());
        assert_eq!(events.recv().await.unwrap(), Event::RequestClose);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn signals_are_notifications() {
        let (client, mut frames) = BridgeClient::new(ClientConfig::default());
        client.close_final().unwrap();
        let frame = frames.recv().await.unwrap();
        assert_eq!(
            RpcMessage::decode(&frame).unwrap(),
            RpcMessage::notification("window-close-final")
        );
    }
}
