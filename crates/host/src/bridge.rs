//! Bridge dispatcher
//!
//! Decodes frames from the UI, enforces the channel allowlist, validates
//! the typed envelope and routes to the file service, guard or window.
//!
//! Protocol envelope:
//! - Type 0: invoke `[0, id, channel, params]` -> `[1, id, error, result]`
//! - Type 2: signal `[2, channel, params]`, no response
//!
//! Host events go out on a broadcast channel as type 2 frames.

use std::sync::Arc;

use anyhow::Result;
use firedoc_protocol::{Event, Invoke, Request, RpcMessage, Signal};
use rmpv::Value;
use tokio::sync::broadcast;

use crate::guard::{AppMode, CloseDecision, NavigationGuard};
use crate::service::HostFileService;
use crate::window::Window;

const EVENT_CAPACITY: usize = 64;

pub struct HostBridge {
    service: Arc<HostFileService>,
    guard: Arc<NavigationGuard>,
    window: Arc<dyn Window>,
    events: broadcast::Sender<Vec<u8>>,
}

impl HostBridge {
    pub fn new(
        service: Arc<HostFileService>,
        guard: Arc<NavigationGuard>,
        window: Arc<dyn Window>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            service,
            guard,
            window,
            events,
        }
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    /// Encoded host-to-UI event frames
    pub fn subscribe_events(&self) -> broadcast::Receiver<Vec<u8>> {
        self.events.subscribe()
    }

    /// Handle one frame from the UI
    ///
    /// Returns the response frame for invokes. Signals and stray responses
    /// produce nothing. Every failure inside an invoke becomes a rejected
    /// response; only an undecodable frame is an `Err`.
    #[tracing::instrument(skip(self, data), fields(len = data.len()), level = "debug")]
    pub async fn handle_message(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        match RpcMessage::decode(data)? {
            RpcMessage::Request {
                id,
                channel,
                params,
            } => {
                let response = match self.invoke(&channel, &params).await {
                    Ok(result) => RpcMessage::ok(id, result),
                    Err(message) => {
                        tracing::debug!(id, channel = %channel, error = %message, "Invoke rejected");
                        RpcMessage::err(id, message)
                    }
                };
                Ok(Some(response.encode()?))
            }
            RpcMessage::Notification { channel, .. } => {
                match Signal::try_from(channel.as_str()) {
                    Ok(signal) => self.handle_signal(signal),
                    Err(e) => tracing::warn!(error = %e, "Dropping signal"),
                }
                Ok(None)
            }
            RpcMessage::Response { id, .. } => {
                tracing::warn!(id, "Unexpected response frame from UI");
                Ok(None)
            }
        }
    }

    async fn invoke(&self, channel: &str, params: &[Value]) -> Result<Value, String> {
        let channel = Invoke::try_from(channel).map_err(|e| e.to_string())?;
        let request = Request::decode(channel, params).map_err(|e| e.to_string())?;
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request) -> Result<Value, String> {
        match request {
            Request::SelectPdf => self
                .service
                .open_file_dialog()
                .await
                .map(|path| path.map_or(Value::Nil, Value::from))
                .map_err(|e| {
                    tracing::warn!(error = %e, "Picked path cannot cross the bridge");
                    e.to_string()
                }),

            Request::GetFileMetadata(req) => self
                .service
                .stat(&req.path)
                .await
                .map(|meta| meta.to_value())
                .map_err(|e| {
                    tracing::warn!(path = %req.path, error = %e, "Metadata lookup failed");
                    e.to_string()
                }),

            Request::ReadFileChunk(req) => self
                .service
                .read_chunk(&req.path, req.offset, req.length)
                .await
                .map(Value::Binary)
                .map_err(|e| {
                    tracing::warn!(path = %req.path, offset = req.offset, error = %e, "Chunk read failed");
                    e.to_string()
                }),

            Request::SavePdf(req) => match self.service.save_as(&req.filename, &req.data).await {
                Ok(path) => Ok(Value::from(path)),
                Err(e) if e.is_cancelled() => Err(e.to_string()),
                Err(e) => {
                    tracing::error!(filename = %req.filename, error = %e, "Save failed");
                    Err(e.to_string())
                }
            },

            Request::NavigateToHome => self
                .guard
                .navigate(self.window.as_ref(), AppMode::Home)
                .await
                .map(|()| Value::Nil)
                .map_err(|e| e.to_string()),

            Request::ConfirmDiscard(req) => {
                let choice = self
                    .service
                    .confirm_discard(req.title.as_deref(), req.message.as_deref())
                    .await;
                self.guard.on_confirm_choice(choice);
                Ok(Value::from(choice.as_str()))
            }

            Request::OpenViewer(req) => {
                let meta = self.service.stat(&req.path).await.map_err(|e| e.to_string())?;
                tracing::info!(name = %meta.name, size = meta.size, "Opening viewer");
                self.guard
                    .navigate(self.window.as_ref(), AppMode::Viewer)
                    .await
                    .map(|()| Value::Nil)
                    .map_err(|e| e.to_string())
            }

            Request::SetTitlebarVisible(visible) => {
                self.window.set_menu_bar_visible(visible);
                Ok(Value::Nil)
            }
        }
    }

    fn handle_signal(&self, signal: Signal) {
        match signal {
            Signal::WindowMinimize => self.window.minimize(),
            Signal::WindowMaximize => self.window.toggle_maximize(),
            Signal::WindowClose => {
                if !self.on_window_close_requested() {
                    self.window.close();
                }
            }
            // The UI has already resolved unsaved changes, so the close
            // goes ahead even over an in-flight navigation
            Signal::WindowCloseFinal => match self.guard.begin_close() {
                Ok(intent) => {
                    self.window.close();
                    drop(intent);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Closing over an in-flight guarded action");
                    self.guard.mark_closing();
                    self.window.close();
                }
            },
            Signal::WindowCloseCancel => {
                self.guard.on_close_declined();
            }
        }
    }

    /// The UI connection went away; nobody is left to answer a close request
    pub fn on_ui_disconnected(&self) {
        if self.guard.on_close_declined() {
            tracing::info!("Dropped close request of a disconnected UI");
        }
    }

    /// Close requested by the UI or the native title bar
    ///
    /// Returns `true` when the close must be prevented.
    pub fn on_window_close_requested(&self) -> bool {
        match self.guard.on_close_signal() {
            CloseDecision::Close => false,
            CloseDecision::AskRenderer => {
                if self.emit(Event::RequestClose) {
                    return true;
                }
                // Without a UI there is no document to protect
                self.guard.mark_closing();
                false
            }
            CloseDecision::Ignore => {
                tracing::debug!("Close already pending");
                true
            }
        }
    }

    /// Whether a page's unload handler may veto the current load
    pub fn will_prevent_unload(&self) -> bool {
        !self.guard.bypass_unload_prevention()
    }

    /// Returns `false` when no UI was subscribed to receive `event`
    fn emit(&self, event: Event) -> bool {
        match RpcMessage::notification(event.as_str()).encode() {
            Ok(frame) => {
                let delivered = self.events.send(frame).is_ok();
                if !delivered {
                    tracing::warn!(event = %event, "No UI connected for event");
                }
                delivered
            }
            Err(e) => {
                tracing::error!(event = %event, error = %e, "Failed to encode event");
                false
            }
        }
    }
}
