//! Document lifecycle
//!
//! Resolves unsaved changes before the window closes or the viewer goes
//! back home. The host decides *when* to ask; this side asks the user and
//! only then tells the host to proceed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use firedoc_protocol::{Choice, Event};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::client::{BridgeClient, BridgeError};

/// The loaded document, as far as the lifecycle cares
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Serialize the document with the user's edits applied
    async fn save_document(&self) -> anyhow::Result<Vec<u8>>;

    fn has_unsaved_changes(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// `window-close-final` was sent
    Closed,
    /// The user chose to stay, or dismissed the save dialog
    Kept,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeOutcome {
    Navigated,
    Stayed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(String),
    Cancelled,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not serialize the document: {0}")]
    Document(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("a close or navigation is already being handled")]
    Busy,
}

pub struct ViewerLifecycle {
    client: Arc<BridgeClient>,
    document: Arc<dyn DocumentSource>,
    filename: String,
    busy: AtomicBool,
}

impl ViewerLifecycle {
    pub fn new(client: Arc<BridgeClient>, document: Arc<dyn DocumentSource>, filename: impl Into<String>) -> Self {
        Self {
            client,
            document,
            filename: filename.into(),
            busy: AtomicBool::new(false),
        }
    }

    fn enter(&self) -> Result<Busy<'_>, LifecycleError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Busy(&self.busy))
            .map_err(|_| LifecycleError::Busy)
    }

    /// Answer the host's `request-close`
    ///
    /// `close-final` goes out only once nothing unsaved would be lost. A
    /// request this side cannot answer, because another flow is running or
    /// something failed, is handed back with `close-cancel` so the host
    /// stops waiting on it.
    pub async fn handle_close_request(&self) -> Result<CloseOutcome, LifecycleError> {
        let result = self.answer_close_request().await;
        if result.is_err() {
            if let Err(e) = self.client.close_cancel() {
                tracing::debug!(error = %e, "Could not hand back close request");
            }
        }
        result
    }

    async fn answer_close_request(&self) -> Result<CloseOutcome, LifecycleError> {
        let _busy = self.enter()?;

        if !self.document.has_unsaved_changes() {
            self.client.close_final()?;
            return Ok(CloseOutcome::Closed);
        }

        match self.client.confirm_discard(None, None).await? {
            Choice::Save => match self.save().await? {
                SaveOutcome::Saved(_) => {
                    self.client.close_final()?;
                    Ok(CloseOutcome::Closed)
                }
                SaveOutcome::Cancelled => Ok(CloseOutcome::Kept),
            },
            Choice::Discard => {
                self.client.close_final()?;
                Ok(CloseOutcome::Closed)
            }
            Choice::Cancel => Ok(CloseOutcome::Kept),
        }
    }

    /// Leave the viewer, resolving unsaved changes first
    pub async fn go_home(&self) -> Result<HomeOutcome, LifecycleError> {
        let _busy = self.enter()?;

        if self.document.has_unsaved_changes() {
            match self.client.confirm_discard(None, None).await? {
                Choice::Save => {
                    if self.save().await? == SaveOutcome::Cancelled {
                        return Ok(HomeOutcome::Stayed);
                    }
                }
                Choice::Discard => {}
                Choice::Cancel => return Ok(HomeOutcome::Stayed),
            }
        }

        self.client.navigate_to_home().await?;
        Ok(HomeOutcome::Navigated)
    }

    /// Serialize the document and hand it to the host's save dialog
    pub async fn save(&self) -> Result<SaveOutcome, LifecycleError> {
        let data = self
            .document
            .save_document()
            .await
            .map_err(|e| LifecycleError::Document(format!("{e:#}")))?;

        match self.client.save_pdf(&self.filename, data).await {
            Ok(path) => {
                tracing::info!(path = %path, "Document saved");
                Ok(SaveOutcome::Saved(path))
            }
            Err(e) if e.is_cancelled() => Ok(SaveOutcome::Cancelled),
            Err(e) => Err(e.into()),
        }
    }

    /// Answer every `request-close` from the host until the bridge closes
    ///
    /// A request that arrives while another flow is running is handed back.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut events = self.client.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(Event::RequestClose) => {
                        let this = self.clone();
                        tokio::spawn(async move {
                            match this.handle_close_request().await {
                                Ok(outcome) => tracing::debug!(?outcome, "Close request handled"),
                                Err(LifecycleError::Busy) => tracing::debug!("Busy; close request handed back"),
                                Err(e) => tracing::warn!(error = %e, "Close request failed; window stays open"),
                            }
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(dropped = n, "Missed host events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

struct Busy<'a>(&'a AtomicBool);

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use firedoc_protocol::{RpcMessage, Signal};
    use rmpv::Value;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct Doc {
        dirty: bool,
    }

    #[async_trait]
    impl DocumentSource for Doc {
        async fn save_document(&self) -> anyhow::Result<Vec<u8>> {
            Ok(b"%PDF-1.7 edited".to_vec())
        }

        fn has_unsaved_changes(&self) -> bool {
            self.dirty
        }
    }

    /// Scripted host: answers confirm and save, records everything else
    struct Host {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Host {
        fn start(
            client: Arc<BridgeClient>,
            mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
            choice: &'static str,
            save_result: Result<&'static str, &'static str>,
        ) -> Self {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let log = seen.clone();
            tokio::spawn(async move {
                while let Some(frame) = frames.recv().await {
                    match RpcMessage::decode(&frame).unwrap() {
                        RpcMessage::Request { id, channel, .. } => {
                            log.lock().unwrap().push(channel.clone());
                            let reply = match channel.as_str() {
                                "confirm_discard" => RpcMessage::ok(id, Value::from(choice)),
                                "save_pdf" => match save_result {
                                    Ok(path) => RpcMessage::ok(id, Value::from(path)),
                                    Err(message) => RpcMessage::err(id, message),
                                },
                                _ => RpcMessage::ok(id, Value::Nil),
                            };
                            client.handle_incoming(&reply.encode().unwrap());
                        }
                        RpcMessage::Notification { channel, .. } => log.lock().unwrap().push(channel),
                        RpcMessage::Response { .. } => {}
                    }
                }
            });
            Self { seen }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    fn setup(dirty: bool, choice: &'static str, save: Result<&'static str, &'static str>) -> (ViewerLifecycle, Host) {
        let (client, frames) = BridgeClient::new(ClientConfig::default());
        let client = Arc::new(client);
        let host = Host::start(client.clone(), frames, choice, save);
        (
            ViewerLifecycle::new(client, Arc::new(Doc { dirty }), "report.pdf"),
            host,
        )
    }

    /// Let the scripted host drain its queue
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    const CLOSE_FINAL: &str = Signal::WindowCloseFinal.as_str();
    const CLOSE_CANCEL: &str = Signal::WindowCloseCancel.as_str();

    #[tokio::test]
    async fn clean_document_closes_without_asking() {
        let (lifecycle, host) = setup(false, "cancel", Ok("/x.pdf"));
        assert_eq!(lifecycle.handle_close_request().await.unwrap(), CloseOutcome::Closed);
        settle().await;
        assert_eq!(host.seen(), vec![CLOSE_FINAL]);
    }

    #[tokio::test]
    async fn save_then_close() {
        let (lifecycle, host) = setup(true, "save", Ok("/out/report.pdf"));
        assert_eq!(lifecycle.handle_close_request().await.unwrap(), CloseOutcome::Closed);
        settle().await;
        assert_eq!(host.seen(), vec!["confirm_discard", "save_pdf", CLOSE_FINAL]);
    }

    #[tokio::test]
    async fn cancelled_save_keeps_window_open() {
        let (lifecycle, host) = setup(true, "save", Err("Cancelled"));
        assert_eq!(lifecycle.handle_close_request().await.unwrap(), CloseOutcome::Kept);
        settle().await;
        assert_eq!(host.seen(), vec!["confirm_discard", "save_pdf"]);
    }

    #[tokio::test]
    async fn failed_save_is_an_error_and_keeps_window_open() {
        let (lifecycle, host) = setup(true, "save", Err("I/O failure on /out: disk full"));
        let err = lifecycle.handle_close_request().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Bridge(BridgeError::Rejected(_))));
        settle().await;
        assert_eq!(host.seen(), vec!["confirm_discard", "save_pdf", CLOSE_CANCEL]);
    }

    #[tokio::test]
    async fn discard_closes_and_cancel_stays() {
        let (lifecycle, host) = setup(true, "discard", Ok("/x.pdf"));
        assert_eq!(lifecycle.handle_close_request().await.unwrap(), CloseOutcome::Closed);
        settle().await;
        assert_eq!(host.seen(), vec!["confirm_discard", CLOSE_FINAL]);

        let (lifecycle, host) = setup(true, "cancel", Ok("/x.pdf"));
        assert_eq!(lifecycle.handle_close_request().await.unwrap(), CloseOutcome::Kept);
        settle().await;
        assert_eq!(host.seen(), vec!["confirm_discard"]);
    }

    #[tokio::test]
    async fn go_home_after_discard() {
        let (lifecycle, host) = setup(true, "discard", Ok("/x.pdf"));
        assert_eq!(lifecycle.go_home().await.unwrap(), HomeOutcome::Navigated);
        assert_eq!(host.seen(), vec!["confirm_discard", "navigate_to_home"]);

        let (lifecycle, host) = setup(true, "cancel", Ok("/x.pdf"));
        assert_eq!(lifecycle.go_home().await.unwrap(), HomeOutcome::Stayed);
        assert_eq!(host.seen(), vec!["confirm_discard"]);
    }

    #[tokio::test]
    async fn overlapping_requests_are_handed_back() {
        let (lifecycle, host) = setup(true, "cancel", Ok("/x.pdf"));
        let _held = lifecycle.enter().unwrap();
        assert!(matches!(
            lifecycle.handle_close_request().await,
            Err(LifecycleError::Busy)
        ));
        settle().await;
        assert_eq!(host.seen(), vec![CLOSE_CANCEL]);
    }
}
