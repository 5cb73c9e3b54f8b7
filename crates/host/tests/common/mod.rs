//! Common test utilities
#![allow(dead_code)] // Not every test file uses every helper

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use firedoc_host::bridge::HostBridge;
use firedoc_host::dialog::ScriptedDialogs;
use firedoc_host::guard::{AppMode, NavigationGuard};
use firedoc_host::service::HostFileService;
use firedoc_host::window::{HeadlessWindow, Window};
use firedoc_ui::{BridgeClient, ClientConfig};
use firedoc_vfs::{LocalFs, VfsBackend};

/// UI client wired to a host bridge through in-memory channels
pub struct TestHarness {
    pub client: Arc<BridgeClient>,
    pub bridge: Arc<HostBridge>,
    pub window: Arc<HeadlessWindow>,
    pub dialogs: Arc<ScriptedDialogs>,
}

pub struct HarnessBuilder {
    fs: Arc<dyn VfsBackend>,
    dialogs: ScriptedDialogs,
    mode: AppMode,
    chunk_cap: u64,
    window: Option<Arc<dyn Window>>,
    config: ClientConfig,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            fs: Arc::new(LocalFs::new()),
            dialogs: ScriptedDialogs::new(),
            mode: AppMode::Viewer,
            chunk_cap: 0,
            window: None,
            config: ClientConfig::default(),
        }
    }

    pub fn fs(mut self, fs: Arc<dyn VfsBackend>) -> Self {
        self.fs = fs;
        self
    }

    pub fn dialogs(mut self, dialogs: ScriptedDialogs) -> Self {
        self.dialogs = dialogs;
        self
    }

    pub fn mode(mut self, mode: AppMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn chunk_cap(mut self, cap: u64) -> Self {
        self.chunk_cap = cap;
        self
    }

    /// Replace the headless window the bridge drives
    pub fn window(mut self, window: Arc<dyn Window>) -> Self {
        self.window = Some(window);
        self
    }

    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> TestHarness {
        let dialogs = Arc::new(self.dialogs);
        let service = Arc::new(
            HostFileService::new(self.fs, dialogs.clone()).with_chunk_cap(self.chunk_cap),
        );
        let headless = Arc::new(HeadlessWindow::new(self.mode));
        let window = self.window.unwrap_or_else(|| headless.clone() as Arc<dyn Window>);
        let guard = Arc::new(NavigationGuard::new(self.mode));
        let bridge = Arc::new(HostBridge::new(service, guard, window));

        let (client, mut frames) = BridgeClient::new(self.config);
        let client = Arc::new(client);

        // UI -> host, one task per frame like the socket reader
        {
            let bridge = bridge.clone();
            let client = client.clone();
            tokio::spawn(async move {
                while let Some(frame) = frames.recv().await {
                    let bridge = bridge.clone();
                    let client = client.clone();
                    tokio::spawn(async move {
                        if let Ok(Some(reply)) = bridge.handle_message(&frame).await {
                            client.handle_incoming(&reply);
                        }
                    });
                }
            });
        }

        // Host events -> UI
        {
            let mut events = bridge.subscribe_events();
            let client = client.clone();
            tokio::spawn(async move {
                while let Ok(frame) = events.recv().await {
                    client.handle_incoming(&frame);
                }
            });
        }

        TestHarness {
            client,
            bridge,
            window: headless,
            dialogs,
        }
    }
}

impl TestHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    /// Wait until the in-flight signals have been handled
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }
}

/// Window whose page loads always fail
#[derive(Debug, Default)]
pub struct BrokenWindow;

#[async_trait]
impl Window for BrokenWindow {
    fn minimize(&self) {}
    fn toggle_maximize(&self) {}
    fn close(&self) {}
    fn set_menu_bar_visible(&self, _visible: bool) {}

    async fn load(&self, _mode: AppMode, _bypass: bool) -> anyhow::Result<()> {
        bail!("renderer crashed")
    }
}

pub fn path_str(p: &std::path::Path) -> String {
    p.to_string_lossy().into_owned()
}
