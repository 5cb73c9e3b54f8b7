//! Window seam
//!
//! The host windowing layer is an external collaborator. `HeadlessWindow`
//! is the built-in implementation used by the server binary and tests: it
//! tracks window state and models a page-level unload handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::watch;

use crate::guard::AppMode;

#[async_trait]
pub trait Window: Send + Sync {
    fn minimize(&self);

    /// Maximize, or restore when already maximized
    fn toggle_maximize(&self);

    fn close(&self);

    fn set_menu_bar_visible(&self, visible: bool);

    /// Load the page for `mode`
    ///
    /// When `bypass_unload_prevention` is false an unload handler on the
    /// current page may veto the load.
    async fn load(&self, mode: AppMode, bypass_unload_prevention: bool) -> Result<()>;
}

/// Observable state of a [`HeadlessWindow`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    pub mode: AppMode,
    pub minimized: bool,
    pub maximized: bool,
    pub menu_bar_visible: bool,
    pub closed: bool,
    pub loads: u32,
}

#[derive(Debug)]
pub struct HeadlessWindow {
    state: Mutex<WindowState>,
    unload_handler: AtomicBool,
    closed_tx: watch::Sender<bool>,
}

impl HeadlessWindow {
    pub fn new(mode: AppMode) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(WindowState {
                mode,
                minimized: false,
                maximized: false,
                menu_bar_visible: false,
                closed: false,
                loads: 0,
            }),
            unload_handler: AtomicBool::new(false),
            closed_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> WindowState {
        self.lock().clone()
    }

    /// Arm or disarm the current page's unload handler
    pub fn set_unload_handler(&self, armed: bool) {
        self.unload_handler.store(armed, Ordering::SeqCst);
    }

    /// Resolves once the window has been closed
    pub async fn wait_closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        // Sender lives in self, so wait_for cannot fail while we hold &self
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

#[async_trait]
impl Window for HeadlessWindow {
    fn minimize(&self) {
        self.lock().minimized = true;
        tracing::debug!("Window minimized");
    }

    fn toggle_maximize(&self) {
        let mut state = self.lock();
        state.maximized = !state.maximized;
        state.minimized = false;
        tracing::debug!(maximized = state.maximized, "Window maximize toggled");
    }

    fn close(&self) {
        self.lock().closed = true;
        self.closed_tx.send_replace(true);
        tracing::info!("Window closed");
    }

    fn set_menu_bar_visible(&self, visible: bool) {
        self.lock().menu_bar_visible = visible;
    }

    async fn load(&self, mode: AppMode, bypass_unload_prevention: bool) -> Result<()> {
        if self.lock().closed {
            bail!("window is closed");
        }
        if self.unload_handler.load(Ordering::SeqCst) && !bypass_unload_prevention {
            bail!("navigation blocked by the page's unload handler");
        }

        let mut state = self.lock();
        state.mode = mode;
        state.loads += 1;
        drop(state);

        // A freshly loaded page starts without an unload handler
        self.unload_handler.store(false, Ordering::SeqCst);
        Ok(())
    }
}
