//! Navigation guard
//!
//! Decides what a window-close or navigate-away request is allowed to do
//! while a possibly-modified document is open.
//!
//! The two force flags live inside one locked state object and are only
//! ever raised through an intent value ([`CloseIntent`],
//! [`NavigationIntent`]). Dropping the intent lowers the flag, so every exit
//! path resets it. A second intent while one is held is rejected with
//! [`GuardError::Busy`] instead of racing on the flags.

use std::sync::{Mutex, MutexGuard, PoisonError};

use firedoc_protocol::Choice;
use thiserror::Error;

use crate::window::Window;

/// What the window is currently showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Home,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Viewing,
    /// The UI has been asked to resolve unsaved changes
    CloseRequested,
    Closing,
    Navigating,
}

/// Outcome of a close request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Close the window now
    Close,
    /// Notify the UI and wait for `window-close-final`
    AskRenderer,
    /// A confirmation or navigation is already in flight
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("another guarded action is in progress")]
    Busy,

    #[error("navigation failed: {0}")]
    Navigation(String),
}

#[derive(Debug)]
struct Inner {
    state: GuardState,
    mode: AppMode,
    force_close: bool,
    force_navigation: bool,
}

#[derive(Debug)]
pub struct NavigationGuard {
    inner: Mutex<Inner>,
}

impl Default for NavigationGuard {
    fn default() -> Self {
        Self::new(AppMode::Home)
    }
}

impl NavigationGuard {
    pub const fn new(mode: AppMode) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: GuardState::Viewing,
                mode,
                force_close: false,
                force_navigation: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> GuardState {
        self.lock().state
    }

    pub fn mode(&self) -> AppMode {
        self.lock().mode
    }

    pub fn force_close(&self) -> bool {
        self.lock().force_close
    }

    pub fn force_navigation(&self) -> bool {
        self.lock().force_navigation
    }

    /// Close requested by the UI's close button or the native title bar
    pub fn on_close_signal(&self) -> CloseDecision {
        let mut inner = self.lock();
        if inner.force_close {
            inner.state = GuardState::Closing;
            return CloseDecision::Close;
        }
        match (inner.state, inner.mode) {
            (GuardState::Viewing, AppMode::Viewer) => {
                inner.state = GuardState::CloseRequested;
                CloseDecision::AskRenderer
            }
            (GuardState::Viewing | GuardState::Closing, _) => {
                inner.state = GuardState::Closing;
                CloseDecision::Close
            }
            (GuardState::CloseRequested | GuardState::Navigating, _) => CloseDecision::Ignore,
        }
    }

    /// The unsaved-changes prompt was answered
    ///
    /// Any answer concludes an outstanding close confirmation. The UI follows
    /// a `save` or `discard` with `window-close-final` once it is ready.
    pub fn on_confirm_choice(&self, choice: Choice) {
        let mut inner = self.lock();
        if inner.state == GuardState::CloseRequested {
            inner.state = GuardState::Viewing;
            tracing::debug!(choice = choice.as_str(), "Close confirmation resolved");
        }
    }

    /// The UI will not resolve the outstanding close request
    ///
    /// Sent when the UI is busy with another flow, failed before asking the
    /// user, or went away. Returns `true` if a pending request was dropped.
    pub fn on_close_declined(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != GuardState::CloseRequested {
            return false;
        }
        inner.state = GuardState::Viewing;
        tracing::debug!("Close request declined by the UI");
        true
    }

    /// Mark the window as closing while another intent holds the guard
    pub fn mark_closing(&self) {
        self.lock().state = GuardState::Closing;
    }

    /// Raise `force_close` for the duration of the returned intent
    pub fn begin_close(&self) -> Result<CloseIntent<'_>, GuardError> {
        let mut inner = self.lock();
        if inner.force_navigation || inner.force_close {
            return Err(GuardError::Busy);
        }
        inner.force_close = true;
        inner.state = GuardState::Closing;
        Ok(CloseIntent { guard: self })
    }

    /// Raise `force_navigation` for the duration of the returned intent
    pub fn begin_navigation(&self) -> Result<NavigationIntent<'_>, GuardError> {
        let mut inner = self.lock();
        if inner.force_navigation || inner.force_close {
            return Err(GuardError::Busy);
        }
        match inner.state {
            GuardState::Viewing => {}
            // The UI only navigates once it has resolved unsaved changes, so
            // an unanswered close request is moot
            GuardState::CloseRequested => {
                tracing::debug!("Navigation supersedes pending close request");
            }
            GuardState::Closing | GuardState::Navigating => return Err(GuardError::Busy),
        }
        inner.force_navigation = true;
        inner.state = GuardState::Navigating;
        Ok(NavigationIntent { guard: self })
    }

    /// Unload-prevention interceptor
    ///
    /// Returns `true` when a page's unload handler must be overridden.
    pub fn bypass_unload_prevention(&self) -> bool {
        self.lock().force_navigation
    }

    /// Load `target` with unload prevention bypassed
    ///
    /// The force flag is lowered whether the load succeeds or fails.
    pub async fn navigate(&self, window: &dyn Window, target: AppMode) -> Result<(), GuardError> {
        let intent = self.begin_navigation()?;
        let result = window.load(target, self.bypass_unload_prevention()).await;
        drop(intent);

        match result {
            Ok(()) => {
                self.lock().mode = target;
                tracing::info!(mode = ?target, "Navigation complete");
                Ok(())
            }
            Err(e) => {
                tracing::error!(mode = ?target, error = %e, "Navigation failed");
                Err(GuardError::Navigation(e.to_string()))
            }
        }
    }
}

/// Holds `force_close` high until dropped
#[must_use = "force_close drops back to false as soon as the intent is dropped"]
#[derive(Debug)]
pub struct CloseIntent<'a> {
    guard: &'a NavigationGuard,
}

impl Drop for CloseIntent<'_> {
    fn drop(&mut self) {
        self.guard.lock().force_close = false;
    }
}

/// Holds `force_navigation` high until dropped
#[must_use = "force_navigation drops back to false as soon as the intent is dropped"]
#[derive(Debug)]
pub struct NavigationIntent<'a> {
    guard: &'a NavigationGuard,
}

impl Drop for NavigationIntent<'_> {
    fn drop(&mut self) {
        let mut inner = self.guard.lock();
        inner.force_navigation = false;
        if inner.state == GuardState::Navigating {
            inner.state = GuardState::Viewing;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::HeadlessWindow;

    #[test]
    fn close_in_viewer_asks_renderer_once() {
        let guard = NavigationGuard::new(AppMode::Viewer);
        assert_eq!(guard.on_close_signal(), CloseDecision::AskRenderer);
        assert_eq!(guard.state(), GuardState::CloseRequested);

        // A second close while the prompt is up does not open another one
        assert_eq!(guard.on_close_signal(), CloseDecision::Ignore);
        assert_eq!(guard.state(), GuardState::CloseRequested);
    }

    #[test]
    fn close_on_home_is_immediate() {
        let guard = NavigationGuard::new(AppMode::Home);
        assert_eq!(guard.on_close_signal(), CloseDecision::Close);
        assert_eq!(guard.state(), GuardState::Closing);
    }

    #[test]
    fn cancel_returns_to_viewing() {
        let guard = NavigationGuard::new(AppMode::Viewer);
        guard.on_close_signal();
        guard.on_confirm_choice(Choice::Cancel);
        assert_eq!(guard.state(), GuardState::Viewing);
        assert!(!guard.force_close());

        // The next close asks again
        assert_eq!(guard.on_close_signal(), CloseDecision::AskRenderer);
    }

    #[test]
    fn close_intent_resets_on_drop() {
        let guard = NavigationGuard::new(AppMode::Viewer);
        {
            let _intent = guard.begin_close().unwrap();
            assert!(guard.force_close());
            assert_eq!(guard.on_close_signal(), CloseDecision::Close);
        }
        assert!(!guard.force_close());
        assert_eq!(guard.state(), GuardState::Closing);
    }

    #[test]
    fn overlapping_intents_are_rejected() {
        let guard = NavigationGuard::new(AppMode::Viewer);
        let nav = guard.begin_navigation().unwrap();
        assert_eq!(guard.begin_close().unwrap_err(), GuardError::Busy);
        assert_eq!(guard.begin_navigation().unwrap_err(), GuardError::Busy);
        assert_eq!(guard.on_close_signal(), CloseDecision::Ignore);
        drop(nav);

        assert!(!guard.force_navigation());
        assert_eq!(guard.state(), GuardState::Viewing);
        assert!(guard.begin_close().is_ok());
    }

    #[test]
    fn navigation_supersedes_pending_close() {
        let guard = NavigationGuard::new(AppMode::Viewer);
        guard.on_close_signal();
        let nav = guard.begin_navigation().unwrap();
        assert_eq!(guard.state(), GuardState::Navigating);

        // A late decline does not disturb the navigation
        assert!(!guard.on_close_declined());
        drop(nav);
        assert_eq!(guard.state(), GuardState::Viewing);
    }

    #[test]
    fn navigation_blocked_while_closing() {
        let guard = NavigationGuard::new(AppMode::Home);
        guard.on_close_signal();
        assert_eq!(guard.begin_navigation().unwrap_err(), GuardError::Busy);
    }

    #[test]
    fn declined_close_request_returns_to_viewing() {
        let guard = NavigationGuard::new(AppMode::Viewer);
        assert!(!guard.on_close_declined());

        assert_eq!(guard.on_close_signal(), CloseDecision::AskRenderer);
        assert!(guard.on_close_declined());
        assert_eq!(guard.state(), GuardState::Viewing);

        // The next close asks again instead of being ignored
        assert_eq!(guard.on_close_signal(), CloseDecision::AskRenderer);
    }

    #[test]
    fn mark_closing_survives_navigation_release() {
        let guard = NavigationGuard::new(AppMode::Viewer);
        let nav = guard.begin_navigation().unwrap();
        guard.mark_closing();
        drop(nav);
        assert_eq!(guard.state(), GuardState::Closing);
        assert!(!guard.force_navigation());
    }

    #[tokio::test]
    async fn navigate_switches_mode() {
        let guard = NavigationGuard::new(AppMode::Viewer);
        let window = HeadlessWindow::new(AppMode::Viewer);
        window.set_unload_handler(true);

        guard.navigate(&window, AppMode::Home).await.unwrap();
        assert_eq!(guard.mode(), AppMode::Home);
        assert_eq!(window.snapshot().mode, AppMode::Home);
        assert!(!guard.force_navigation());
        assert!(!guard.bypass_unload_prevention());
    }
}
