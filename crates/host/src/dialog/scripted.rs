use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{DialogProvider, FileFilter, MessageBox};

#[derive(Debug, Default)]
struct Script {
    picks: VecDeque<Option<PathBuf>>,
    saves: VecDeque<Option<PathBuf>>,
    buttons: VecDeque<usize>,
    shown: Vec<MessageBox>,
    save_prompts: Vec<String>,
}

/// Dialogs that answer from a queue instead of asking a person
///
/// An empty queue behaves like the user dismissing the dialog. With a gate
/// set, message boxes stay open until [`ScriptedDialogs::release`] is called.
#[derive(Debug, Default)]
pub struct ScriptedDialogs {
    script: Mutex<Script>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedDialogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every message box open until released
    pub fn gated() -> Self {
        Self {
            script: Mutex::default(),
            gate: Some(Arc::new(Notify::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_pick(&self, answer: Option<PathBuf>) -> &Self {
        self.lock().picks.push_back(answer);
        self
    }

    pub fn push_save(&self, answer: Option<PathBuf>) -> &Self {
        self.lock().saves.push_back(answer);
        self
    }

    pub fn push_button(&self, index: usize) -> &Self {
        self.lock().buttons.push_back(index);
        self
    }

    /// Let one gated message box answer
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Message boxes shown so far
    pub fn shown(&self) -> Vec<MessageBox> {
        self.lock().shown.clone()
    }

    /// Default names offered by save dialogs so far
    pub fn save_prompts(&self) -> Vec<String> {
        self.lock().save_prompts.clone()
    }
}

#[async_trait]
impl DialogProvider for ScriptedDialogs {
    async fn pick_file(&self, _filter: &FileFilter) -> Option<PathBuf> {
        self.lock().picks.pop_front().flatten()
    }

    async fn save_file(&self, default_name: &str, _filter: &FileFilter) -> Option<PathBuf> {
        let mut script = self.lock();
        script.save_prompts.push(default_name.to_string());
        script.saves.pop_front().flatten()
    }

    async fn message_box(&self, dialog: &MessageBox) -> usize {
        self.lock().shown.push(dialog.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.lock().buttons.pop_front().unwrap_or(dialog.cancel_id)
    }
}
