use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

use super::{DialogProvider, FileFilter, MessageBox};

/// Terminal stand-in for native dialogs
///
/// Prompts on stderr and reads one answer per line from stdin. Prompts are
/// serialized so two concurrent dialogs never interleave. An empty line or
/// EOF counts as cancel.
#[derive(Debug)]
pub struct ConsoleDialogs {
    input: Mutex<BufReader<Stdin>>,
}

impl Default for ConsoleDialogs {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleDialogs {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    async fn ask(&self, prompt: &str) -> Option<String> {
        let mut input = self.input.lock().await;

        let mut stderr = tokio::io::stderr();
        if let Err(e) = stderr.write_all(prompt.as_bytes()).await {
            tracing::warn!(error = %e, "Failed to write dialog prompt");
        }
        let _ = stderr.flush().await;

        let mut line = String::new();
        match input.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => {
                let answer = line.trim();
                (!answer.is_empty()).then(|| answer.to_string())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read dialog answer");
                None
            }
        }
    }
}

fn filter_hint(filter: &FileFilter) -> String {
    let globs: Vec<String> = filter.extensions.iter().map(|e| format!("*.{e}")).collect();
    format!("{} ({})", filter.name, globs.join(", "))
}

#[async_trait]
impl DialogProvider for ConsoleDialogs {
    async fn pick_file(&self, filter: &FileFilter) -> Option<PathBuf> {
        let prompt = format!("Open {} - path (empty to cancel): ", filter_hint(filter));
        self.ask(&prompt).await.map(PathBuf::from)
    }

    async fn save_file(&self, default_name: &str, filter: &FileFilter) -> Option<PathBuf> {
        let prompt = format!(
            "Save {} as [{default_name}] - path (empty to cancel): ",
            filter_hint(filter)
        );
        self.ask(&prompt).await.map(PathBuf::from)
    }

    async fn message_box(&self, dialog: &MessageBox) -> usize {
        let choices: Vec<String> = dialog
            .buttons
            .iter()
            .enumerate()
            .map(|(i, label)| format!("{}) {label}", i + 1))
            .collect();
        let prompt = format!(
            "{}\n{}\n{} > ",
            dialog.title,
            dialog.message,
            choices.join("  ")
        );

        let Some(answer) = self.ask(&prompt).await else {
            return dialog.cancel_id;
        };
        if let Ok(n) = answer.parse::<usize>() {
            if (1..=dialog.buttons.len()).contains(&n) {
                return n - 1;
            }
        }
        dialog
            .buttons
            .iter()
            .position(|label| label.eq_ignore_ascii_case(&answer))
            .unwrap_or(dialog.cancel_id)
    }
}
