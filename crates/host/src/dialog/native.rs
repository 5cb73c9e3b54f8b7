use std::path::PathBuf;

use async_trait::async_trait;
use rfd::{AsyncFileDialog, AsyncMessageDialog, MessageButtons, MessageDialogResult, MessageLevel};

use super::{DialogProvider, FileFilter, MessageBox};

/// Platform dialogs via rfd
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDialogs;

impl NativeDialogs {
    pub const fn new() -> Self {
        Self
    }
}

fn buttons_for(labels: &[String]) -> MessageButtons {
    match labels {
        [a, b, c] => MessageButtons::YesNoCancelCustom(a.clone(), b.clone(), c.clone()),
        [a, b] => MessageButtons::OkCancelCustom(a.clone(), b.clone()),
        [a] => MessageButtons::OkCustom(a.clone()),
        _ => MessageButtons::Ok,
    }
}

fn index_of(result: &MessageDialogResult, dialog: &MessageBox) -> usize {
    match result {
        MessageDialogResult::Custom(label) => dialog
            .buttons
            .iter()
            .position(|b| b == label)
            .unwrap_or(dialog.cancel_id),
        MessageDialogResult::Yes | MessageDialogResult::Ok => 0,
        MessageDialogResult::No => 1,
        MessageDialogResult::Cancel => dialog.cancel_id,
    }
}

#[async_trait]
impl DialogProvider for NativeDialogs {
    async fn pick_file(&self, filter: &FileFilter) -> Option<PathBuf> {
        AsyncFileDialog::new()
            .add_filter(filter.name, filter.extensions)
            .pick_file()
            .await
            .map(|handle| handle.path().to_path_buf())
    }

    async fn save_file(&self, default_name: &str, filter: &FileFilter) -> Option<PathBuf> {
        AsyncFileDialog::new()
            .add_filter(filter.name, filter.extensions)
            .set_file_name(default_name)
            .save_file()
            .await
            .map(|handle| handle.path().to_path_buf())
    }

    async fn message_box(&self, dialog: &MessageBox) -> usize {
        let result = AsyncMessageDialog::new()
            .set_level(MessageLevel::Warning)
            .set_title(&dialog.title)
            .set_description(&dialog.message)
            .set_buttons(buttons_for(&dialog.buttons))
            .show()
            .await;
        index_of(&result, dialog)
    }
}
