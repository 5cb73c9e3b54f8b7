//! Dialog seam
//!
//! Open, save and message-box primitives supplied by the host windowing
//! layer. Every call is async so an open dialog never stalls other bridge
//! requests.

mod console;
#[cfg(feature = "native-dialogs")]
mod native;
mod scripted;

use std::path::PathBuf;

use async_trait::async_trait;

pub use console::ConsoleDialogs;
#[cfg(feature = "native-dialogs")]
pub use native::NativeDialogs;
pub use scripted::ScriptedDialogs;

/// File-type filter shown by open/save dialogs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFilter {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

pub const PDF_FILTER: FileFilter = FileFilter {
    name: "PDF Files",
    extensions: &["pdf"],
};

/// Modal warning box with custom buttons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBox {
    pub title: String,
    pub message: String,
    pub buttons: Vec<String>,
    /// Button activated by Enter
    pub default_id: usize,
    /// Button reported when the box is dismissed
    pub cancel_id: usize,
}

#[async_trait]
pub trait DialogProvider: Send + Sync {
    /// Returns `None` when the user cancels
    async fn pick_file(&self, filter: &FileFilter) -> Option<PathBuf>;

    /// Returns `None` when the user cancels
    async fn save_file(&self, default_name: &str, filter: &FileFilter) -> Option<PathBuf>;

    /// Index into `dialog.buttons` of the button the user chose
    async fn message_box(&self, dialog: &MessageBox) -> usize;
}
