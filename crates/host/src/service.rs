//! Host file service
//!
//! Privileged file operations behind the bridge: picking, stat, bounded
//! chunk reads, save-as and the unsaved-changes prompt.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use firedoc_protocol::{Choice, FileMetadata};
use firedoc_vfs::{clamp_chunk_len, FsError, VfsBackend, MAX_CHUNK_LEN};

use crate::dialog::{DialogProvider, MessageBox, PDF_FILTER};

pub const DEFAULT_CONFIRM_TITLE: &str = "Unsaved Changes";
pub const DEFAULT_CONFIRM_MESSAGE: &str =
    "You have modified this PDF. Do you want to save your changes?";

/// Buttons of the unsaved-changes prompt, in display order
const CONFIRM_BUTTONS: [Choice; 3] = [Choice::Save, Choice::Discard, Choice::Cancel];

pub struct HostFileService {
    fs: Arc<dyn VfsBackend>,
    dialogs: Arc<dyn DialogProvider>,
    chunk_cap: u64,
}

impl HostFileService {
    pub fn new(fs: Arc<dyn VfsBackend>, dialogs: Arc<dyn DialogProvider>) -> Self {
        Self {
            fs,
            dialogs,
            chunk_cap: MAX_CHUNK_LEN,
        }
    }

    /// Lower the per-read cap. Zero keeps the default, larger values are
    /// clamped to [`MAX_CHUNK_LEN`].
    pub fn with_chunk_cap(mut self, cap: u64) -> Self {
        self.chunk_cap = if cap == 0 {
            MAX_CHUNK_LEN
        } else {
            cap.min(MAX_CHUNK_LEN)
        };
        self
    }

    pub const fn chunk_cap(&self) -> u64 {
        self.chunk_cap
    }

    /// Ask the user for a PDF. `None` when the dialog is dismissed.
    pub async fn open_file_dialog(&self) -> Result<Option<String>, FsError> {
        let Some(path) = self.dialogs.pick_file(&PDF_FILTER).await else {
            return Ok(None);
        };
        let path = utf8_path(path)?;
        tracing::info!(path = %path, "PDF selected");
        Ok(Some(path))
    }

    pub async fn stat(&self, path: &str) -> Result<FileMetadata, FsError> {
        let stat = self.fs.stat(path).await?;
        if !stat.is_file {
            return Err(FsError::InvalidArgument(format!("Not a file: {path}")));
        }
        let name = Path::new(path)
            .file_name()
            .map_or_else(|| "unknown".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(FileMetadata {
            name,
            size: stat.size,
        })
    }

    /// Bounded positioned read; at most `chunk_cap` bytes come back
    pub async fn read_chunk(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, FsError> {
        let length = clamp_chunk_len(length, self.chunk_cap);
        let data = self.fs.read_chunk(path, offset, length).await?;
        tracing::trace!(path, offset, requested = length, read = data.len(), "Chunk read");
        Ok(data)
    }

    /// Prompt for a destination and write `data` there
    ///
    /// Nothing is written unless the user confirms the dialog.
    pub async fn save_as(&self, filename: &str, data: &[u8]) -> Result<String, FsError> {
        if filename.is_empty() || data.is_empty() {
            return Err(FsError::InvalidArgument(
                "Missing filename or data for saving PDF".into(),
            ));
        }

        let Some(target) = self.dialogs.save_file(filename, &PDF_FILTER).await else {
            tracing::debug!(filename, "Save dialog cancelled");
            return Err(FsError::Cancelled);
        };

        let target = utf8_path(target)?;
        self.fs.write(&target, data).await?;
        tracing::info!(path = %target, bytes = data.len(), "PDF saved");
        Ok(target)
    }

    /// Three-way unsaved-changes prompt
    pub async fn confirm_discard(&self, title: Option<&str>, message: Option<&str>) -> Choice {
        let dialog = MessageBox {
            title: title.unwrap_or(DEFAULT_CONFIRM_TITLE).to_string(),
            message: message.unwrap_or(DEFAULT_CONFIRM_MESSAGE).to_string(),
            buttons: vec!["Save".into(), "Discard".into(), "Cancel".into()],
            default_id: 0,
            cancel_id: 2,
        };
        let index = self.dialogs.message_box(&dialog).await;
        CONFIRM_BUTTONS.get(index).copied().unwrap_or(Choice::Cancel)
    }
}

/// Paths cross the bridge as strings; a lossy conversion would name a
/// different file
fn utf8_path(path: PathBuf) -> Result<String, FsError> {
    path.into_os_string().into_string().map_err(|raw| {
        FsError::InvalidArgument(format!("Path is not valid UTF-8: {}", Path::new(&raw).display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::ScriptedDialogs;
    use firedoc_vfs::MemoryFs;

    fn service(files: Vec<(&str, &[u8])>) -> (HostFileService, Arc<MemoryFs>, Arc<ScriptedDialogs>) {
        let fs = Arc::new(MemoryFs::with_files(files));
        let dialogs = Arc::new(ScriptedDialogs::new());
        (HostFileService::new(fs.clone(), dialogs.clone()), fs, dialogs)
    }

    #[tokio::test]
    async fn stat_reports_file_name() {
        let (svc, _, _) = service(vec![("/docs/report.pdf", &[0u8; 42][..])]);
        let meta = svc.stat("/docs/report.pdf").await.unwrap();
        assert_eq!(meta.name, "report.pdf");
        assert_eq!(meta.size, 42);
    }

    #[tokio::test]
    async fn configured_cap_limits_reads() {
        let (svc, _, _) = service(vec![("/a.pdf", &[1u8; 100][..])]);
        let svc = svc.with_chunk_cap(16);
        assert_eq!(svc.read_chunk("/a.pdf", 0, 100).await.unwrap().len(), 16);

        // Cannot be raised past the hard limit
        assert_eq!(svc.with_chunk_cap(u64::MAX).chunk_cap(), MAX_CHUNK_LEN);
    }

    #[tokio::test]
    async fn cancelled_save_writes_nothing() {
        let (svc, fs, dialogs) = service(Vec::new());
        dialogs.push_save(None);

        let err = svc.save_as("out.pdf", &[9u8; 500]).await.unwrap_err();
        assert_eq!(err, FsError::Cancelled);
        assert_eq!(err.to_string(), "Cancelled");
        assert_eq!(fs.file_count(), 0);
        assert_eq!(dialogs.save_prompts(), vec!["out.pdf".to_string()]);
    }

    #[tokio::test]
    async fn confirmed_save_writes_to_chosen_path() {
        let (svc, fs, dialogs) = service(Vec::new());
        dialogs.push_save(Some(PathBuf::from("/out/edited.pdf")));

        let path = svc.save_as("edited.pdf", b"%PDF").await.unwrap();
        assert_eq!(path, "/out/edited.pdf");
        assert_eq!(fs.contents("/out/edited.pdf").as_deref(), Some(&b"%PDF"[..]));
    }

    #[tokio::test]
    async fn save_requires_name_and_data() {
        let (svc, _, dialogs) = service(Vec::new());
        assert!(matches!(
            svc.save_as("", b"x").await,
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.save_as("a.pdf", &[]).await,
            Err(FsError::InvalidArgument(_))
        ));
        assert!(dialogs.save_prompts().is_empty());
    }

    #[tokio::test]
    async fn confirm_maps_buttons() {
        let (svc, _, dialogs) = service(Vec::new());
        dialogs.push_button(0).push_button(1).push_button(7);

        assert_eq!(svc.confirm_discard(None, None).await, Choice::Save);
        assert_eq!(svc.confirm_discard(Some("Close?"), None).await, Choice::Discard);
        assert_eq!(svc.confirm_discard(None, None).await, Choice::Cancel);
        // Dismissed with an empty script
        assert_eq!(svc.confirm_discard(None, None).await, Choice::Cancel);

        let shown = dialogs.shown();
        assert_eq!(shown[0].title, DEFAULT_CONFIRM_TITLE);
        assert_eq!(shown[0].message, DEFAULT_CONFIRM_MESSAGE);
        assert_eq!(shown[1].title, "Close?");
        assert_eq!(shown[0].buttons, ["Save", "Discard", "Cancel"]);
    }

    #[tokio::test]
    async fn pick_returns_path_or_none() {
        let (svc, _, dialogs) = service(Vec::new());
        dialogs.push_pick(Some(PathBuf::from("/docs/a.pdf")));
        assert_eq!(svc.open_file_dialog().await.unwrap().as_deref(), Some("/docs/a.pdf"));
        assert_eq!(svc.open_file_dialog().await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_paths_are_rejected_not_mangled() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let raw = PathBuf::from(OsString::from_vec(b"/docs/r\xe9sum\xe9.pdf".to_vec()));
        let (svc, fs, dialogs) = service(Vec::new());
        dialogs.push_pick(Some(raw.clone())).push_save(Some(raw));

        assert!(matches!(
            svc.open_file_dialog().await,
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.save_as("resume.pdf", b"%PDF").await,
            Err(FsError::InvalidArgument(_))
        ));
        assert_eq!(fs.file_count(), 0);
    }
}
