//! Channel allowlist
//!
//! Everything that may cross the bridge is enumerated here. Names that do
//! not parse into one of these enums are denied at both ends.

use std::fmt;

use crate::ProtocolError;

/// Request/response operations the UI may invoke on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Invoke {
    SelectPdf,          // select_pdf
    GetFileMetadata,    // get_file_metadata
    ReadFileChunk,      // read_file_chunk
    SavePdf,            // save_pdf
    NavigateToHome,     // navigate_to_home
    ConfirmDiscard,     // confirm_discard
    OpenViewer,         // open_viewer
    SetTitlebarVisible, // set_titlebar_visible
}

impl Invoke {
    pub const ALL: [Self; 8] = [
        Self::SelectPdf,
        Self::GetFileMetadata,
        Self::ReadFileChunk,
        Self::SavePdf,
        Self::NavigateToHome,
        Self::ConfirmDiscard,
        Self::OpenViewer,
        Self::SetTitlebarVisible,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelectPdf => "select_pdf",
            Self::GetFileMetadata => "get_file_metadata",
            Self::ReadFileChunk => "read_file_chunk",
            Self::SavePdf => "save_pdf",
            Self::NavigateToHome => "navigate_to_home",
            Self::ConfirmDiscard => "confirm_discard",
            Self::OpenViewer => "open_viewer",
            Self::SetTitlebarVisible => "set_titlebar_visible",
        }
    }

    /// Channels whose round trip waits on a person at a modal dialog
    ///
    /// Callers must not put a deadline on these; the host acts on the
    /// answer whenever it comes.
    pub const fn waits_on_user(self) -> bool {
        matches!(self, Self::SelectPdf | Self::SavePdf | Self::ConfirmDiscard)
    }
}

impl TryFrom<&str> for Invoke {
    type Error = ProtocolError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ProtocolError::Denied(s.to_string()))
    }
}

impl fmt::Display for Invoke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget window control signals sent from the UI to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    WindowMinimize,
    WindowMaximize,
    WindowClose,
    /// Close after the UI has resolved any unsaved changes
    WindowCloseFinal,
    /// The UI will not answer the outstanding `request-close`
    WindowCloseCancel,
}

impl Signal {
    pub const ALL: [Self; 5] = [
        Self::WindowMinimize,
        Self::WindowMaximize,
        Self::WindowClose,
        Self::WindowCloseFinal,
        Self::WindowCloseCancel,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WindowMinimize => "window-minimize",
            Self::WindowMaximize => "window-maximize",
            Self::WindowClose => "window-close",
            Self::WindowCloseFinal => "window-close-final",
            Self::WindowCloseCancel => "window-close-cancel",
        }
    }
}

impl TryFrom<&str> for Signal {
    type Error = ProtocolError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ProtocolError::Denied(s.to_string()))
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unsolicited notifications pushed from the host to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// The window wants to close while a document is open
    RequestClose,
}

impl Event {
    pub const ALL: [Self; 1] = [Self::RequestClose];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequestClose => "request-close",
        }
    }
}

impl TryFrom<&str> for Event {
    type Error = ProtocolError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ProtocolError::Denied(s.to_string()))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_parse() {
        for c in Invoke::ALL {
            assert_eq!(Invoke::try_from(c.as_str()), Ok(c));
        }
        assert_eq!(Signal::try_from("window-close-final"), Ok(Signal::WindowCloseFinal));
        assert_eq!(Signal::try_from("window-close-cancel"), Ok(Signal::WindowCloseCancel));
        assert_eq!(Event::try_from("request-close"), Ok(Event::RequestClose));
    }

    #[test]
    fn unknown_names_are_denied() {
        assert_eq!(
            Invoke::try_from("read_file"),
            Err(ProtocolError::Denied("read_file".to_string()))
        );
        assert!(Invoke::try_from("SELECT_PDF").is_err());
        assert!(Signal::try_from("window-close ").is_err());
        assert!(Event::try_from("select_pdf").is_err());
    }

    #[test]
    fn only_dialog_channels_wait_on_user() {
        let waiting: Vec<_> = Invoke::ALL.into_iter().filter(|c| c.waits_on_user()).collect();
        assert_eq!(waiting, [Invoke::SelectPdf, Invoke::SavePdf, Invoke::ConfirmDiscard]);
        assert!(!Invoke::ReadFileChunk.waits_on_user());
    }

    #[test]
    fn channel_kinds_do_not_overlap() {
        for c in Invoke::ALL {
            assert!(Signal::try_from(c.as_str()).is_err());
            assert!(Event::try_from(c.as_str()).is_err());
        }
    }
}
