//! Typed request envelopes
//!
//! Every invoke channel has exactly one argument shape. Params are
//! validated here, before anything is dispatched on the host.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rmpv::Value;

use crate::{Invoke, ProtocolError};

/// `get_file_metadata({path})`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub path: String,
}

/// `read_file_chunk({path, offset, length})`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub path: String,
    pub offset: u64,
    pub length: u64,
}

/// `save_pdf({filename, data})`
///
/// `data` is accepted either as MessagePack binary or as a base64 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub filename: String,
    pub data: Vec<u8>,
}

/// `confirm_discard({title?, message?})`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub title: Option<String>,
    pub message: Option<String>,
}

/// `open_viewer({path})`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenViewerRequest {
    pub path: String,
}

/// A validated invoke, one variant per allowed channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    SelectPdf,
    GetFileMetadata(MetadataRequest),
    ReadFileChunk(ChunkRequest),
    SavePdf(SaveRequest),
    NavigateToHome,
    ConfirmDiscard(ConfirmRequest),
    OpenViewer(OpenViewerRequest),
    SetTitlebarVisible(bool),
}

impl Request {
    pub const fn channel(&self) -> Invoke {
        match self {
            Self::SelectPdf => Invoke::SelectPdf,
            Self::GetFileMetadata(_) => Invoke::GetFileMetadata,
            Self::ReadFileChunk(_) => Invoke::ReadFileChunk,
            Self::SavePdf(_) => Invoke::SavePdf,
            Self::NavigateToHome => Invoke::NavigateToHome,
            Self::ConfirmDiscard(_) => Invoke::ConfirmDiscard,
            Self::OpenViewer(_) => Invoke::OpenViewer,
            Self::SetTitlebarVisible(_) => Invoke::SetTitlebarVisible,
        }
    }

    /// Validate raw params for `channel`
    pub fn decode(channel: Invoke, params: &[Value]) -> Result<Self, ProtocolError> {
        match channel {
            Invoke::SelectPdf => Ok(Self::SelectPdf),
            Invoke::NavigateToHome => Ok(Self::NavigateToHome),
            Invoke::GetFileMetadata => {
                let map = arg_map(channel, params)?;
                Ok(Self::GetFileMetadata(MetadataRequest {
                    path: required_path(map, "path")?,
                }))
            }
            Invoke::ReadFileChunk => {
                let map = arg_map(channel, params)?;
                Ok(Self::ReadFileChunk(ChunkRequest {
                    path: required_path(map, "path")?,
                    offset: required_u64(map, "offset")?,
                    length: required_u64(map, "length")?,
                }))
            }
            Invoke::SavePdf => {
                let map = arg_map(channel, params)?;
                let filename = required_path(map, "filename")?;
                let data = match field(map, "data") {
                    Some(Value::Binary(bytes)) => bytes.clone(),
                    Some(Value::String(s)) => {
                        let encoded = s.as_str().ok_or_else(|| {
                            ProtocolError::InvalidArgument("data is not valid UTF-8".into())
                        })?;
                        STANDARD.decode(encoded).map_err(|e| {
                            ProtocolError::InvalidArgument(format!("data is not base64: {e}"))
                        })?
                    }
                    _ => Vec::new(),
                };
                if data.is_empty() {
                    return Err(ProtocolError::InvalidArgument(
                        "Missing filename or data for saving PDF".into(),
                    ));
                }
                Ok(Self::SavePdf(SaveRequest { filename, data }))
            }
            Invoke::ConfirmDiscard => {
                // Both fields are optional, so no argument at all is fine too
                let Some(Value::Map(map)) = params.first() else {
                    return Ok(Self::ConfirmDiscard(ConfirmRequest::default()));
                };
                Ok(Self::ConfirmDiscard(ConfirmRequest {
                    title: optional_string(map, "title")?,
                    message: optional_string(map, "message")?,
                }))
            }
            Invoke::OpenViewer => {
                let map = arg_map(channel, params)?;
                Ok(Self::OpenViewer(OpenViewerRequest {
                    path: required_path(map, "path")?,
                }))
            }
            Invoke::SetTitlebarVisible => match params.first() {
                Some(Value::Boolean(visible)) => Ok(Self::SetTitlebarVisible(*visible)),
                _ => Err(ProtocolError::InvalidArgument(
                    "set_titlebar_visible expects a boolean".into(),
                )),
            },
        }
    }

    /// Build the params array sent on the wire
    pub fn into_params(self) -> Vec<Value> {
        match self {
            Self::SelectPdf | Self::NavigateToHome => Vec::new(),
            Self::GetFileMetadata(req) => vec![map_value(vec![("path", req.path.into())])],
            Self::ReadFileChunk(req) => vec![map_value(vec![
                ("path", req.path.into()),
                ("offset", req.offset.into()),
                ("length", req.length.into()),
            ])],
            Self::SavePdf(req) => vec![map_value(vec![
                ("filename", req.filename.into()),
                ("data", Value::Binary(req.data)),
            ])],
            Self::ConfirmDiscard(req) => vec![map_value(vec![
                ("title", req.title.map_or(Value::Nil, Value::from)),
                ("message", req.message.map_or(Value::Nil, Value::from)),
            ])],
            Self::OpenViewer(req) => vec![map_value(vec![("path", req.path.into())])],
            Self::SetTitlebarVisible(visible) => vec![Value::Boolean(visible)],
        }
    }
}

/// Result of `get_file_metadata`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
}

impl FileMetadata {
    pub fn to_value(&self) -> Value {
        map_value(vec![
            ("name", self.name.clone().into()),
            ("size", self.size.into()),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let Value::Map(map) = value else {
            return Err(ProtocolError::InvalidArgument(
                "metadata is not a map".into(),
            ));
        };
        Ok(Self {
            name: optional_string(map, "name")?.unwrap_or_default(),
            size: required_u64(map, "size")?,
        })
    }
}

/// Answer to the three-way unsaved-changes prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Save,
    Discard,
    Cancel,
}

impl Choice {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Discard => "discard",
            Self::Cancel => "cancel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "save" => Some(Self::Save),
            "discard" => Some(Self::Discard),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

fn map_value(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::String(k.into()), v))
            .collect(),
    )
}

fn arg_map(channel: Invoke, params: &[Value]) -> Result<&[(Value, Value)], ProtocolError> {
    match params.first() {
        Some(Value::Map(map)) => Ok(map),
        _ => Err(ProtocolError::InvalidArgument(format!(
            "{channel} expects an argument map"
        ))),
    }
}

fn field<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

fn required_path(map: &[(Value, Value)], key: &str) -> Result<String, ProtocolError> {
    match field(map, key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ProtocolError::InvalidArgument(format!(
            "{key} must be a non-empty string"
        ))),
    }
}

fn required_u64(map: &[(Value, Value)], key: &str) -> Result<u64, ProtocolError> {
    field(map, key).and_then(Value::as_u64).ok_or_else(|| {
        ProtocolError::InvalidArgument(format!("{key} must be a non-negative integer"))
    })
}

fn optional_string(map: &[(Value, Value)], key: &str) -> Result<Option<String>, ProtocolError> {
    match field(map, key) {
        None | Some(Value::Nil) => Ok(None),
        Some(Value::String(s)) => Ok(s.as_str().map(ToString::to_string)),
        Some(_) => Err(ProtocolError::InvalidArgument(format!(
            "{key} must be a string"
        ))),
    }
}
