//! MessagePack-RPC framing
//!
//! - Request:      `[0, id, channel, params]`
//! - Response:     `[1, id, error, result]`
//! - Notification: `[2, channel, params]`

use rmpv::Value;

use crate::ProtocolError;

/// MessagePack-RPC Message Type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMessageType {
    Request = 0,
    Response = 1,
    Notification = 2,
}

/// Helper to parse RPC message type
pub fn parse_message_type(val: &Value) -> Option<RpcMessageType> {
    match val.as_i64() {
        Some(0) => Some(RpcMessageType::Request),
        Some(1) => Some(RpcMessageType::Response),
        Some(2) => Some(RpcMessageType::Notification),
        _ => None,
    }
}

/// One frame on the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    Request {
        id: u64,
        channel: String,
        params: Vec<Value>,
    },
    /// `error` carries a human-readable message; the peer never sees a
    /// structured error object
    Response {
        id: u64,
        error: Option<String>,
        result: Value,
    },
    Notification {
        channel: String,
        params: Vec<Value>,
    },
}

impl RpcMessage {
    pub const fn ok(id: u64, result: Value) -> Self {
        Self::Response {
            id,
            error: None,
            result,
        }
    }

    pub fn err(id: u64, message: impl Into<String>) -> Self {
        Self::Response {
            id,
            error: Some(message.into()),
            result: Value::Nil,
        }
    }

    pub fn notification(channel: impl Into<String>) -> Self {
        Self::Notification {
            channel: channel.into(),
            params: Vec::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Request {
                id,
                channel,
                params,
            } => Value::Array(vec![
                Value::Integer((RpcMessageType::Request as u8).into()),
                Value::Integer((*id).into()),
                Value::String(channel.as_str().into()),
                Value::Array(params.clone()),
            ]),
            Self::Response { id, error, result } => Value::Array(vec![
                Value::Integer((RpcMessageType::Response as u8).into()),
                Value::Integer((*id).into()),
                error
                    .as_ref()
                    .map_or(Value::Nil, |e| Value::String(e.as_str().into())),
                result.clone(),
            ]),
            Self::Notification { channel, params } => Value::Array(vec![
                Value::Integer((RpcMessageType::Notification as u8).into()),
                Value::String(channel.as_str().into()),
                Value::Array(params.clone()),
            ]),
        }
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Array(mut arr) = value else {
            return Err(ProtocolError::Malformed("frame is not an array".into()));
        };
        let kind = arr
            .first()
            .and_then(parse_message_type)
            .ok_or_else(|| ProtocolError::Malformed("unknown message type".into()))?;

        match kind {
            RpcMessageType::Request if arr.len() == 4 => {
                let params = take_params(arr.pop())?;
                let channel = take_string(arr.pop(), "channel")?;
                let id = take_id(&arr[1])?;
                Ok(Self::Request {
                    id,
                    channel,
                    params,
                })
            }
            RpcMessageType::Response if arr.len() == 4 => {
                let result = arr.pop().unwrap_or(Value::Nil);
                let error = match arr.pop() {
                    None | Some(Value::Nil) => None,
                    Some(Value::String(s)) => Some(s.into_str().unwrap_or_default()),
                    Some(other) => Some(other.to_string()),
                };
                let id = take_id(&arr[1])?;
                Ok(Self::Response { id, error, result })
            }
            RpcMessageType::Notification if arr.len() == 3 => {
                let params = take_params(arr.pop())?;
                let channel = take_string(arr.pop(), "channel")?;
                Ok(Self::Notification { channel, params })
            }
            _ => Err(ProtocolError::Malformed(format!(
                "{kind:?} frame has {} elements",
                arr.len()
            ))),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &self.to_value())
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = std::io::Cursor::new(bytes);
        let value = rmpv::decode::read_value(&mut cursor)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }
}

fn take_id(value: &Value) -> Result<u64, ProtocolError> {
    value
        .as_u64()
        .ok_or_else(|| ProtocolError::Malformed("request id is not an unsigned integer".into()))
}

fn take_string(value: Option<Value>, what: &str) -> Result<String, ProtocolError> {
    match value {
        Some(Value::String(s)) => s
            .into_str()
            .ok_or_else(|| ProtocolError::Malformed(format!("{what} is not valid UTF-8"))),
        _ => Err(ProtocolError::Malformed(format!("{what} is not a string"))),
    }
}

fn take_params(value: Option<Value>) -> Result<Vec<Value>, ProtocolError> {
    match value {
        Some(Value::Array(params)) => Ok(params),
        Some(Value::Nil) | None => Ok(Vec::new()),
        Some(_) => Err(ProtocolError::Malformed("params is not an array".into())),
    }
}
