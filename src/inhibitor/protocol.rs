//! Wire protocol for the inhibitor daemon link.
//!
//! Frames are UTF-8 JSON objects terminated by the two-byte sequence
//! `\n\r` (note: not the conventional `\r\n`). The `msg_type` key carries
//! the message kind; every other key is a named field. The codec treats
//! kinds and fields as opaque strings/values — only the callers decide
//! which kinds they understand.

use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Frame terminator used by the daemon in both directions.
pub const FRAME_TERMINATOR: &[u8] = b"\n\r";

/// Key carrying the message kind inside a frame body.
const MSG_TYPE_KEY: &str = "msg_type";

// Kinds the client emits.
pub const KIND_HANDSHAKE: &str = "handshake";
pub const KIND_REFRESH: &str = "refresh";
pub const KIND_COMMAND: &str = "command";
pub const KIND_SYS_COMMAND: &str = "sys_command";

// Kinds the client recognizes inbound.
pub const KIND_NEW_CONN: &str = "new_conn";
pub const KIND_RENEW_CONN: &str = "renew_conn";
pub const KIND_STATE_UPDATE: &str = "state_update";
pub const KIND_ACK: &str = "ack";
pub const KIND_NEW_VERSION: &str = "new_version";

/// Named fields carried by a frame.
pub type MessageFields = Map<String, Value>;

/// Errors produced while decoding or picking apart a frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame body is not a JSON object")]
    NotAnObject,

    #[error("frame has no \"msg_type\" key")]
    MissingKind,

    #[error("missing field {field:?}")]
    MissingField { field: &'static str },

    #[error("field {field:?} has the wrong type")]
    WrongType { field: &'static str },
}

/// One decoded inbound frame: a kind plus its named fields.
#[derive(Debug, Clone)]
pub struct ApiMessage {
    kind: String,
    fields: MessageFields,
}

impl ApiMessage {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    /// Required string field.
    pub fn str_field(&self, field: &'static str) -> Result<&str, ProtocolError> {
        match self.fields.get(field) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(ProtocolError::WrongType { field }),
            None => Err(ProtocolError::MissingField { field }),
        }
    }

    /// Optional string field; absent or `null` both read as `None`.
    pub fn opt_str_field(&self, field: &'static str) -> Result<Option<&str>, ProtocolError> {
        match self.fields.get(field) {
            Some(Value::String(value)) => Ok(Some(value)),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(ProtocolError::WrongType { field }),
        }
    }

    /// Required boolean field.
    pub fn bool_field(&self, field: &'static str) -> Result<bool, ProtocolError> {
        match self.fields.get(field) {
            Some(Value::Bool(value)) => Ok(*value),
            Some(_) => Err(ProtocolError::WrongType { field }),
            None => Err(ProtocolError::MissingField { field }),
        }
    }

    /// Optional boolean field; absent or `null` both read as `None`.
    pub fn opt_bool_field(&self, field: &'static str) -> Result<Option<bool>, ProtocolError> {
        match self.fields.get(field) {
            Some(Value::Bool(value)) => Ok(Some(*value)),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(ProtocolError::WrongType { field }),
        }
    }

    /// Required array-of-strings field.
    pub fn str_list_field(&self, field: &'static str) -> Result<Vec<String>, ProtocolError> {
        let items = match self.fields.get(field) {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ProtocolError::WrongType { field }),
            None => return Err(ProtocolError::MissingField { field }),
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(value) => Ok(value.clone()),
                _ => Err(ProtocolError::WrongType { field }),
            })
            .collect()
    }
}

/// Encode a frame: the kind plus its fields as one JSON object, with the
/// terminator appended.
pub fn encode_frame(kind: &str, fields: &MessageFields) -> Vec<u8> {
    let mut body = Map::with_capacity(fields.len() + 1);
    body.insert(MSG_TYPE_KEY.to_string(), Value::String(kind.to_string()));
    for (key, value) in fields {
        body.insert(key.clone(), value.clone());
    }
    let mut frame = serde_json::to_vec(&Value::Object(body)).unwrap_or_default();
    frame.extend_from_slice(FRAME_TERMINATOR);
    frame
}

/// Decode a frame body into its kind and fields. A trailing terminator
/// the reader did not strip is tolerated.
pub fn decode_frame(bytes: &[u8]) -> Result<ApiMessage, ProtocolError> {
    let body = bytes
        .strip_suffix(FRAME_TERMINATOR)
        .unwrap_or(bytes);
    let value: Value = serde_json::from_slice(body)?;
    let Value::Object(mut fields) = value else {
        return Err(ProtocolError::NotAnObject);
    };
    let kind = match fields.remove(MSG_TYPE_KEY) {
        Some(Value::String(kind)) => kind,
        Some(_) => return Err(ProtocolError::WrongType { field: "msg_type" }),
        None => return Err(ProtocolError::MissingKind),
    };
    Ok(ApiMessage { kind, fields })
}

/// Read one frame up to and including the exact `\n\r` sequence.
///
/// A lone `\r` does not terminate a frame; the returned bytes exclude the
/// terminator. EOF before the terminator is an error.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        let n = reader.read_until(b'\r', &mut buf).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before frame terminator",
            ));
        }
        if buf.ends_with(FRAME_TERMINATOR) {
            buf.truncate(buf.len() - FRAME_TERMINATOR.len());
            return Ok(buf);
        }
    }
}

/// Typed view of a `state_update` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub inhibiting: bool,
    pub inhibited_by: Vec<String>,
    pub qbt_connection: bool,
    pub plex_connection: bool,
    pub net_connection: Option<bool>,
    pub message: Option<String>,
    pub version: Option<String>,
}

impl StateUpdate {
    /// Project a decoded frame into the typed update. Missing required
    /// fields surface as [`ProtocolError`] so the caller can treat the
    /// frame as malformed.
    pub fn from_message(msg: &ApiMessage) -> Result<Self, ProtocolError> {
        Ok(Self {
            inhibiting: msg.bool_field("inhibiting")?,
            inhibited_by: msg.str_list_field("inhibited_by")?,
            qbt_connection: msg.bool_field("qbt_connection")?,
            plex_connection: msg.bool_field("plex_connection")?,
            net_connection: msg.opt_bool_field("net_connection")?,
            message: msg.opt_str_field("message")?.map(str::to_string),
            version: msg.opt_str_field("version")?.map(str::to_string),
        })
    }
}
