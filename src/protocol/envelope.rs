// src/protocol/envelope.rs

//! Wire envelope and reply payloads.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::names::ReplyTag;
use super::replacer::{self, JsonReplacer};
use crate::{Frame, Result};

/// The JSON object carried by every text frame: `{cmd, payload, id}`.
///
/// Every field is optional on the way in so that malformed envelopes can be
/// recognised and dropped instead of failing the whole parse. Absent fields
/// are omitted on the way out.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Envelope {
    // ---
    /// User command name or internal reply tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    /// Arbitrary JSON payload. Binary-reply markers carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Request id chosen by the sender of a command, echoed by replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl Envelope {
    // ---
    /// Create a command envelope.
    pub fn command(cmd: impl Into<String>, payload: Value, id: u64) -> Self {
        Self {
            cmd: Some(cmd.into()),
            payload: Some(payload),
            id: Some(id),
        }
    }

    /// Create a reply envelope for `id`. Binary-reply markers carry no payload.
    pub fn reply(tag: ReplyTag, payload: Option<Value>, id: u64) -> Self {
        Self {
            cmd: Some(tag.as_str().to_owned()),
            payload,
            id: Some(id),
        }
    }

    /// Parse a text frame. `None` means the frame is not a JSON envelope.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Serialize into a text frame, passing through `replacer` when given.
    pub fn to_frame(&self, replacer: Option<&JsonReplacer>) -> Result<Frame> {
        // ---
        let text = match replacer {
            None => serde_json::to_string(self)?,
            Some(r) => {
                let value = serde_json::to_value(self)?;
                serde_json::to_string(&replacer::apply(r, value))?
            }
        };
        Ok(Frame::Text(text))
    }
}

/// A reply payload: JSON, or raw bytes delivered over the binary side-channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Binary(Bytes),
}

impl Payload {
    /// Serialize any value into a JSON payload.
    pub fn json_from<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Payload::Binary(_))
    }

    /// Borrow the JSON value, if any.
    pub fn json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Binary(_) => None,
        }
    }

    /// Borrow the bytes, if any.
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Payload::Json(_) => None,
            Payload::Binary(b) => Some(b),
        }
    }

    /// Decode a JSON payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`](crate::Error::Serialization) if the
    /// payload is binary or does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        // ---
        match self {
            Payload::Json(v) => Ok(serde_json::from_value(v)?),
            Payload::Binary(b) => Err(<serde_json::Error as serde::de::Error>::custom(format!(
                "expected a JSON reply, got {} binary bytes",
                b.len()
            ))
            .into()),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Json(Value::String(text))
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Json(Value::String(text.to_owned()))
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Payload::Binary(Bytes::from_static(bytes))
    }
}
