use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by an [`Endpoint`](crate::Endpoint).
///
/// Three families matter to callers:
///
/// - **configuration** errors are returned synchronously before anything
///   touches the wire (see [`Error::is_configuration`]);
/// - **remote** errors and **timeouts** settle a [`ReplyFuture`](crate::ReplyFuture);
/// - **lifecycle** errors (`Destroyed`, `BinaryReplySuperseded`) settle
///   requests the endpoint can no longer complete.
///
/// Protocol noise (malformed frames, unknown reply ids, stray binary frames)
/// is never reported through this type.
#[derive(Error, Debug)]
pub enum Error {
    /// Command name uses the internal prefix reserved for reply tags.
    #[error("invalid command name {0:?}: the internal prefix is reserved")]
    InvalidCommand(String),

    /// Command name collides with a lifecycle or bookkeeping event name.
    #[error("command name {0:?} is reserved")]
    ReservedCommand(String),

    /// Binary payloads can only be sent as successful replies.
    #[error("binary payloads cannot be sent as error replies")]
    BinaryErrorReply,

    /// The counterpart answered with an error reply.
    #[error("remote error: {0}")]
    Remote(Value),

    /// No reply arrived inside the configured window.
    #[error("command {cmd:?} timed out after {timeout:?}")]
    Timeout {
        /// Command that was sent.
        cmd: String,
        /// Configured timeout for the request.
        timeout: Duration,
    },

    /// The endpoint was destroyed while the request was pending.
    #[error("endpoint destroyed")]
    Destroyed,

    /// A later binary-reply marker took over the single binary slot.
    #[error("binary reply for request {id} was superseded by a later binary reply")]
    BinaryReplySuperseded {
        /// Id of the request whose binary reply was dropped.
        id: u64,
    },

    /// The endpoint had no open socket, so nothing was sent.
    #[error("endpoint is not open")]
    NotOpen,

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The socket refused a frame or a close request.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// True for errors raised synchronously because the caller misused the API.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidCommand(_) | Error::ReservedCommand(_) | Error::BinaryErrorReply
        )
    }

    /// Payload carried by a remote error, if this is one.
    pub fn remote_payload(&self) -> Option<&Value> {
        match self {
            Error::Remote(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Error> for Value {
    /// Remote errors pass their payload through untouched; every other error
    /// becomes its display string.
    fn from(err: Error) -> Self {
        match err {
            Error::Remote(v) => v,
            other => Value::String(other.to_string()),
        }
    }
}

/// Result type alias for endpoint operations.
pub type Result<T> = std::result::Result<T, Error>;
