// src/domain/socket.rs

//! Socket domain abstractions.
//!
//! This module defines the contract the endpoint expects from an
//! already-open, bidirectional, message-oriented connection. It avoids any
//! reference to concrete protocols or client libraries; adapters live under
//! `src/transport/`.
//!
//! A socket is responsible only for:
//! - reporting its connection state,
//! - delivering text and binary frames in the order they were sent,
//! - notifying listeners of open, close and error conditions.
//!
//! Correlation, reply routing and timeouts are handled by the endpoint.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::Result;

/// Connection state of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Handshake still in progress; frames cannot be sent yet.
    Connecting,
    /// Frames can be sent and received.
    Open,
    /// A close was requested and is in flight.
    Closing,
    /// The connection is gone.
    Closed,
}

/// A single unit exchanged with the socket.
#[derive(Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 frame carrying a JSON envelope.
    Text(String),
    /// Raw, unlabelled bytes. Meaning comes from a preceding binary-reply marker.
    Binary(Bytes),
}

impl Frame {
    /// Returns true for binary frames.
    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary(_))
    }

    /// Length of the frame body in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(s) => s.len(),
            Frame::Binary(b) => b.len(),
        }
    }

    /// Returns true if the frame body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        // Binary bodies can be large; only their length is interesting.
        match self {
            Frame::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Frame::Binary(b) => write!(f, "Binary({} bytes)", b.len()),
        }
    }
}

/// Detail attached to a close notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code (WebSocket numbering).
    pub code: u16,
    /// Human-readable close reason.
    pub reason: String,
    /// True when both sides completed the closing handshake.
    pub clean: bool,
}

impl CloseInfo {
    /// Build a close detail.
    pub fn new(code: u16, reason: impl Into<String>, clean: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            clean,
        }
    }
}

/// Notification emitted by a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The socket finished connecting.
    Open,
    /// The socket closed.
    Close(CloseInfo),
    /// The socket reported an error. The socket may still close afterwards.
    Error(String),
    /// A frame arrived.
    Message(Frame),
}

/// Receiver side of a socket listener registration.
///
/// Dropping it detaches the listener; the socket prunes closed senders the
/// next time it emits.
pub type SocketEvents = mpsc::UnboundedReceiver<SocketEvent>;

/// Binary representation hint forwarded to the socket on bind.
///
/// Sockets that can hand binary messages back either as one contiguous
/// buffer or as a reference-counted slice of a larger read buffer use this to
/// pick one. Sockets without such a choice ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryType {
    /// One owned, contiguous buffer per message.
    #[default]
    Buffer,
    /// A shared view over the socket's read buffer.
    ArrayBuffer,
}

/// Message-oriented socket abstraction.
///
/// Implementations must ensure that:
/// - frames passed to successive `send()` calls reach the peer in that order;
/// - every listener registered through `events()` sees every event emitted
///   after registration, in emission order;
/// - dropping the receiver returned by `events()` stops delivery to it.
///
/// `send()` is an enqueue operation and must not block on the network.
pub trait Socket: Send + Sync {
    // ---
    /// Current connection state.
    fn state(&self) -> SocketState;

    /// Enqueue a frame for delivery.
    fn send(&self, frame: Frame) -> Result<()>;

    /// Start closing the connection with the given code and reason.
    fn close(&self, code: u16, reason: &str) -> Result<()>;

    /// Register a listener for socket events.
    fn events(&self) -> SocketEvents;

    /// Apply a binary representation hint. Default: ignored.
    fn set_binary_type(&self, _kind: BinaryType) {}
}

/// Shared socket pointer.
///
/// Cheap to clone; the endpoint keeps one to send frames and query state.
pub type SocketPtr = Arc<dyn Socket>;
