//! Endpoint configuration.
//!
//! This type intentionally contains no socket-library concepts. Sockets are
//! constructed elsewhere and handed to the endpoint already connected (or
//! connecting).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{BinaryType, Frame, JsonReplacer};

/// Default time a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2000);

/// Direction of a frame reported to a [`DebugSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Frame received from the socket, or a notice about one.
    Inbound,
    /// Frame handed to the socket.
    Outbound,
}

/// Structured detail passed to a [`DebugSink`].
#[derive(Debug, Clone, Copy)]
pub enum DebugRecord<'a> {
    /// A frame as it crossed the socket boundary.
    Frame(&'a Frame),
    /// A discarded frame or other protocol noise.
    Notice(&'a str),
}

/// Callback invoked for every frame sent or received, and for protocol noise.
pub type DebugSink = Arc<dyn Fn(Direction, &DebugRecord<'_>) + Send + Sync>;

/// Endpoint configuration.
///
/// # Example
///
/// ```
/// use socket_rpc::{BinaryType, EndpointConfig};
/// use std::time::Duration;
///
/// let config = EndpointConfig::default()
///     .with_request_timeout(Duration::from_secs(5))
///     .with_binary_type(BinaryType::ArrayBuffer)
///     .with_destroy_on_close(true);
/// assert!(config.destroy_on_close);
/// ```
#[derive(Clone, Default)]
pub struct EndpointConfig {
    // ---
    /// Timeout applied by [`Endpoint::send`](crate::Endpoint::send).
    ///
    /// `None` means [`DEFAULT_REQUEST_TIMEOUT`].
    pub request_timeout: Option<Duration>,

    /// Frame-level debug callback. Disabled when `None`.
    pub debug_sink: Option<DebugSink>,

    /// Replacer applied to every outbound envelope.
    pub json_replacer: Option<JsonReplacer>,

    /// Binary representation hint forwarded to each bound socket.
    pub binary_type: BinaryType,

    /// Destroy the endpoint when its socket closes.
    pub destroy_on_close: bool,
}

impl EndpointConfig {
    /// Effective default request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Set the default request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Install a debug sink.
    pub fn with_debug_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(Direction, &DebugRecord<'_>) + Send + Sync + 'static,
    {
        self.debug_sink = Some(Arc::new(sink));
        self
    }

    /// Install an outbound JSON replacer.
    pub fn with_json_replacer<F>(mut self, replacer: F) -> Self
    where
        F: Fn(&str, serde_json::Value) -> Option<serde_json::Value> + Send + Sync + 'static,
    {
        self.json_replacer = Some(Arc::new(replacer));
        self
    }

    /// Choose the binary representation hint.
    pub fn with_binary_type(mut self, kind: BinaryType) -> Self {
        self.binary_type = kind;
        self
    }

    /// Destroy the endpoint automatically when the socket closes.
    pub fn with_destroy_on_close(mut self, enabled: bool) -> Self {
        self.destroy_on_close = enabled;
        self
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("request_timeout", &self.request_timeout())
            .field("debug_sink", &self.debug_sink.is_some())
            .field("json_replacer", &self.json_replacer.is_some())
            .field("binary_type", &self.binary_type)
            .field("destroy_on_close", &self.destroy_on_close)
            .finish()
    }
}
