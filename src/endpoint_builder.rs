//! Endpoint builder.
//!
//! Provides a fluent builder API for configuring an [`Endpoint`] and
//! optionally binding its first socket.

use std::time::Duration;

use serde_json::Value;

use crate::{BinaryType, DebugRecord, Direction, Endpoint, EndpointConfig, SocketPtr};

/// Builder for [`Endpoint`] instances.
///
/// # Examples
///
/// ## Endpoint with an initial socket
/// ```no_run
/// use socket_rpc::{create_memory_socket_pair, EndpointBuilder};
/// use std::time::Duration;
///
/// # async fn example() {
/// let (local, _remote) = create_memory_socket_pair();
///
/// let endpoint = EndpointBuilder::new()
///     .socket(local)
///     .request_timeout(Duration::from_millis(500))
///     .destroy_on_close(true)
///     .build();
/// # }
/// ```
///
/// ## Endpoint bound later
/// ```
/// use socket_rpc::{EndpointBuilder, EndpointState};
///
/// let endpoint = EndpointBuilder::new()
///     .debug_sink(|direction, record| eprintln!("{direction:?} {record:?}"))
///     .build();
/// assert_eq!(endpoint.state(), EndpointState::Unbound);
/// ```
#[derive(Default)]
pub struct EndpointBuilder {
    // ---
    socket: Option<SocketPtr>,
    config: EndpointConfig,
}

impl EndpointBuilder {
    /// Create a builder with default configuration and no socket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: EndpointConfig) -> Self {
        Self {
            socket: None,
            config,
        }
    }

    /// Socket bound when the endpoint is built.
    ///
    /// Building with a socket spawns the receive task, so `build()` must then
    /// run inside a Tokio runtime.
    pub fn socket(mut self, socket: SocketPtr) -> Self {
        self.socket = Some(socket);
        self
    }

    /// Default per-request timeout.
    ///
    /// Default: 2000ms.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Callback receiving every frame sent or received plus protocol noise.
    ///
    /// Default: disabled.
    pub fn debug_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(Direction, &DebugRecord<'_>) + Send + Sync + 'static,
    {
        self.config = self.config.with_debug_sink(sink);
        self
    }

    /// Replacer consulted while encoding outbound envelopes.
    pub fn json_replacer<F>(mut self, replacer: F) -> Self
    where
        F: Fn(&str, Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.config = self.config.with_json_replacer(replacer);
        self
    }

    /// Binary representation hint forwarded to bound sockets.
    ///
    /// Default: [`BinaryType::Buffer`].
    pub fn binary_type(mut self, kind: BinaryType) -> Self {
        self.config.binary_type = kind;
        self
    }

    /// Destroy the endpoint when its socket closes.
    ///
    /// Default: false.
    pub fn destroy_on_close(mut self, enabled: bool) -> Self {
        self.config.destroy_on_close = enabled;
        self
    }

    /// Build the endpoint (consumes self).
    pub fn build(self) -> Endpoint {
        // ---
        match self.socket {
            Some(socket) => Endpoint::with_socket(socket, self.config),
            None => Endpoint::new(self.config),
        }
    }
}
