//! Command/reply correlation over a message-oriented socket.
//!
//! This library layers request/response semantics on top of any socket that
//! delivers discrete text and binary frames (a WebSocket, typically). It
//! handles request-id allocation, reply matching, per-request timeouts, a
//! binary reply side-channel and socket rebinding.
//!
//! Both sides of a connection run an [`Endpoint`]; either side may send
//! commands and either side may answer them.
//!

// Import all sub modules once...
mod macros;

mod domain;
mod endpoint;
mod protocol;
mod transport;

mod endpoint_builder;
mod endpoint_config;

mod error;

pub(crate) use macros::{log_debug, log_error, log_trace, log_warn};

// Re-export main types
pub use endpoint::{
    // ---
    CommandListener,
    Endpoint,
    EndpointState,
    LifecycleEvent,
    LifecycleListener,
    ListenerId,
    Replier,
    Reply,
    ReplyFuture,
    CLOSE_CODE_ALREADY_CLOSED,
    CLOSE_CODE_DESTROYED,
    CLOSE_REASON_ALREADY_CLOSED,
    CLOSE_REASON_DESTROYED,
};
pub use endpoint_builder::EndpointBuilder;
pub use endpoint_config::{DebugRecord, DebugSink, Direction, EndpointConfig, DEFAULT_REQUEST_TIMEOUT};

pub use error::{Error, Result};

pub use transport::{create_memory_socket_pair, MemorySocket};

#[cfg(feature = "transport_websocket")]
pub use transport::WebSocketSocket;

// --- public re-exports
pub use domain::{
    //
    BinaryType,
    CloseInfo,
    Frame,
    Socket,
    SocketEvent,
    SocketEvents,
    SocketPtr,
    SocketState,
};

pub use protocol::{
    //
    is_reserved,
    validate_command,
    Envelope,
    JsonReplacer,
    LifecycleKind,
    Payload,
    ReplyTag,
    INTERNAL_PREFIX,
};
