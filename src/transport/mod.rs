//! Concrete sockets.
//!
//! The endpoint only talks to the [`Socket`](crate::Socket) trait. This
//! module provides implementations of it: an in-process pair that is always
//! available, and a WebSocket adapter behind the `transport_websocket`
//! feature.

mod memory;

#[cfg(feature = "transport_websocket")]
mod websocket;

pub use memory::{create_memory_socket_pair, MemorySocket};

#[cfg(feature = "transport_websocket")]
pub use websocket::WebSocketSocket;
