//! Domain layer public interface.
//!
//! This module defines the socket contract the endpoint is written against.
//! It is independent of any concrete connection library.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod socket;

// --- Socket domain re-exports ---

pub use socket::{
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
