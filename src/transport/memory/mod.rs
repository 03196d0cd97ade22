// src/transport/memory/mod.rs

//! In-memory socket implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Socket` trait: two connected sockets that hand frames straight to each
//! other. It is intended primarily for testing, local execution, and as a
//! reference for socket semantics.
//!
//! ## Reference Semantics
//!
//! - Frames arrive at the peer in the order they were sent.
//! - A close on either side reaches both sides.
//! - Once `events()` returns, every later event is delivered to it.
//! - Dropping the receiver returned by `events()` detaches that listener.
//!
//! ## Non-Goals
//!
//! This socket does not emulate the closing handshake timing, buffering or
//! failure modes of a real network connection.

mod socket;

pub use socket::{create_memory_socket_pair, MemorySocket};
