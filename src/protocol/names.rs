// src/protocol/names.rs

//! Command naming rules.
//!
//! The wire `cmd` field carries either a user command name or one of three
//! internal reply tags. Internal tags share a prefix that user commands may
//! never start with, and user commands may never reuse the endpoint's own
//! lifecycle event names. Both checks are static membership tests.

use crate::{Error, Result};

/// Prefix shared by every internal tag on the wire.
pub const INTERNAL_PREFIX: &str = "__";

/// Internal reply tags carried in the `cmd` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyTag {
    /// Successful reply; payload is the result.
    Reply,
    /// Failed reply; payload is the error.
    ErrorReply,
    /// Marker announcing that the next binary frame is the reply.
    BinaryReply,
}

impl ReplyTag {
    /// Wire spelling of the tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            ReplyTag::Reply => "__reply",
            ReplyTag::ErrorReply => "__errorReply",
            ReplyTag::BinaryReply => "__binaryReply",
        }
    }

    /// Recognise a wire tag. Unknown prefixed names are not tags.
    pub fn parse(cmd: &str) -> Option<Self> {
        match cmd {
            "__reply" => Some(ReplyTag::Reply),
            "__errorReply" => Some(ReplyTag::ErrorReply),
            "__binaryReply" => Some(ReplyTag::BinaryReply),
            _ => None,
        }
    }
}

/// Lifecycle notifications published by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleKind {
    Open,
    Close,
    Error,
}

impl LifecycleKind {
    pub const ALL: [LifecycleKind; 3] = [LifecycleKind::Open, LifecycleKind::Close, LifecycleKind::Error];

    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleKind::Open => "open",
            LifecycleKind::Close => "close",
            LifecycleKind::Error => "error",
        }
    }
}

// Listener bookkeeping names. Peers built on emitter-style event models
// cannot route commands with these names, so they stay off the wire.
const BOOKKEEPING_NAMES: [&str; 2] = ["newListener", "removeListener"];

/// True if `name` is a lifecycle or bookkeeping event name.
pub fn is_reserved(name: &str) -> bool {
    LifecycleKind::ALL.iter().any(|k| k.as_str() == name) || BOOKKEEPING_NAMES.contains(&name)
}

/// Check that `name` may be used as a user command.
///
/// # Errors
///
/// - [`Error::InvalidCommand`] if the name starts with [`INTERNAL_PREFIX`]
/// - [`Error::ReservedCommand`] if the name is reserved
pub fn validate_command(name: &str) -> Result<()> {
    // ---
    if name.starts_with(INTERNAL_PREFIX) {
        return Err(Error::InvalidCommand(name.to_owned()));
    }
    if is_reserved(name) {
        return Err(Error::ReservedCommand(name.to_owned()));
    }
    Ok(())
}
