//! Wire protocol: envelope format, reply tags and command naming rules.
//!
//! This module defines what travels over text frames and which command
//! names a user may choose. It knows nothing about sockets or pending
//! requests.
mod envelope;
mod names;
mod replacer;

pub use envelope::{Envelope, Payload};
pub use names::{is_reserved, validate_command, LifecycleKind, ReplyTag, INTERNAL_PREFIX};
pub use replacer::JsonReplacer;
