// src/endpoint/dispatch.rs

//! Inbound dispatcher.
//!
//! Every frame delivered by the bound socket ends up here. Binary frames
//! feed the binary reply slot; text frames are parsed as envelopes and
//! routed either to the pending-request table (reply tags) or to command
//! listeners (everything else).
//!
//! Nothing in this module returns an error: malformed envelopes, replies
//! for unknown ids and stray binary frames are protocol noise, reported
//! through the debug sink and dropped.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use super::reply::panic_message;
use super::{lock_ignore_poison, BinarySlot, Inner, Replier};
use crate::{log_debug, log_error, log_trace, Envelope, Error, Frame, Payload, ReplyTag};

impl Inner {
    // ---
    pub(super) fn dispatch(self: &Arc<Self>, frame: Frame) {
        // ---
        log_trace!("inbound {frame:?}");
        self.debug_frame(crate::Direction::Inbound, &frame);

        match frame {
            Frame::Binary(bytes) => self.fulfil_binary(bytes),
            Frame::Text(text) => self.dispatch_text(&text),
        }
    }

    fn dispatch_text(self: &Arc<Self>, text: &str) {
        // ---
        let Some(envelope) = Envelope::parse(text) else {
            self.notice("discarding text frame that is not an envelope");
            return;
        };

        let Some(cmd) = envelope.cmd else {
            self.notice("discarding envelope without cmd");
            return;
        };

        match ReplyTag::parse(&cmd) {
            Some(tag) => self.route_reply(tag, envelope.id, envelope.payload),
            None => self.dispatch_command(cmd, envelope.id, envelope.payload.unwrap_or(Value::Null)),
        }
    }

    fn route_reply(&self, tag: ReplyTag, id: Option<u64>, payload: Option<Value>) {
        // ---
        let Some(id) = id else {
            self.notice(&format!("discarding {} without id", tag.as_str()));
            return;
        };

        let mut state = lock_ignore_poison(&self.state);

        let Some(entry) = state.pending.take(id) else {
            drop(state);
            self.notice(&format!("discarding {} for unknown request {id}", tag.as_str()));
            return;
        };

        log_debug!("{} for request {id} ({})", tag.as_str(), entry.cmd());

        match tag {
            ReplyTag::Reply => {
                drop(state);
                entry.settle(Ok(Payload::Json(payload.unwrap_or(Value::Null))));
            }
            ReplyTag::ErrorReply => {
                drop(state);
                entry.settle(Err(Error::Remote(payload.unwrap_or(Value::Null))));
            }
            ReplyTag::BinaryReply => {
                // Settles when the next binary frame arrives. Last marker wins.
                let previous = state.binary_slot.replace(BinarySlot {
                    id,
                    tx: entry.into_sender(),
                });
                drop(state);

                if let Some(previous) = previous {
                    self.notice(&format!(
                        "binary reply for request {} superseded by request {id}",
                        previous.id
                    ));
                    let _ = previous
                        .tx
                        .send(Err(Error::BinaryReplySuperseded { id: previous.id }));
                }
            }
        }
    }

    fn fulfil_binary(&self, bytes: Bytes) {
        // ---
        let slot = lock_ignore_poison(&self.state).binary_slot.take();

        match slot {
            Some(slot) => {
                log_debug!("binary reply for request {} ({} bytes)", slot.id, bytes.len());
                let _ = slot.tx.send(Ok(Payload::Binary(bytes)));
            }
            None => self.notice("discarding binary frame nobody is waiting for"),
        }
    }

    fn dispatch_command(self: &Arc<Self>, cmd: String, id: Option<u64>, payload: Value) {
        // ---
        let handlers = lock_ignore_poison(&self.listeners).commands_for(&cmd);
        let replier = Replier::new(Arc::downgrade(self), id);

        if handlers.is_empty() {
            log_debug!("no listener for command {cmd:?}");
            if let Err(e) = replier.err(format!("No listener for command: {cmd}")) {
                log_debug!("could not report missing listener for {cmd:?}: {e}");
            }
            return;
        }

        for handler in handlers {
            let (r, p) = (replier.clone(), payload.clone());
            // A panicking listener answers with an error and leaves the receive loop running.
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(r, p))) {
                let message = panic_message(&*panic, &format!("listener for {cmd:?}"));
                log_error!("{message}");
                if let Err(e) = replier.err(message) {
                    log_debug!("could not report listener failure for {cmd:?}: {e}");
                }
            }
        }
    }
}
