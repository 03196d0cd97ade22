use std::collections::HashMap;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{Payload, Result};

/// Channel end that settles a caller's [`ReplyFuture`](super::ReplyFuture).
pub(super) type ReplySender = oneshot::Sender<Result<Payload>>;

/// Receiving end handed to the caller.
pub(super) type ReplyReceiver = oneshot::Receiver<Result<Payload>>;

/// Bookkeeping for one outstanding command.
pub(super) struct PendingRequest {
    // ---
    cmd: String,
    tx: ReplySender,
    timer: Option<JoinHandle<()>>,
}

impl PendingRequest {
    // ---

    /// Command the request was sent with.
    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    /// Deliver the outcome and disarm the timeout.
    ///
    /// Returns false if the caller already dropped its future.
    pub fn settle(self, outcome: Result<Payload>) -> bool {
        // ---
        self.into_sender().send(outcome).is_ok()
    }

    /// Disarm the timeout and keep only the sender (binary replies settle later).
    pub fn into_sender(self) -> ReplySender {
        // ---
        if let Some(timer) = self.timer {
            timer.abort();
        }
        self.tx
    }
}

/// Tracks requests waiting for a reply, keyed by request id.
///
/// Owned by one endpoint and only touched under its state lock.
#[derive(Default)]
pub(super) struct PendingRequests {
    // ---
    requests: HashMap<u64, PendingRequest>,
}

impl PendingRequests {
    // ---

    /// Register a new pending request.
    ///
    /// Returns a receiver that is settled when the reply, error reply or
    /// timeout arrives.
    pub fn register(&mut self, id: u64, cmd: &str) -> ReplyReceiver {
        // ---
        let (tx, rx) = oneshot::channel();
        self.requests.insert(
            id,
            PendingRequest {
                cmd: cmd.to_owned(),
                tx,
                timer: None,
            },
        );
        rx
    }

    /// Attach the timeout task to a registered request.
    ///
    /// If the request already settled the timer is aborted and false is
    /// returned.
    pub fn arm(&mut self, id: u64, timer: JoinHandle<()>) -> bool {
        // ---
        match self.requests.get_mut(&id) {
            Some(entry) => {
                entry.timer = Some(timer);
                true
            }
            None => {
                timer.abort();
                false
            }
        }
    }

    /// Remove a pending request without settling it.
    pub fn take(&mut self, id: u64) -> Option<PendingRequest> {
        self.requests.remove(&id)
    }

    /// Remove every pending request.
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        self.requests.drain().map(|(_, entry)| entry).collect()
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }
}
