// src/transport/memory/socket.rs

//! In-memory socket pair.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;

use crate::endpoint::lock_ignore_poison;
use crate::{
    // ---
    BinaryType,
    CloseInfo,
    Error,
    Frame,
    Result,
    Socket,
    SocketEvent,
    SocketEvents,
    SocketState,
};

/// One end of an in-process socket pair.
///
/// Besides implementing [`Socket`], it exposes hooks tests use to drive the
/// connection: completing the handshake, dropping the connection, raising
/// errors, and injecting raw frames as if the peer had sent them.
pub struct MemorySocket {
    // ---
    state: Mutex<SocketState>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<SocketEvent>>>,
    peer: Mutex<Weak<MemorySocket>>,
    sent: Mutex<Vec<Frame>>,
    binary_type: Mutex<BinaryType>,
}

impl MemorySocket {
    // ---
    fn with_state(state: SocketState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            listeners: Mutex::new(Vec::new()),
            peer: Mutex::new(Weak::new()),
            sent: Mutex::new(Vec::new()),
            binary_type: Mutex::new(BinaryType::default()),
        })
    }

    fn link(a: &Arc<Self>, b: &Arc<Self>) {
        *lock_ignore_poison(&a.peer) = Arc::downgrade(b);
        *lock_ignore_poison(&b.peer) = Arc::downgrade(a);
    }

    /// Two connected sockets, both already open.
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let a = Self::with_state(SocketState::Open);
        let b = Self::with_state(SocketState::Open);
        Self::link(&a, &b);
        (a, b)
    }

    /// Two connected sockets still connecting. Call [`open`](Self::open) on
    /// either one to complete the handshake.
    pub fn connecting_pair() -> (Arc<Self>, Arc<Self>) {
        let a = Self::with_state(SocketState::Connecting);
        let b = Self::with_state(SocketState::Connecting);
        Self::link(&a, &b);
        (a, b)
    }

    fn peer(&self) -> Option<Arc<Self>> {
        lock_ignore_poison(&self.peer).upgrade()
    }

    fn emit(&self, event: SocketEvent) {
        // ---
        // Closed senders belong to dropped receivers; prune them here.
        lock_ignore_poison(&self.listeners).retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Complete the handshake on both ends and emit `Open` on each.
    pub fn open(&self) {
        // ---
        self.open_end();
        if let Some(peer) = self.peer() {
            peer.open_end();
        }
    }

    fn open_end(&self) {
        let was_connecting = {
            let mut state = lock_ignore_poison(&self.state);
            let was = *state == SocketState::Connecting;
            if was {
                *state = SocketState::Open;
            }
            was
        };
        if was_connecting {
            self.emit(SocketEvent::Open);
        }
    }

    /// Abnormal close on both ends (`clean: false`).
    pub fn drop_connection(&self, code: u16, reason: &str) {
        self.shutdown(CloseInfo::new(code, reason, false));
    }

    /// Emit an error notification on this end only.
    pub fn fail(&self, message: &str) {
        self.emit(SocketEvent::Error(message.to_owned()));
    }

    /// Deliver `frame` to this end's listeners as if the peer had sent it.
    pub fn inject(&self, frame: Frame) {
        self.emit(SocketEvent::Message(frame));
    }

    /// Every frame this end has sent, in order.
    pub fn sent_frames(&self) -> Vec<Frame> {
        lock_ignore_poison(&self.sent).clone()
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        // ---
        let mut listeners = lock_ignore_poison(&self.listeners);
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }

    /// Last binary representation hint applied to this end.
    pub fn binary_type(&self) -> BinaryType {
        *lock_ignore_poison(&self.binary_type)
    }

    fn shutdown(&self, info: CloseInfo) {
        // ---
        self.close_end(&info);
        if let Some(peer) = self.peer() {
            peer.close_end(&info);
        }
    }

    fn close_end(&self, info: &CloseInfo) {
        let was = std::mem::replace(&mut *lock_ignore_poison(&self.state), SocketState::Closed);
        if was != SocketState::Closed {
            self.emit(SocketEvent::Close(info.clone()));
        }
    }
}

impl Socket for MemorySocket {
    // ---
    fn state(&self) -> SocketState {
        *lock_ignore_poison(&self.state)
    }

    /// Deliver a frame to the peer.
    ///
    /// Fails if this end is not open. Frames sent after the peer was
    /// dropped are recorded and discarded.
    fn send(&self, frame: Frame) -> Result<()> {
        // ---
        if self.state() != SocketState::Open {
            return Err(Error::Transport("memory socket is not open".into()));
        }

        lock_ignore_poison(&self.sent).push(frame.clone());
        if let Some(peer) = self.peer() {
            peer.emit(SocketEvent::Message(frame));
        }
        Ok(())
    }

    /// Clean close on both ends.
    fn close(&self, code: u16, reason: &str) -> Result<()> {
        // ---
        self.shutdown(CloseInfo::new(code, reason, true));
        Ok(())
    }

    fn events(&self) -> SocketEvents {
        // ---
        let (tx, rx) = mpsc::unbounded_channel();
        lock_ignore_poison(&self.listeners).push(tx);
        rx
    }

    fn set_binary_type(&self, kind: BinaryType) {
        *lock_ignore_poison(&self.binary_type) = kind;
    }
}

/// Create a connected, open in-memory socket pair.
///
/// This socket is always available and requires no external resources.
pub fn create_memory_socket_pair() -> (Arc<MemorySocket>, Arc<MemorySocket>) {
    MemorySocket::pair()
}
