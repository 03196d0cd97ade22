// src/endpoint/mod.rs
//! Command/reply endpoint.
//!
//! This module contains [`Endpoint`], one side of the command/reply
//! protocol bound to a [`Socket`](crate::Socket).
//!
//! # Architecture
//!
//! Binding a socket registers one event listener on it and spawns a receive
//! task that feeds socket events into the endpoint: lifecycle notifications
//! go to lifecycle listeners, frames go to the inbound dispatcher. Rebinding
//! drops the previous registration, so the old socket can no longer reach
//! the endpoint, while command listeners and the request-id counter carry
//! over.
//!
//! Each outbound command gets the next id from a per-endpoint counter and a
//! entry in the pending map holding a oneshot sender. A timer task armed at
//! send time rejects the request if no reply shows up in time.
//!
//! # Concurrency
//!
//! All mutable protocol state (socket binding, counter, pending map, binary
//! slot) sits behind one mutex. Frames leave through a separate wire lock so
//! that a binary-reply marker and its payload frame are always adjacent on
//! the wire. User callbacks are never invoked while either lock is held,
//! and a panicking listener is contained so the receive task keeps running.

mod dispatch;
mod listeners;
mod pending;
mod reply;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{
    // ---
    log_debug,
    log_error,
    log_warn,
    validate_command,
    CloseInfo,
    DebugRecord,
    Direction,
    EndpointConfig,
    Envelope,
    Error,
    Frame,
    Payload,
    ReplyTag,
    Result,
    SocketEvent,
    SocketEvents,
    SocketPtr,
    SocketState,
};

use pending::{PendingRequests, ReplySender};

pub use listeners::{CommandListener, LifecycleEvent, LifecycleListener, ListenerId};
pub use reply::{Reply, Replier, ReplyFuture};

/// Close code reported when a socket is bound after it already closed.
pub const CLOSE_CODE_ALREADY_CLOSED: u16 = 1006;
/// Close reason reported when a socket is bound after it already closed.
pub const CLOSE_REASON_ALREADY_CLOSED: &str = "socket already closed";
/// Close code used by [`Endpoint::destroy`].
pub const CLOSE_CODE_DESTROYED: u16 = 1000;
/// Close reason used by [`Endpoint::destroy`].
pub const CLOSE_REASON_DESTROYED: &str = "endpoint destroyed";

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// Poisoning means a user callback panicked on another task. The guarded
/// state is only ever mutated in short critical sections that do not call
/// out, so it is still consistent.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Coarse endpoint state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// No socket bound yet.
    Unbound,
    /// A socket is bound and not closed (it may still be connecting).
    Bound,
    /// The bound socket closed; the endpoint awaits a rebind or teardown.
    BoundClosed,
    /// [`Endpoint::destroy`] ran. Every operation is now a no-op.
    Destroyed,
}

/// The single outstanding binary reply.
struct BinarySlot {
    id: u64,
    tx: ReplySender,
}

struct State {
    // ---
    socket: Option<SocketPtr>,

    /// Bumped on every bind, close and destroy; events tagged with an older
    /// generation come from a detached socket and are dropped.
    generation: u64,
    receive_task: Option<JoinHandle<()>>,
    destroyed: bool,

    next_id: u64,
    pending: PendingRequests,
    binary_slot: Option<BinarySlot>,
}

impl State {
    fn usable_socket(&self) -> Option<SocketPtr> {
        if self.destroyed {
            return None;
        }
        self.socket
            .as_ref()
            .filter(|s| s.state() == SocketState::Open)
            .cloned()
    }
}

pub(crate) struct Inner {
    // ---
    config: EndpointConfig,
    state: Mutex<State>,
    listeners: Mutex<listeners::Listeners>,

    /// Held while frames are handed to the socket.
    wire: Mutex<()>,
}

/// One side of the command/reply protocol.
///
/// Cheap to clone (internally `Arc`-backed); clones share the same socket,
/// listeners and request-id counter.
///
/// Methods that bind sockets or send commands spawn Tokio tasks and must be
/// called from within a Tokio runtime.
///
/// # Example
///
/// ```no_run
/// use socket_rpc::{create_memory_socket_pair, Endpoint, EndpointConfig};
/// use serde_json::json;
///
/// # async fn example() -> socket_rpc::Result<()> {
/// let (a, b) = create_memory_socket_pair();
/// let server = Endpoint::with_socket(b, EndpointConfig::default());
/// let client = Endpoint::with_socket(a, EndpointConfig::default());
///
/// server.on("echo", |reply, payload| {
///     let _ = reply.ok(payload);
/// })?;
///
/// if let Some(pending) = client.send("echo", json!({"a": 1}))? {
///     let answer = pending.await?;
///     assert_eq!(answer.json(), Some(&json!({"a": 1})));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<Inner>,
}

impl Endpoint {
    // ---
    /// Create an unbound endpoint.
    pub fn new(config: EndpointConfig) -> Self {
        // ---
        let inner = Inner {
            config,
            state: Mutex::new(State {
                socket: None,
                generation: 0,
                receive_task: None,
                destroyed: false,
                next_id: 0,
                pending: PendingRequests::default(),
                binary_slot: None,
            }),
            listeners: Mutex::new(listeners::Listeners::default()),
            wire: Mutex::new(()),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Create an endpoint and bind `socket` to it.
    pub fn with_socket(socket: SocketPtr, config: EndpointConfig) -> Self {
        let endpoint = Self::new(config);
        endpoint.bind(socket);
        endpoint
    }

    /// Configuration this endpoint was built with.
    pub fn config(&self) -> &EndpointConfig {
        &self.inner.config
    }

    /// Bind a socket, replacing the current one.
    ///
    /// The previous socket (if any) is detached first and is not closed.
    /// Command listeners, lifecycle listeners, pending requests and the
    /// request-id counter are kept.
    ///
    /// If the new socket is already open, an `Open` notification is
    /// published on the next scheduler tick; if it is already closed, a
    /// `Close` notification (code 1006) is published instead and the socket
    /// is left untouched: no binary hint, no event listener. Either way
    /// listeners registered right after `bind()` returns still see it.
    ///
    /// No-op on a destroyed endpoint.
    pub fn bind(&self, socket: SocketPtr) {
        self.inner.bind(socket);
    }

    /// Tear the endpoint down. Idempotent.
    ///
    /// Rejects every pending request with [`Error::Destroyed`], closes the
    /// socket if it is not closed yet (publishing a clean `Close` with code
    /// 1000), then drops every listener. Afterwards all operations are
    /// harmless no-ops.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    /// True if a socket is bound and open.
    pub fn is_open(&self) -> bool {
        let state = lock_ignore_poison(&self.inner.state);
        matches!(&state.socket, Some(s) if s.state() == SocketState::Open)
    }

    /// True if a socket is bound and closed.
    pub fn is_closed(&self) -> bool {
        let state = lock_ignore_poison(&self.inner.state);
        matches!(&state.socket, Some(s) if s.state() == SocketState::Closed)
    }

    pub fn is_destroyed(&self) -> bool {
        lock_ignore_poison(&self.inner.state).destroyed
    }

    /// Coarse state of the endpoint.
    pub fn state(&self) -> EndpointState {
        // ---
        let state = lock_ignore_poison(&self.inner.state);
        if state.destroyed {
            return EndpointState::Destroyed;
        }
        match &state.socket {
            None => EndpointState::Unbound,
            Some(s) if s.state() == SocketState::Closed => EndpointState::BoundClosed,
            Some(_) => EndpointState::Bound,
        }
    }

    /// Send a command and await its reply using the configured timeout.
    ///
    /// Returns `Ok(None)` without sending anything if the endpoint is
    /// destroyed or its socket is not open.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCommand`] / [`Error::ReservedCommand`] for unusable names
    /// - [`Error::Serialization`] if `payload` cannot be encoded
    /// - [`Error::Transport`] if the socket refused the frame
    pub fn send<T: Serialize>(&self, cmd: &str, payload: T) -> Result<Option<ReplyFuture>> {
        self.send_with_timeout(cmd, payload, self.inner.config.request_timeout())
    }

    /// Like [`send`](Self::send) with an explicit timeout for this request.
    pub fn send_with_timeout<T: Serialize>(
        &self,
        cmd: &str,
        payload: T,
        timeout: Duration,
    ) -> Result<Option<ReplyFuture>> {
        // ---
        validate_command(cmd)?;
        let payload = serde_json::to_value(payload)?;
        self.inner.send_command(cmd, payload, Some(timeout))
    }

    /// Send a command and decode its JSON reply.
    ///
    /// # Errors
    ///
    /// Everything [`send`](Self::send) and [`ReplyFuture`] report, plus
    /// [`Error::NotOpen`] when nothing could be sent and
    /// [`Error::Serialization`] when the reply does not decode as `TResp`.
    pub async fn request<TReq, TResp>(&self, cmd: &str, payload: TReq) -> Result<TResp>
    where
        TReq: Serialize,
        TResp: DeserializeOwned,
    {
        // ---
        let pending = self.send(cmd, payload)?.ok_or(Error::NotOpen)?;
        pending.await?.into_json()
    }

    /// Broadcast a command without waiting for a reply.
    ///
    /// The envelope still carries a fresh request id; whatever the peer
    /// answers is discarded as an unknown reply.
    pub fn notify<T: Serialize>(&self, cmd: &str, payload: T) -> Result<()> {
        // ---
        validate_command(cmd)?;
        let payload = serde_json::to_value(payload)?;
        self.inner.send_command(cmd, payload, None).map(|_| ())
    }

    /// Register a listener for a command name.
    ///
    /// Every listener registered for a name is invoked with its own
    /// [`Replier`] clone and the command payload. When a command arrives
    /// with no listener at all, the sender receives the error
    /// `"No listener for command: <cmd>"`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCommand`] / [`Error::ReservedCommand`] for names a
    /// peer could never send.
    pub fn on<F>(&self, cmd: &str, listener: F) -> Result<ListenerId>
    where
        F: Fn(Replier, Value) + Send + Sync + 'static,
    {
        // ---
        validate_command(cmd)?;

        if self.is_destroyed() {
            log_debug!("ignoring listener for {cmd:?} on destroyed endpoint");
            return Ok(lock_ignore_poison(&self.inner.listeners).detached_id());
        }

        let id = lock_ignore_poison(&self.inner.listeners).add_command(cmd, Arc::new(listener));
        Ok(id)
    }

    /// Register a listener for open, close and error notifications.
    pub fn on_lifecycle<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        // ---
        if self.is_destroyed() {
            return lock_ignore_poison(&self.inner.listeners).detached_id();
        }
        lock_ignore_poison(&self.inner.listeners).add_lifecycle(Arc::new(listener))
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        lock_ignore_poison(&self.inner.listeners).remove(id)
    }

    /// Number of listeners registered for `cmd`.
    pub fn listener_count(&self, cmd: &str) -> usize {
        lock_ignore_poison(&self.inner.listeners).command_count(cmd)
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        lock_ignore_poison(&self.inner.state).pending.len()
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Inner {
    // ---
    fn bind(self: &Arc<Self>, socket: SocketPtr) {
        // ---
        let (generation, previous, initial) = {
            let mut state = lock_ignore_poison(&self.state);
            if state.destroyed {
                log_debug!("bind ignored: endpoint destroyed");
                return;
            }

            state.generation += 1;
            let generation = state.generation;
            let previous = state.receive_task.take();

            // A socket that is already closed is only recorded, never subscribed to.
            let initial = socket.state();
            if initial != SocketState::Closed {
                socket.set_binary_type(self.config.binary_type);
                let events = socket.events();
                state.receive_task = Some(spawn_receive_loop(Arc::downgrade(self), generation, events));
            }
            state.socket = Some(socket);

            (generation, previous, initial)
        };

        // Dropping the old task drops its receiver, which detaches it.
        if let Some(task) = previous {
            task.abort();
        }

        let synthetic = match initial {
            SocketState::Open => Some(SocketEvent::Open),
            SocketState::Closed => Some(SocketEvent::Close(CloseInfo::new(
                CLOSE_CODE_ALREADY_CLOSED,
                CLOSE_REASON_ALREADY_CLOSED,
                false,
            ))),
            SocketState::Connecting | SocketState::Closing => None,
        };

        if let Some(event) = synthetic {
            let weak = Arc::downgrade(self);
            tokio::spawn(async move {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_event(generation, event);
                }
            });
        }
    }

    fn destroy(&self) {
        // ---
        let (drained, slot, task, socket) = {
            let mut state = lock_ignore_poison(&self.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.generation += 1;
            (
                state.pending.drain(),
                state.binary_slot.take(),
                state.receive_task.take(),
                state.socket.take(),
            )
        };

        log_debug!("destroying endpoint ({} pending requests)", drained.len());

        if let Some(task) = task {
            task.abort();
        }

        for entry in drained {
            entry.settle(Err(Error::Destroyed));
        }
        if let Some(slot) = slot {
            let _ = slot.tx.send(Err(Error::Destroyed));
        }

        if let Some(socket) = socket {
            if socket.state() != SocketState::Closed {
                if let Err(e) = socket.close(CLOSE_CODE_DESTROYED, CLOSE_REASON_DESTROYED) {
                    log_warn!("closing socket on destroy failed: {e}");
                }
                self.emit(LifecycleEvent::Close(CloseInfo::new(
                    CLOSE_CODE_DESTROYED,
                    CLOSE_REASON_DESTROYED,
                    true,
                )));
            }
        }

        lock_ignore_poison(&self.listeners).clear();
    }

    /// Route one socket event. Returns false once the receive loop should stop.
    fn handle_event(self: &Arc<Self>, generation: u64, event: SocketEvent) -> bool {
        // ---
        {
            let state = lock_ignore_poison(&self.state);
            if state.destroyed || state.generation != generation {
                return false;
            }
        }

        match event {
            SocketEvent::Open => {
                log_debug!("socket open");
                self.emit(LifecycleEvent::Open);
                true
            }
            SocketEvent::Error(message) => {
                log_warn!("socket error: {message}");
                self.emit(LifecycleEvent::Error(message));
                true
            }
            SocketEvent::Close(info) => {
                self.handle_close(generation, info);
                false
            }
            SocketEvent::Message(frame) => {
                self.dispatch(frame);
                true
            }
        }
    }

    fn handle_close(&self, generation: u64, info: CloseInfo) {
        // ---
        let task = {
            let mut state = lock_ignore_poison(&self.state);
            if state.destroyed || state.generation != generation {
                return;
            }
            state.generation += 1;
            state.receive_task.take()
        };

        log_debug!("socket closed: {} {:?} (clean: {})", info.code, info.reason, info.clean);

        // Detach. When called from the receive loop itself the abort lands
        // at its next await, after this handler has finished.
        if let Some(task) = task {
            task.abort();
        }

        self.emit(LifecycleEvent::Close(info));

        if self.config.destroy_on_close {
            self.destroy();
        }
    }

    fn send_command(
        self: &Arc<Self>,
        cmd: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Option<ReplyFuture>> {
        // ---
        let (id, rx) = {
            let mut state = lock_ignore_poison(&self.state);
            if state.usable_socket().is_none() {
                log_debug!("not sending {cmd:?}: endpoint not open");
                return Ok(None);
            }

            let id = state.next_id;
            state.next_id += 1;

            // Registered before the frame leaves so a fast reply always finds it.
            let rx = timeout.map(|_| state.pending.register(id, cmd));
            (id, rx)
        };

        let sent = Envelope::command(cmd, payload, id)
            .to_frame(self.config.json_replacer.as_ref())
            .and_then(|frame| self.transmit(vec![frame]));

        match sent {
            Ok(true) => {}
            Ok(false) => {
                self.forget(id);
                return Ok(None);
            }
            Err(e) => {
                self.forget(id);
                return Err(e);
            }
        }

        let (Some(timeout), Some(rx)) = (timeout, rx) else {
            return Ok(None);
        };

        let weak = Arc::downgrade(self);
        let timed_cmd = cmd.to_owned();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(id, timed_cmd, timeout);
            }
        });
        lock_ignore_poison(&self.state).pending.arm(id, timer);

        Ok(Some(ReplyFuture::new(id, rx)))
    }

    fn forget(&self, id: u64) {
        // ---
        let entry = lock_ignore_poison(&self.state).pending.take(id);
        drop(entry);
    }

    fn expire(&self, id: u64, cmd: String, timeout: Duration) {
        // ---
        let entry = lock_ignore_poison(&self.state).pending.take(id);
        if let Some(entry) = entry {
            log_debug!("request {id} ({cmd}) timed out after {timeout:?}");
            entry.settle(Err(Error::Timeout { cmd, timeout }));
        }
    }

    /// Answer request `id`. Binary payloads travel as marker + raw frame.
    fn send_reply(&self, id: u64, payload: Payload, is_error: bool) -> Result<()> {
        // ---
        let replacer = self.config.json_replacer.as_ref();

        let frames = match payload {
            Payload::Binary(_) if is_error => return Err(Error::BinaryErrorReply),
            Payload::Binary(bytes) => vec![
                Envelope::reply(ReplyTag::BinaryReply, None, id).to_frame(replacer)?,
                Frame::Binary(bytes),
            ],
            Payload::Json(value) => {
                let tag = if is_error {
                    ReplyTag::ErrorReply
                } else {
                    ReplyTag::Reply
                };
                vec![Envelope::reply(tag, Some(value), id).to_frame(replacer)?]
            }
        };

        if !self.transmit(frames)? {
            log_debug!("reply for request {id} dropped: endpoint not open");
        }
        Ok(())
    }

    /// Hand frames to the socket back to back.
    ///
    /// Returns `Ok(false)` without sending if the endpoint is destroyed or
    /// the socket is not open.
    fn transmit(&self, frames: Vec<Frame>) -> Result<bool> {
        // ---
        let Some(socket) = lock_ignore_poison(&self.state).usable_socket() else {
            return Ok(false);
        };

        let (sent, outcome) = {
            let _wire = lock_ignore_poison(&self.wire);
            let mut sent = Vec::with_capacity(frames.len());
            let mut outcome = Ok(true);
            for frame in frames {
                if let Err(e) = socket.send(frame.clone()) {
                    log_error!("socket send failed: {e}");
                    outcome = Err(e);
                    break;
                }
                sent.push(frame);
            }
            (sent, outcome)
        };

        // The sink may send through this endpoint, so it runs after the wire lock is released.
        for frame in &sent {
            self.debug_frame(Direction::Outbound, frame);
        }
        outcome
    }

    fn emit(&self, event: LifecycleEvent) {
        // ---
        let handlers = lock_ignore_poison(&self.listeners).lifecycle();
        for handler in handlers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                log_error!("{}", reply::panic_message(&*panic, &format!("{} listener", event.kind().as_str())));
            }
        }
    }

    fn debug_frame(&self, direction: Direction, frame: &Frame) {
        if let Some(sink) = &self.config.debug_sink {
            sink(direction, &DebugRecord::Frame(frame));
        }
    }

    /// Report protocol noise.
    pub(crate) fn notice(&self, message: &str) {
        // ---
        log_debug!("{message}");
        if let Some(sink) = &self.config.debug_sink {
            sink(Direction::Inbound, &DebugRecord::Notice(message));
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // ---
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(task) = state.receive_task.take() {
            task.abort();
        }
        // Remaining senders drop here; their futures resolve to `Destroyed`.
        for entry in state.pending.drain() {
            drop(entry.into_sender());
        }
    }
}

/// Forward socket events into the endpoint until the socket closes, the
/// endpoint goes away, or the binding is replaced.
fn spawn_receive_loop(endpoint: Weak<Inner>, generation: u64, mut events: SocketEvents) -> JoinHandle<()> {
    // ---
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(inner) = endpoint.upgrade() else {
                break;
            };
            if !inner.handle_event(generation, event) {
                break;
            }
        }
        log_debug!("receive loop for binding {generation} stopped");
    })
}
