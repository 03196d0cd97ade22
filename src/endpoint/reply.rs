//! Reply helper handed to command listeners, and the caller-side reply future.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::FutureExt;
use serde_json::Value;

use super::pending::ReplyReceiver;
use super::Inner;
use crate::{log_error, Error, Payload, Result};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Render a caught panic as the text of an error reply.
pub(super) fn panic_message(panic: &(dyn Any + Send), context: &str) -> String {
    // ---
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("{context} panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("{context} panicked: {s}")
    } else {
        format!("{context} panicked")
    }
}

/// What a command listener answers with.
///
/// A `Deferred` reply runs on its own task; if it fails or panics, the
/// failure is sent back as an error reply instead of surfacing on this side.
pub enum Reply {
    /// Payload available right now.
    Value(Payload),
    /// Payload produced later. `Err` becomes an error reply.
    Deferred(BoxFuture<'static, std::result::Result<Payload, Value>>),
}

impl Reply {
    /// Wrap a future producing the reply.
    pub fn deferred<F, P, E>(fut: F) -> Self
    where
        F: Future<Output = std::result::Result<P, E>> + Send + 'static,
        P: Into<Payload>,
        E: Into<Value>,
    {
        Reply::Deferred(Box::pin(async move { fut.await.map(Into::into).map_err(Into::into) }))
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Value(p) => f.debug_tuple("Value").field(p).finish(),
            Reply::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<Payload> for Reply {
    fn from(payload: Payload) -> Self {
        Reply::Value(payload)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(Payload::Json(value))
    }
}

impl From<Bytes> for Reply {
    fn from(bytes: Bytes) -> Self {
        Reply::Value(Payload::Binary(bytes))
    }
}

impl From<Vec<u8>> for Reply {
    fn from(bytes: Vec<u8>) -> Self {
        Reply::Value(Payload::from(bytes))
    }
}

/// Reply helper bound to one received command.
///
/// Replying is optional; a listener that never replies treats the command
/// as fire-and-forget (the sender will eventually time out). Cloning is
/// cheap and every clone answers the same request id.
///
/// # Example
///
/// ```no_run
/// # use socket_rpc::{Endpoint, EndpointConfig, Result};
/// # fn example(endpoint: &Endpoint) -> Result<()> {
/// endpoint.on("add", |reply, payload| {
///     let a = payload["a"].as_i64().unwrap_or(0);
///     let b = payload["b"].as_i64().unwrap_or(0);
///     let _ = reply.ok(serde_json::json!({ "sum": a + b }));
/// })?;
///
/// endpoint.on("thumbnail", |reply, _payload| {
///     let _ = reply.deferred(async move {
///         let bytes: Vec<u8> = vec![0x89, b'P', b'N', b'G'];
///         Ok::<_, String>(bytes)
///     });
/// })?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Replier {
    // ---
    endpoint: Weak<Inner>,
    id: Option<u64>,
}

impl Replier {
    // ---
    pub(super) fn new(endpoint: Weak<Inner>, id: Option<u64>) -> Self {
        Self { endpoint, id }
    }

    /// Request id this helper answers, if the command carried one.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Send a reply.
    ///
    /// With `is_error` set the payload is delivered as an error reply and
    /// the sender's future rejects with [`Error::Remote`].
    ///
    /// Binary payloads go out as a binary-reply marker followed by a raw
    /// binary frame. Only one binary reply may be in flight between a pair
    /// of endpoints at a time.
    ///
    /// If the endpoint is gone or its socket is not open the reply is
    /// silently dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::BinaryErrorReply`] for a binary payload with `is_error`
    /// - [`Error::Serialization`] / [`Error::Transport`] if the frame could not be sent
    pub fn reply(&self, reply: impl Into<Reply>, is_error: bool) -> Result<()> {
        // ---
        match reply.into() {
            Reply::Value(payload) => self.send_now(payload, is_error),
            Reply::Deferred(fut) => {
                let this = self.clone();
                tokio::spawn(async move {
                    // A panicking reply future must still answer the sender.
                    let (payload, is_error) = match AssertUnwindSafe(fut).catch_unwind().await {
                        Ok(Ok(payload)) => (payload, is_error),
                        Ok(Err(failure)) => (Payload::Json(failure), true),
                        Err(panic) => {
                            let message = panic_message(&*panic, "deferred reply");
                            log_error!("request {:?}: {message}", this.id);
                            (Payload::Json(Value::String(message)), true)
                        }
                    };
                    if let Err(e) = this.send_now(payload, is_error) {
                        log_error!("deferred reply for request {:?} failed: {e}", this.id);
                    }
                });
                Ok(())
            }
        }
    }

    /// Send a successful reply.
    pub fn ok(&self, payload: impl Into<Payload>) -> Result<()> {
        self.reply(Reply::Value(payload.into()), false)
    }

    /// Send an error reply.
    pub fn err(&self, payload: impl Into<Payload>) -> Result<()> {
        self.reply(Reply::Value(payload.into()), true)
    }

    /// Reply with the outcome of `fut`, run on a spawned task.
    pub fn deferred<F, P, E>(&self, fut: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<P, E>> + Send + 'static,
        P: Into<Payload>,
        E: Into<Value>,
    {
        self.reply(Reply::deferred(fut), false)
    }

    fn send_now(&self, payload: Payload, is_error: bool) -> Result<()> {
        // ---
        if is_error && payload.is_binary() {
            return Err(Error::BinaryErrorReply);
        }

        let Some(inner) = self.endpoint.upgrade() else {
            return Ok(());
        };

        match self.id {
            Some(id) => inner.send_reply(id, payload, is_error),
            None => {
                inner.notice("dropping reply: the command carried no request id");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Replier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replier").field("id", &self.id).finish()
    }
}

/// Eventual result of [`Endpoint::send`](crate::Endpoint::send).
///
/// Resolves with the reply payload, or fails with [`Error::Remote`],
/// [`Error::Timeout`], [`Error::Destroyed`] or
/// [`Error::BinaryReplySuperseded`]. The timeout runs from the moment the
/// command was sent, whether or not this future is being polled.
#[must_use = "the reply is lost unless the future is awaited"]
pub struct ReplyFuture {
    // ---
    id: u64,
    rx: ReplyReceiver,
}

impl ReplyFuture {
    pub(super) fn new(id: u64, rx: ReplyReceiver) -> Self {
        Self { id, rx }
    }

    /// Request id carried by the outbound envelope.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for ReplyFuture {
    type Output = Result<Payload>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // ---
        // A dropped sender means the endpoint itself went away.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Destroyed)))
    }
}

impl std::fmt::Debug for ReplyFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyFuture").field("id", &self.id).finish()
    }
}
