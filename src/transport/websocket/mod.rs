// src/transport/websocket/mod.rs

//! WebSocket socket backed by `tokio-tungstenite`.
//!
//! The stream is split into a reader task and a writer task. `send` and
//! `close` only enqueue onto the writer channel, so they stay synchronous
//! and preserve call order on the wire. Ping/pong is answered by
//! tungstenite itself.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, WebSocketStream};

use crate::endpoint::lock_ignore_poison;
use crate::{
    // ---
    log_debug,
    log_trace,
    log_warn,
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

/// Close code reported when the connection ends without a close frame.
const CLOSE_CODE_ABNORMAL: u16 = 1006;
/// Close code reported for a close frame without a status.
const CLOSE_CODE_NO_STATUS: u16 = 1005;

struct Shared {
    // ---
    state: Mutex<SocketState>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<SocketEvent>>>,
}

impl Shared {
    fn emit(&self, event: SocketEvent) {
        lock_ignore_poison(&self.listeners).retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Move to `Closed` and publish `info`, once.
    fn finish(&self, info: CloseInfo) {
        // ---
        let was = std::mem::replace(&mut *lock_ignore_poison(&self.state), SocketState::Closed);
        if was != SocketState::Closed {
            log_debug!("websocket closed: {} {:?}", info.code, info.reason);
            self.emit(SocketEvent::Close(info));
        }
    }
}

/// A [`Socket`] over an established WebSocket connection.
///
/// # Example
///
/// ```no_run
/// use socket_rpc::{Endpoint, EndpointConfig, WebSocketSocket};
///
/// # async fn example() -> socket_rpc::Result<()> {
/// let socket = WebSocketSocket::connect("ws://127.0.0.1:9000").await?;
/// let endpoint = Endpoint::with_socket(socket, EndpointConfig::default());
/// # Ok(())
/// # }
/// ```
pub struct WebSocketSocket {
    // ---
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Message>,

    /// Informational only. tungstenite yields each binary message as an
    /// owned `Vec<u8>`, which becomes a `Bytes` without copying, so both
    /// representations are the same here.
    binary_type: Mutex<BinaryType>,
}

impl WebSocketSocket {
    /// Wrap a stream whose handshake already completed.
    ///
    /// Spawns the reader and writer tasks, so this must run inside a Tokio
    /// runtime. The socket starts out open.
    pub fn new<S>(ws: WebSocketStream<S>) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        // ---
        let shared = Arc::new(Shared {
            state: Mutex::new(SocketState::Open),
            listeners: Mutex::new(Vec::new()),
        });
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (mut sink, mut stream) = ws.split();

        let writer_shared = shared.clone();
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    log_warn!("websocket write failed: {e}");
                    writer_shared.emit(SocketEvent::Error(e.to_string()));
                    writer_shared.finish(CloseInfo::new(CLOSE_CODE_ABNORMAL, "write failed", false));
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader_shared = shared.clone();
        tokio::spawn(async move {
            // ---
            while let Some(item) = stream.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        log_trace!("websocket text frame ({} bytes)", text.len());
                        reader_shared.emit(SocketEvent::Message(Frame::Text(text)));
                    }
                    Ok(Message::Binary(data)) => {
                        log_trace!("websocket binary frame ({} bytes)", data.len());
                        reader_shared.emit(SocketEvent::Message(Frame::Binary(Bytes::from(data))));
                    }
                    Ok(Message::Close(frame)) => {
                        let info = match frame {
                            Some(frame) => CloseInfo::new(frame.code.into(), frame.reason.into_owned(), true),
                            None => CloseInfo::new(CLOSE_CODE_NO_STATUS, "", true),
                        };
                        reader_shared.finish(info);
                        return;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                    Err(e) => {
                        reader_shared.emit(SocketEvent::Error(e.to_string()));
                        reader_shared.finish(CloseInfo::new(CLOSE_CODE_ABNORMAL, e.to_string(), false));
                        return;
                    }
                }
            }
            reader_shared.finish(CloseInfo::new(CLOSE_CODE_ABNORMAL, "connection lost", false));
        });

        Arc::new(Self {
            shared,
            outbound,
            binary_type: Mutex::new(BinaryType::default()),
        })
    }

    /// Dial `url` and wrap the resulting client connection.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the connection or handshake fails.
    pub async fn connect(url: &str) -> Result<Arc<WebSocketSocket>> {
        // ---
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| Error::Transport(format!("websocket connect to {url} failed: {e}")))?;
        log_debug!("websocket connected to {url}");
        Ok(Self::new(ws))
    }

    /// Binary representation hint last applied by an endpoint.
    ///
    /// Recorded for inspection; it does not change how frames are delivered.
    pub fn binary_type(&self) -> BinaryType {
        *lock_ignore_poison(&self.binary_type)
    }
}

impl Socket for WebSocketSocket {
    // ---
    fn state(&self) -> SocketState {
        *lock_ignore_poison(&self.shared.state)
    }

    fn send(&self, frame: Frame) -> Result<()> {
        // ---
        if self.state() != SocketState::Open {
            return Err(Error::Transport("websocket is not open".into()));
        }
        let msg = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes.to_vec()),
        };
        self.outbound
            .send(msg)
            .map_err(|_| Error::Transport("websocket writer has stopped".into()))
    }

    fn close(&self, code: u16, reason: &str) -> Result<()> {
        // ---
        {
            let mut state = lock_ignore_poison(&self.shared.state);
            match *state {
                SocketState::Closing | SocketState::Closed => return Ok(()),
                _ => *state = SocketState::Closing,
            }
        }

        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        if self.outbound.send(Message::Close(Some(frame))).is_err() {
            // Writer is gone; nothing will echo the close back.
            self.shared.finish(CloseInfo::new(code, reason, false));
        }
        Ok(())
    }

    fn events(&self) -> SocketEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        lock_ignore_poison(&self.shared.listeners).push(tx);
        rx
    }

    /// Record the hint. Inbound binary frames are owned buffers either way.
    fn set_binary_type(&self, kind: BinaryType) {
        *lock_ignore_poison(&self.binary_type) = kind;
    }
}
