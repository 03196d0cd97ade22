use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use socket_rpc::{
    //
    create_memory_socket_pair,
    BinaryType,
    CloseInfo,
    DebugRecord,
    Direction,
    Endpoint,
    EndpointBuilder,
    EndpointConfig,
    EndpointState,
    Envelope,
    Error,
    Frame,
    LifecycleEvent,
    MemorySocket,
    Result,
    Socket,
    CLOSE_CODE_ALREADY_CLOSED,
    CLOSE_CODE_DESTROYED,
    CLOSE_REASON_ALREADY_CLOSED,
};

#[derive(Debug, Serialize, Deserialize)]
struct AddRequest {
    a: i32,
    b: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddResponse {
    sum: i32,
}

struct Connected {
    // ---
    client: Endpoint,
    server: Endpoint,
    client_socket: Arc<MemorySocket>,
    server_socket: Arc<MemorySocket>,
}

fn connected(client_config: EndpointConfig) -> Connected {
    // ---
    let (client_socket, server_socket) = create_memory_socket_pair();
    let server = Endpoint::with_socket(server_socket.clone(), EndpointConfig::default());
    let client = Endpoint::with_socket(client_socket.clone(), client_config);
    Connected {
        client,
        server,
        client_socket,
        server_socket,
    }
}

fn register_math(server: &Endpoint) -> Result<()> {
    // ---
    server.on("add", |reply, payload| {
        let _ = match serde_json::from_value::<AddRequest>(payload) {
            Ok(req) => reply.ok(json!({ "sum": req.a + req.b })),
            Err(e) => reply.err(e.to_string()),
        };
    })?;
    Ok(())
}

fn lifecycle_events(endpoint: &Endpoint) -> mpsc::UnboundedReceiver<LifecycleEvent> {
    // ---
    let (tx, rx) = mpsc::unbounded_channel();
    endpoint.on_lifecycle(move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn eventually(mut check: impl FnMut() -> bool) {
    // ---
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

fn text(raw: &str) -> Frame {
    Frame::Text(raw.to_owned())
}

#[tokio::test]
async fn test_basic_request() -> Result<()> {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    log::info!("Starting basic request test");

    let c = connected(EndpointConfig::default());
    register_math(&c.server)?;

    log::info!("sending add 2 3...");
    let resp: AddResponse = c.client.request("add", AddRequest { a: 2, b: 3 }).await?;
    log::info!("sending add 2 3...done");
    assert_eq!(resp.sum, 5);
    assert_eq!(c.client.pending_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let c = connected(EndpointConfig::default());
    register_math(&c.server).unwrap();

    let mut handles = Vec::new();

    for i in 0..10 {
        // ---
        let client = c.client.clone();

        handles.push(tokio::spawn(async move {
            let resp: AddResponse = client
                .request("add", AddRequest { a: i, b: i })
                .await
                .unwrap();
            resp.sum
        }));
    }

    for (i, task) in handles.into_iter().enumerate() {
        let sum = task.await.unwrap();
        assert_eq!(sum, (i as i32) * 2);
    }
}

#[tokio::test]
async fn test_request_ids_increase_per_endpoint() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());

    let first = c.client.send("a", json!(1))?.expect("socket is open");
    let second = c.client.send("b", json!(2))?.expect("socket is open");
    let third = c.client.send("c", json!(3))?.expect("socket is open");
    assert_eq!((first.id(), second.id(), third.id()), (0, 1, 2));

    let ids: Vec<u64> = c
        .client_socket
        .sent_frames()
        .iter()
        .filter_map(|frame| match frame {
            Frame::Text(t) => Envelope::parse(t).and_then(|e| e.id),
            Frame::Binary(_) => None,
        })
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);

    Ok(())
}

#[tokio::test]
async fn test_reserved_and_internal_names_fail_before_sending() {
    // ---
    let c = connected(EndpointConfig::default());

    for name in ["open", "close", "error", "newListener", "removeListener"] {
        let err = c.client.send(name, json!(null)).unwrap_err();
        assert!(matches!(err, Error::ReservedCommand(ref n) if n == name));
        assert!(c.client.on(name, |_, _| {}).is_err());
    }

    let err = c.client.send("__reply", json!(null)).unwrap_err();
    assert!(matches!(err, Error::InvalidCommand(_)));
    assert!(err.is_configuration());
    assert!(c.client.notify("__anything", json!(null)).is_err());

    assert!(c.client_socket.sent_frames().is_empty());
    assert_eq!(c.client.pending_count(), 0);
}

#[tokio::test]
async fn test_command_without_listener_gets_error_reply() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());

    let outcome = c.client.send("nope", json!({}))?.expect("socket is open").await;
    match outcome {
        Err(Error::Remote(payload)) => assert_eq!(payload, json!("No listener for command: nope")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_every_listener_sees_command() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    for tag in ["first", "second"] {
        let tx = tx.clone();
        c.server.on("fanout", move |reply, payload| {
            let _ = tx.send((tag, payload));
            if tag == "first" {
                let _ = reply.ok(json!("handled"));
            }
        })?;
    }
    assert_eq!(c.server.listener_count("fanout"), 2);

    let answer = c.client.send("fanout", json!(7))?.expect("socket is open").await?;
    assert_eq!(answer.json(), Some(&json!("handled")));

    assert_eq!(next(&mut rx).await, ("first", json!(7)));
    assert_eq!(next(&mut rx).await, ("second", json!(7)));
    Ok(())
}

#[tokio::test]
async fn test_off_removes_listener() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());

    let id = c.server.on("echo", |reply, payload| {
        let _ = reply.ok(payload);
    })?;
    assert!(c.server.off(id));
    assert!(!c.server.off(id));
    assert_eq!(c.server.listener_count("echo"), 0);

    let outcome = c.client.send("echo", json!(1))?.expect("socket is open").await;
    assert!(matches!(outcome, Err(Error::Remote(_))));
    Ok(())
}

#[tokio::test]
async fn test_timeout_names_command() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());
    c.server.on("slow", |_reply, _payload| {})?;

    let timeout = Duration::from_millis(50);
    let outcome = c
        .client
        .send_with_timeout("slow", json!(null), timeout)?
        .expect("socket is open")
        .await;

    match outcome {
        Err(Error::Timeout { cmd, timeout: t }) => {
            assert_eq!(cmd, "slow");
            assert_eq!(t, timeout);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(c.client.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_late_reply_after_timeout_is_noise() -> Result<()> {
    // ---
    let notices = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink_notices = notices.clone();
    let config = EndpointConfig::default().with_debug_sink(move |_, record| {
        if let DebugRecord::Notice(message) = record {
            sink_notices.lock().unwrap().push(message.to_string());
        }
    });
    let c = connected(config);

    let outcome = c
        .client
        .send_with_timeout("anything", json!(null), Duration::from_millis(20))?
        .expect("socket is open");
    let id = outcome.id();
    assert!(matches!(outcome.await, Err(Error::Timeout { .. })));

    c.client_socket.inject(text(&format!(r#"{{"cmd":"__reply","id":{id},"payload":1}}"#)));

    let needle = format!("unknown request {id}");
    eventually(|| notices.lock().unwrap().iter().any(|n| n.contains(&needle))).await;
    Ok(())
}

#[tokio::test]
async fn test_binary_reply_roundtrip() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());
    c.server.on("blob", |reply, _payload| {
        let _ = reply.ok(Bytes::from_static(b"\x01\x02\x03"));
    })?;

    let payload = c.client.send("blob", json!(null))?.expect("socket is open").await?;
    assert!(payload.is_binary());
    assert_eq!(payload.bytes().map(|b| &b[..]), Some(&b"\x01\x02\x03"[..]));

    let frames = c.server_socket.sent_frames();
    assert_eq!(frames.len(), 2, "exactly one marker and one binary frame");
    match &frames[0] {
        Frame::Text(t) => {
            let marker = Envelope::parse(t).expect("marker is an envelope");
            assert_eq!(marker.cmd.as_deref(), Some("__binaryReply"));
            assert_eq!(marker.id, Some(0));
            assert!(marker.payload.is_none());
        }
        Frame::Binary(_) => panic!("marker must be a text frame"),
    }
    assert_eq!(frames[1], Frame::Binary(Bytes::from_static(b"\x01\x02\x03")));
    Ok(())
}

#[tokio::test]
async fn test_binary_error_reply_is_rejected() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    c.server.on("bad", move |reply, _payload| {
        let _ = tx.send(reply.err(vec![1u8, 2, 3]));
    })?;

    let _pending = c
        .client
        .send_with_timeout("bad", json!(null), Duration::from_millis(200))?
        .expect("socket is open");

    let result = next(&mut rx).await;
    match result {
        Err(e) => {
            assert!(matches!(e, Error::BinaryErrorReply));
            assert!(e.is_configuration());
        }
        Ok(()) => panic!("binary error reply must be refused"),
    }
    assert!(c.server_socket.sent_frames().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_superseded_binary_reply_is_rejected() -> Result<()> {
    // ---
    let (socket, _peer) = create_memory_socket_pair();
    let client = Endpoint::with_socket(socket.clone(), EndpointConfig::default());

    let first = client.send("one", json!(null))?.expect("socket is open");
    let second = client.send("two", json!(null))?.expect("socket is open");

    socket.inject(text(&format!(r#"{{"cmd":"__binaryReply","id":{}}}"#, first.id())));
    socket.inject(text(&format!(r#"{{"cmd":"__binaryReply","id":{}}}"#, second.id())));
    socket.inject(Frame::Binary(Bytes::from_static(b"payload")));

    match first.await {
        Err(Error::BinaryReplySuperseded { id }) => assert_eq!(id, 0),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let payload = second.await?;
    assert_eq!(payload.bytes().map(|b| &b[..]), Some(&b"payload"[..]));
    Ok(())
}

#[tokio::test]
async fn test_deferred_reply() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());

    c.server.on("later", |reply, payload| {
        let _ = reply.deferred(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, String>(json!({ "echo": payload }))
        });
    })?;
    c.server.on("broken", |reply, _payload| {
        let _ = reply.deferred(async { Err::<Value, _>("boom".to_string()) });
    })?;

    let ok = c.client.send("later", json!("x"))?.expect("socket is open").await?;
    assert_eq!(ok.json(), Some(&json!({ "echo": "x" })));

    match c.client.send("broken", json!(null))?.expect("socket is open").await {
        Err(Error::Remote(payload)) => assert_eq!(payload, json!("boom")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_panicking_deferred_reply_becomes_error_reply() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());

    c.server.on("later", |reply, _payload| {
        let _ = reply.deferred(async {
            if true {
                panic!("thunk fault");
            }
            Ok::<Value, String>(Value::Null)
        });
    })?;

    let outcome = c
        .client
        .send_with_timeout("later", json!(null), Duration::from_millis(500))?
        .expect("socket is open")
        .await;

    match outcome {
        Err(Error::Remote(payload)) => {
            let message = payload.as_str().unwrap_or_default();
            assert!(message.contains("thunk fault"), "got {message:?}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_panicking_listener_answers_and_keeps_endpoint_alive() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());

    c.server.on("boom", |_reply, _payload| panic!("kaboom"))?;
    c.server.on("echo", |reply, payload| {
        let _ = reply.ok(payload);
    })?;

    let outcome = c
        .client
        .send_with_timeout("boom", json!(null), Duration::from_millis(500))?
        .expect("socket is open")
        .await;

    match outcome {
        Err(Error::Remote(payload)) => {
            let message = payload.as_str().unwrap_or_default();
            assert!(message.contains("kaboom"), "got {message:?}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The receive loop survived and still answers later commands.
    let echoed = c
        .client
        .send_with_timeout("echo", json!("still here"), Duration::from_millis(500))?
        .expect("socket is open")
        .await?;
    assert_eq!(echoed.json(), Some(&json!("still here")));
    assert!(c.server.is_open());
    Ok(())
}

#[tokio::test]
async fn test_panicking_lifecycle_listener_is_contained() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());
    c.client.on_lifecycle(|_event| panic!("lifecycle fault"));
    let mut events = lifecycle_events(&c.client);
    register_math(&c.server)?;

    assert_eq!(next(&mut events).await, LifecycleEvent::Open);

    let resp: AddResponse = c.client.request("add", AddRequest { a: 1, b: 1 }).await?;
    assert_eq!(resp.sum, 2);
    Ok(())
}

#[tokio::test]
async fn test_destroy_rejects_pending_and_closes_once() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());
    c.server.on("slow", |_reply, _payload| {})?;
    let mut client_events = lifecycle_events(&c.client);
    let mut server_events = lifecycle_events(&c.server);

    let pending = c.client.send("slow", json!(null))?.expect("socket is open");
    c.client.destroy();
    c.client.destroy();

    assert!(matches!(pending.await, Err(Error::Destroyed)));
    assert_eq!(c.client.state(), EndpointState::Destroyed);
    assert_eq!(c.client_socket.state(), socket_rpc::SocketState::Closed);

    // Listeners were dropped by destroy, so the channel drains then closes.
    let mut closes = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(1), client_events.recv()).await {
        if let LifecycleEvent::Close(info) = event {
            closes.push(info);
        }
    }
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].code, CLOSE_CODE_DESTROYED);
    assert!(closes[0].clean);

    loop {
        if let LifecycleEvent::Close(info) = next(&mut server_events).await {
            assert_eq!(info.code, CLOSE_CODE_DESTROYED);
            break;
        }
    }
    assert_eq!(c.server.state(), EndpointState::BoundClosed);
    Ok(())
}

#[tokio::test]
async fn test_destroyed_endpoint_is_inert() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());
    c.client.destroy();

    assert!(c.client.send("x", json!(null))?.is_none());
    assert!(matches!(
        c.client.request::<_, Value>("x", json!(null)).await,
        Err(Error::NotOpen)
    ));
    c.client.on("x", |_, _| {})?;
    assert_eq!(c.client.listener_count("x"), 0);

    let (fresh, _peer) = create_memory_socket_pair();
    c.client.bind(fresh.clone());
    assert_eq!(c.client.state(), EndpointState::Destroyed);
    assert_eq!(fresh.listener_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_send_while_not_open_sends_nothing() -> Result<()> {
    // ---
    let (socket, _peer) = MemorySocket::connecting_pair();
    let endpoint = Endpoint::with_socket(socket.clone(), EndpointConfig::default());
    let mut events = lifecycle_events(&endpoint);

    assert_eq!(endpoint.state(), EndpointState::Bound);
    assert!(!endpoint.is_open());
    assert!(endpoint.send("hello", json!(null))?.is_none());
    endpoint.notify("hello", json!(null))?;
    assert!(socket.sent_frames().is_empty());
    assert_eq!(endpoint.pending_count(), 0);

    socket.open();
    assert_eq!(next(&mut events).await, LifecycleEvent::Open);
    assert!(endpoint.is_open());
    assert!(endpoint.send("hello", json!(null))?.is_some());
    assert_eq!(socket.sent_frames().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_bind_open_socket_publishes_open() {
    // ---
    let (socket, _peer) = create_memory_socket_pair();
    let endpoint = Endpoint::with_socket(socket, EndpointConfig::default());

    // Registered after bind returned; the notification is still delivered.
    let mut events = lifecycle_events(&endpoint);
    assert_eq!(next(&mut events).await, LifecycleEvent::Open);
}

#[tokio::test]
async fn test_bind_closed_socket_publishes_close() {
    // ---
    let (socket, _peer) = create_memory_socket_pair();
    socket.close(1000, "done").unwrap();

    let endpoint = EndpointBuilder::new()
        .binary_type(BinaryType::ArrayBuffer)
        .socket(socket.clone())
        .build();
    let mut events = lifecycle_events(&endpoint);

    // The closed socket is recorded but never subscribed to or configured.
    assert_eq!(socket.listener_count(), 0);
    assert_eq!(socket.binary_type(), BinaryType::Buffer);

    assert_eq!(
        next(&mut events).await,
        LifecycleEvent::Close(CloseInfo::new(
            CLOSE_CODE_ALREADY_CLOSED,
            CLOSE_REASON_ALREADY_CLOSED,
            false
        ))
    );
    assert!(endpoint.is_closed());
    assert_eq!(endpoint.state(), EndpointState::BoundClosed);
}

#[tokio::test]
async fn test_rebind_ignores_old_socket() -> Result<()> {
    // ---
    let (old, _old_peer) = create_memory_socket_pair();
    let (new, _new_peer) = create_memory_socket_pair();
    let endpoint = Endpoint::with_socket(old.clone(), EndpointConfig::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    endpoint.on("ping", move |_reply, payload| {
        let _ = tx.send(payload);
    })?;

    let before = endpoint.send("x", json!(null))?.expect("socket is open");
    endpoint.bind(new.clone());
    let after = endpoint.send("x", json!(null))?.expect("socket is open");
    assert_eq!((before.id(), after.id()), (0, 1));

    old.inject(text(r#"{"cmd":"ping","payload":"old"}"#));
    new.inject(text(r#"{"cmd":"ping","payload":"new"}"#));

    assert_eq!(next(&mut rx).await, json!("new"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err(), "old socket must not reach the endpoint");

    eventually(|| old.listener_count() == 0).await;
    assert_eq!(new.listener_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_malformed_frames_are_noise() -> Result<()> {
    // ---
    let notices = Arc::new(Mutex::new(Vec::<String>::new()));
    let inbound = Arc::new(Mutex::new(0usize));
    let (sink_notices, sink_inbound) = (notices.clone(), inbound.clone());

    let (socket, _peer) = create_memory_socket_pair();
    let endpoint = EndpointBuilder::new()
        .socket(socket.clone())
        .debug_sink(move |direction, record| match record {
            DebugRecord::Notice(message) => sink_notices.lock().unwrap().push(message.to_string()),
            DebugRecord::Frame(_) if direction == Direction::Inbound => *sink_inbound.lock().unwrap() += 1,
            DebugRecord::Frame(_) => {}
        })
        .build();

    socket.inject(text("not json"));
    socket.inject(text(r#"{"payload":1}"#));
    socket.inject(text(r#"{"cmd":"__errorReply","id":42,"payload":"late"}"#));
    socket.inject(Frame::Binary(Bytes::from_static(b"stray")));

    eventually(|| notices.lock().unwrap().len() >= 4).await;
    assert_eq!(*inbound.lock().unwrap(), 4);
    assert!(endpoint.is_open());
    assert!(socket.sent_frames().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_debug_sink_may_send_through_endpoint() -> Result<()> {
    // ---
    let (socket, _peer) = create_memory_socket_pair();
    let slot: Arc<Mutex<Option<Endpoint>>> = Arc::new(Mutex::new(None));
    let sink_slot = slot.clone();

    let endpoint = EndpointBuilder::new()
        .socket(socket.clone())
        .debug_sink(move |direction, record| {
            if direction != Direction::Outbound || !matches!(record, DebugRecord::Frame(_)) {
                return;
            }
            // Taken once, so the nested send does not recurse.
            let nested = sink_slot.lock().unwrap().take();
            if let Some(endpoint) = nested {
                endpoint.notify("nested", json!(null)).unwrap();
            }
        })
        .build();
    *slot.lock().unwrap() = Some(endpoint.clone());

    endpoint.notify("outer", json!(null))?;

    let cmds: Vec<String> = socket
        .sent_frames()
        .iter()
        .filter_map(|frame| match frame {
            Frame::Text(t) => Envelope::parse(t).and_then(|e| e.cmd),
            Frame::Binary(_) => None,
        })
        .collect();
    assert_eq!(cmds, vec!["outer".to_string(), "nested".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_destroy_on_close() {
    // ---
    let c = connected(EndpointConfig::default().with_destroy_on_close(true));
    let mut events = lifecycle_events(&c.client);

    c.server_socket.drop_connection(1011, "gone");

    loop {
        if let LifecycleEvent::Close(info) = next(&mut events).await {
            assert_eq!(info, CloseInfo::new(1011, "gone", false));
            break;
        }
    }
    assert_eq!(c.client.state(), EndpointState::Destroyed);
    assert_eq!(c.server.state(), EndpointState::BoundClosed);
}

#[tokio::test]
async fn test_socket_error_is_published() {
    // ---
    let c = connected(EndpointConfig::default());
    let mut events = lifecycle_events(&c.client);

    c.client_socket.fail("boom");

    loop {
        if let LifecycleEvent::Error(message) = next(&mut events).await {
            assert_eq!(message, "boom");
            break;
        }
    }
    assert!(c.client.is_open());
}

#[tokio::test]
async fn test_notify_waits_for_nothing() -> Result<()> {
    // ---
    let c = connected(EndpointConfig::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    c.server.on("log", move |reply, payload| {
        let _ = tx.send(payload);
        let _ = reply.ok(json!("ack"));
    })?;

    c.client.notify("log", json!("hi"))?;
    assert_eq!(c.client.pending_count(), 0);
    assert_eq!(next(&mut rx).await, json!("hi"));
    Ok(())
}

#[tokio::test]
async fn test_json_replacer_applies_to_outbound_envelopes() -> Result<()> {
    // ---
    let config = EndpointConfig::default().with_json_replacer(|key, value| match key {
        "secret" => None,
        _ => Some(value),
    });
    let c = connected(config);

    let (tx, mut rx) = mpsc::unbounded_channel();
    c.server.on("login", move |_reply, payload| {
        let _ = tx.send(payload);
    })?;

    c.client.notify("login", json!({ "user": "ada", "secret": "hunter2" }))?;
    assert_eq!(next(&mut rx).await, json!({ "user": "ada" }));
    Ok(())
}

#[tokio::test]
async fn test_binary_type_is_forwarded() {
    // ---
    let (socket, _peer) = create_memory_socket_pair();
    assert_eq!(socket.binary_type(), BinaryType::Buffer);

    let _endpoint = EndpointBuilder::new()
        .binary_type(BinaryType::ArrayBuffer)
        .socket(socket.clone())
        .build();
    assert_eq!(socket.binary_type(), BinaryType::ArrayBuffer);
}

#[cfg(feature = "logging")]
mod imp {
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }
}

#[cfg(not(feature = "logging"))]
mod imp {
    #[inline]
    pub fn init() {}
}

pub fn init_logging() {
    imp::init();
}
