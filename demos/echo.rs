use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use socket_rpc::{create_memory_socket_pair, Endpoint, EndpointBuilder, EndpointConfig, Error, Result};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct AddRequest {
    a: i32,
    b: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddResponse {
    sum: i32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    env_logger::init();

    let (left, right) = create_memory_socket_pair();

    let server = Endpoint::with_socket(right, EndpointConfig::default());
    let client = EndpointBuilder::new()
        .socket(left)
        .request_timeout(Duration::from_millis(500))
        .build();

    server.on("echo", |reply, payload| {
        let _ = reply.ok(payload);
    })?;

    server.on("add", |reply, payload| {
        let _ = reply.deferred(async move {
            let req: AddRequest = serde_json::from_value(payload)?;
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, Error>(serde_json::to_value(AddResponse { sum: req.a + req.b })?)
        });
    })?;

    server.on("thumbnail", |reply, _payload| {
        let _ = reply.ok(Bytes::from_static(&[0x89, b'P', b'N', b'G']));
    })?;

    if let Some(pending) = client.send("echo", json!({ "hello": "world" }))? {
        println!("echo -> {:?}", pending.await?.json());
    }

    let resp: AddResponse = client.request("add", AddRequest { a: 20, b: 3 }).await?;
    println!("20 + 3 = {}", resp.sum);

    if let Some(pending) = client.send("thumbnail", json!(null))? {
        let image = pending.await?;
        println!("thumbnail -> {} bytes", image.bytes().map_or(0, |b| b.len()));
    }

    match client.send("missing", json!(null))? {
        Some(pending) => println!("missing -> {:?}", pending.await.err()),
        None => println!("missing -> not sent"),
    }

    client.destroy();
    server.destroy();
    Ok(())
}
