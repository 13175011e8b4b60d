// tests/wire_protocol.rs
//
// Drives an exposed peer with hand-written JSON, the way a peer written
// against the same protocol in another runtime would.

use bytes::Bytes;
use serde_json::{json, Value as Json};
use tokio::time::{timeout, Duration};

use peerlink::{
    // ---
    expose,
    EndpointPtr,
    Envelope,
    Function,
    MessageChannel,
    Object,
    Peer,
    SubscriptionHandle,
    ThrownValue,
    Value,
};

struct RawCaller {
    // ---
    port: EndpointPtr,
    sub: SubscriptionHandle,
    server: Peer,
}

impl RawCaller {
    // ---
    async fn connect() -> Self {
        // ---
        let (port, worker_end) = MessageChannel::new().into_ports();

        let add = Function::new(|args: Vec<Value>| async move {
            let sum: i64 = args.iter().filter_map(|v| v.as_raw()?.as_i64()).sum();
            Ok(Value::from(sum))
        });
        let fail = Function::new(|_args| async { Err(ThrownValue::error("boom")) });
        let root = Object::new()
            .with("user", json!({"name": "Ada"}))
            .with("add", add)
            .with("fail", fail);

        let server = expose(Value::from(root), worker_end).expect("expose failed");

        let sub = port.subscribe().await.expect("subscribe failed");
        port.start();

        Self { port, sub, server }
    }

    async fn send(&self, message: Json) {
        let payload = Bytes::from(message.to_string());
        self.port
            .post_message(Envelope::new(payload))
            .await
            .expect("post failed");
    }

    async fn send_text(&self, text: &'static str) {
        self.port
            .post_message(Envelope::new(Bytes::from_static(text.as_bytes())))
            .await
            .expect("post failed");
    }

    async fn recv(&mut self) -> Json {
        // ---
        let env = timeout(Duration::from_millis(500), self.sub.inbox.recv())
            .await
            .expect("timed out waiting for response")
            .expect("channel closed unexpectedly");
        serde_json::from_slice(&env.payload).expect("response is not JSON")
    }
}

#[tokio::test]
async fn wire_get_answers_raw() {
    // ---
    let mut caller = RawCaller::connect().await;

    caller
        .send(json!({"id": "a", "type": "GET", "path": ["user", "name"]}))
        .await;

    assert_eq!(
        caller.recv().await,
        json!({"id": "a", "type": "RAW", "value": "Ada"})
    );
}

#[tokio::test]
async fn wire_apply_answers_raw() {
    // ---
    let mut caller = RawCaller::connect().await;

    caller
        .send(json!({
            "id": "b",
            "type": "APPLY",
            "path": ["add"],
            "argumentList": [
                {"type": "RAW", "value": 2},
                {"type": "RAW", "value": 3}
            ]
        }))
        .await;

    assert_eq!(
        caller.recv().await,
        json!({"id": "b", "type": "RAW", "value": 5})
    );
}

#[tokio::test]
async fn wire_throw_is_tagged_handler_response() {
    // ---
    let mut caller = RawCaller::connect().await;

    caller
        .send(json!({"id": "c", "type": "APPLY", "path": ["fail"], "argumentList": []}))
        .await;

    assert_eq!(
        caller.recv().await,
        json!({
            "id": "c",
            "type": "HANDLER",
            "name": "throw",
            "value": {"isError": true, "value": {"message": "boom", "name": "Error"}}
        })
    );
}

#[tokio::test]
async fn wire_set_acknowledges_true() {
    // ---
    let mut caller = RawCaller::connect().await;

    caller
        .send(json!({
            "id": "s",
            "type": "SET",
            "path": ["user", "name"],
            "value": {"type": "RAW", "value": "Grace"}
        }))
        .await;
    assert_eq!(
        caller.recv().await,
        json!({"id": "s", "type": "RAW", "value": true})
    );

    caller
        .send(json!({"id": "g", "type": "GET", "path": ["user", "name"]}))
        .await;
    assert_eq!(
        caller.recv().await,
        json!({"id": "g", "type": "RAW", "value": "Grace"})
    );
}

#[tokio::test]
async fn wire_garbage_does_not_stop_the_peer() {
    // ---
    let mut caller = RawCaller::connect().await;

    caller.send_text("not json at all").await;
    caller.send(json!({"id": "x", "type": "BOGUS"})).await;
    caller.send(json!({"id": "y", "path": []})).await;
    // A response nobody asked for.
    caller.send(json!({"id": "zzz", "type": "RAW", "value": 1})).await;

    caller
        .send(json!({"id": "ok", "type": "GET", "path": ["user", "name"]}))
        .await;
    assert_eq!(
        caller.recv().await,
        json!({"id": "ok", "type": "RAW", "value": "Ada"})
    );
}

#[tokio::test]
async fn wire_double_release_is_harmless() {
    // ---
    let mut caller = RawCaller::connect().await;
    assert_eq!(caller.server.exports().len(), 1);

    caller.send(json!({"id": "r1", "type": "RELEASE"})).await;
    caller.send(json!({"id": "r2", "type": "RELEASE"})).await;

    let ack = caller.recv().await;
    assert_eq!(ack["type"], "RAW");
    assert_eq!(ack["value"], Json::Null);

    for _ in 0..100 {
        if caller.server.exports().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(caller.server.exports().is_empty());
    assert!(caller.server.is_released());
}
