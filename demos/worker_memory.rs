// A "worker" exposing a small API on one end of an in-memory channel, and a
// caller driving it through a remote handle.
//
//   RUST_LOG=peerlink=debug cargo run --example worker_memory

use peerlink::{expose, wrap, Function, MessageChannel, Object, Result, ThrownValue, Value};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_ansi(false)
        .init();

    let (caller_end, worker_end) = MessageChannel::new().into_ports();

    let add = Function::new(|args: Vec<Value>| async move {
        let sum: i64 = args.iter().filter_map(|v| v.as_raw()?.as_i64()).sum();
        Ok(Value::from(sum))
    });
    let notify = Function::new(|args: Vec<Value>| async move {
        let callback = args
            .into_iter()
            .next()
            .and_then(Value::into_proxy)
            .ok_or_else(|| ThrownValue::type_error("notify expects a callback"))?;
        callback.apply(vec![Value::from("job finished")]).await?;
        callback.release().await?;
        Ok(Value::undefined())
    });

    let api = Object::new()
        .with("user", json!({"name": "Ada"}))
        .with("add", add)
        .with("notify", notify);
    let _worker = expose(Value::from(api), worker_end)?;

    let remote = wrap(caller_end)?;

    let name: String = remote.prop("user").prop("name").get_as().await?;
    println!("user.name = {name}");

    let sum: i64 = remote
        .prop("add")
        .call(vec![Value::from(20), Value::from(3)])
        .await?;
    println!("20 + 3 = {sum}");

    let on_done = Function::new(|args: Vec<Value>| async move {
        println!("worker says: {:?}", args.first());
        Ok(Value::undefined())
    });
    remote.prop("notify").apply(vec![Value::from(on_done)]).await?;

    remote.release().await?;
    Ok(())
}
