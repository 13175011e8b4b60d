//! Wire value codec.
//!
//! Maps in-process [`Value`]s to [`WireValue`]s and back. Structured data
//! travels as `RAW`; everything else goes through the first registered
//! [`TransferHandler`] that claims it and travels as `HANDLER{name, value}`.
//!
//! Handlers may move endpoints to the receiver. Those ride in the
//! envelope's transfer list and the serialized form refers to them by
//! index, see [`EncodeContext::transfer`] and [`DecodeContext::take_transfer`].

mod handlers;
mod registry;

use serde::{Deserialize, Serialize};

use crate::peer::PeerContext;
#[allow(unused_imports)]
use crate::{
    // ---
    log_debug,
    Endpoint,
    EndpointPtr,
    MessageChannel,
    Peer,
    ProxyError,
    RemoteHandle,
    Result,
    ThrownValue,
    Value,
    WireKind,
    WireValue,
    THROW_HANDLER,
};

pub use handlers::{ErrorHandler, PortHandler, ProxyHandler};
pub use registry::{HandlerRegistry, ERROR_HANDLER, PORT_HANDLER, PROXY_HANDLER};

/// A named (serialize, deserialize) pair for values that are not
/// natively transmissible.
///
/// Both sides of a channel must register a handler under the same name for
/// a value to make the round trip.
pub trait TransferHandler: Send + Sync {
    /// True when this handler takes responsibility for `value`.
    fn can_handle(&self, value: &Value) -> bool;

    /// Produce the `value` field of the `HANDLER` wire value.
    fn serialize(&self, value: Value, ctx: &mut EncodeContext<'_>) -> Result<serde_json::Value>;

    /// Rebuild a value from the `value` field of a `HANDLER` wire value.
    fn deserialize(&self, wire: serde_json::Value, ctx: &mut DecodeContext<'_>) -> Result<Value>;
}

/// Serialized reference to an entry of the transfer list.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRef {
    pub transfer: usize,
}

impl TransferRef {
    // ---
    pub fn to_json(index: usize) -> serde_json::Value {
        serde_json::json!({ "transfer": index })
    }

    /// Read the index out of a handler payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidMessage`] if the payload is not a
    /// transfer reference.
    pub fn from_json(wire: serde_json::Value) -> Result<usize> {
        serde_json::from_value::<TransferRef>(wire)
            .map(|r| r.transfer)
            .map_err(|err| ProxyError::InvalidMessage(format!("bad transfer reference: {err}")))
    }
}

/// State accumulated while encoding the values of one outgoing message.
pub struct EncodeContext<'a> {
    // ---
    context: &'a PeerContext,
    transfer: Vec<EndpointPtr>,
    served: Vec<Peer>,
}

impl<'a> EncodeContext<'a> {
    // ---
    pub(crate) fn new(context: &'a PeerContext) -> Self {
        Self {
            context,
            transfer: Vec::new(),
            served: Vec::new(),
        }
    }

    /// Move `endpoint` to the receiver and return its transfer index.
    pub fn transfer(&mut self, endpoint: EndpointPtr) -> usize {
        self.transfer.push(endpoint);
        self.transfer.len() - 1
    }

    /// Serve `value` on a fresh channel and transfer the other end.
    ///
    /// The served value is held in the export table until the receiver
    /// releases it.
    pub fn serve(&mut self, value: Value) -> usize {
        // ---
        let (local, remote) = MessageChannel::new().into_ports();
        let peer = self.context.serve(value, local);
        self.served.push(peer);
        self.transfer(remote)
    }

    pub(crate) fn into_transfer(self) -> Vec<EndpointPtr> {
        self.transfer
    }

    /// Undo the side effects of a partial encode.
    ///
    /// Values served so far are withdrawn from the export table and their
    /// channels closed; nothing will ever be sent to release them.
    pub(crate) async fn abandon(self) {
        // ---
        for peer in self.served {
            log_debug!("{}: withdrawing export after failed encode", peer.endpoint_id());
            peer.close().await;
        }
    }
}

/// State for decoding the values of one incoming message.
///
/// Proxies and ports materialized while decoding are tracked until the
/// decoded values are [kept](Self::keep). A context finished without
/// keeping releases the proxies and closes the ports, so a failed
/// operation does not pin exports on the other side.
pub struct DecodeContext<'a> {
    // ---
    context: &'a PeerContext,
    transfer: Vec<Option<EndpointPtr>>,
    handles: Vec<RemoteHandle>,
    ports: Vec<EndpointPtr>,
    kept: bool,
}

impl<'a> DecodeContext<'a> {
    // ---
    pub(crate) fn new(context: &'a PeerContext, transfer: Vec<EndpointPtr>) -> Self {
        Self {
            context,
            transfer: transfer.into_iter().map(Some).collect(),
            handles: Vec::new(),
            ports: Vec::new(),
            kept: false,
        }
    }

    /// Claim the transferred endpoint at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidMessage`] if there is no such entry or
    /// it was already claimed.
    pub fn take_transfer(&mut self, index: usize) -> Result<EndpointPtr> {
        let endpoint = self.claim(index)?;
        self.ports.push(endpoint.clone());
        Ok(endpoint)
    }

    /// Claim the transferred endpoint at `index` and wrap it in a remote
    /// handle that shares this peer's configuration.
    pub fn wrap(&mut self, index: usize) -> Result<RemoteHandle> {
        // ---
        let endpoint = self.claim(index)?;
        let handle = self.context.wrap_materialized(endpoint);
        self.handles.push(handle.clone());
        Ok(handle)
    }

    fn claim(&mut self, index: usize) -> Result<EndpointPtr> {
        // ---
        let available = self.transfer.len();
        self.transfer
            .get_mut(index)
            .ok_or_else(|| {
                ProxyError::InvalidMessage(format!(
                    "transfer index {index} out of range ({available} transferred)"
                ))
            })?
            .take()
            .ok_or_else(|| {
                ProxyError::InvalidMessage(format!("transfer index {index} used more than once"))
            })
    }

    /// The decoded values reached their destination.
    pub(crate) fn keep(&mut self) {
        self.kept = true;
    }

    /// Settle everything this context materialized.
    ///
    /// Transfer entries nobody claimed are closed. Unless the values were
    /// kept, proxies are released and claimed ports closed too.
    pub(crate) async fn finish(self) {
        // ---
        for endpoint in self.transfer.into_iter().flatten() {
            log_debug!("{}: closing unclaimed transfer", endpoint.endpoint_id());
            close_quietly(&endpoint).await;
        }

        if self.kept {
            return;
        }

        for handle in self.handles {
            if let Err(_err) = handle.release().await {
                log_debug!("releasing undelivered proxy failed: {_err}");
            }
        }
        for endpoint in self.ports {
            log_debug!("{}: closing undelivered port", endpoint.endpoint_id());
            close_quietly(&endpoint).await;
        }
    }
}

async fn close_quietly(endpoint: &EndpointPtr) {
    if let Err(_err) = endpoint.close().await {
        log_debug!("{}: close failed: {_err}", endpoint.endpoint_id());
    }
}

/// Encode one value.
///
/// # Errors
///
/// Returns [`ProxyError::UnserializableValue`] if the value is not
/// structured data and no registered handler claims it.
pub fn encode(value: Value, ctx: &mut EncodeContext<'_>) -> Result<WireValue> {
    // ---
    if let Value::Raw(raw) = value {
        return Ok(WireValue::raw(raw));
    }

    let context = ctx.context;
    let Some((name, handler)) = context.handlers.find(&value) else {
        return Err(ProxyError::UnserializableValue(format!(
            "no transfer handler accepts a {}",
            value.kind()
        )));
    };

    let serialized = handler.serialize(value, ctx)?;
    Ok(WireValue::handler(name, serialized))
}

/// Decode one wire value.
///
/// A thrown outcome decodes to `Err(`[`ProxyError::RemoteThrow`]`)`
/// whatever handlers are registered; the `throw` name never reaches the
/// registry.
///
/// # Errors
///
/// Returns [`ProxyError::UnknownHandler`] if the payload names a handler
/// that is not registered on this side.
pub fn decode(wire: WireValue, ctx: &mut DecodeContext<'_>) -> Result<Value> {
    // ---
    match wire.kind {
        WireKind::Raw { value } => Ok(Value::Raw(value)),
        WireKind::Handler { name, value } if name == THROW_HANDLER => {
            Err(ProxyError::RemoteThrow(ThrownValue::from_wire(value)?))
        }
        WireKind::Handler { name, value } => {
            let context = ctx.context;
            let handler = context
                .handlers
                .get(&name)
                .ok_or(ProxyError::UnknownHandler(name))?;
            handler.deserialize(value, ctx)
        }
    }
}

/// Encode a thrown outcome as a `throw` handler value.
pub fn encode_thrown(thrown: &ThrownValue) -> WireValue {
    WireValue::handler(THROW_HANDLER, thrown.to_wire())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{ErrorValue, Function, Object};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_raw_passes_through() {
        // ---
        let context = PeerContext::default();
        let data = json!({"user": {"name": "Ada", "tags": [1, 2, null]}});

        let mut enc = EncodeContext::new(&context);
        let wire = encode(Value::from(data.clone()), &mut enc).unwrap();
        assert_eq!(wire, WireValue::raw(data.clone()));
        assert!(enc.into_transfer().is_empty());

        let mut dec = DecodeContext::new(&context, Vec::new());
        assert_eq!(decode(wire, &mut dec).unwrap().as_raw(), Some(&data));
    }

    #[test]
    fn test_error_value_uses_error_handler() {
        // ---
        let context = PeerContext::default();
        let err = ErrorValue::new("bad").with_name("RangeError");

        let mut enc = EncodeContext::new(&context);
        let wire = encode(Value::from(err.clone()), &mut enc).unwrap();
        assert_eq!(
            wire,
            WireValue::handler(ERROR_HANDLER, json!({"name": "RangeError", "message": "bad"}))
        );

        let mut dec = DecodeContext::new(&context, Vec::new());
        match decode(wire, &mut dec).unwrap() {
            Value::Error(back) => assert_eq!(back, err),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_thrown_decodes_to_remote_throw() {
        // ---
        let context = PeerContext::default();
        let wire = encode_thrown(&ThrownValue::error("boom"));
        assert!(wire.is_thrown());

        let mut dec = DecodeContext::new(&context, Vec::new());
        match decode(wire, &mut dec) {
            Err(ProxyError::RemoteThrow(thrown)) => assert_eq!(thrown.message(), "boom"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_thrown_decodes_without_registered_handlers() {
        // ---
        let context = PeerContext {
            handlers: Arc::new(HandlerRegistry::empty()),
            ..PeerContext::default()
        };
        let mut dec = DecodeContext::new(&context, Vec::new());
        match decode(encode_thrown(&ThrownValue::error("boom")), &mut dec) {
            Err(ProxyError::RemoteThrow(thrown)) => assert_eq!(thrown.message(), "boom"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_handler_is_reported() {
        // ---
        let context = PeerContext::default();
        let mut dec = DecodeContext::new(&context, Vec::new());
        let err = decode(WireValue::handler("promise", json!(1)), &mut dec).unwrap_err();
        assert!(matches!(err, ProxyError::UnknownHandler(name) if name == "promise"));
    }

    #[test]
    fn test_unclaimed_value_is_unserializable() {
        // ---
        let context = PeerContext {
            handlers: Arc::new(HandlerRegistry::empty()),
            ..PeerContext::default()
        };
        let mut enc = EncodeContext::new(&context);
        let err = encode(Value::from(ErrorValue::new("x")), &mut enc).unwrap_err();
        assert!(matches!(err, ProxyError::UnserializableValue(_)));
    }

    #[tokio::test]
    async fn test_object_is_served_and_transferred() {
        // ---
        let context = PeerContext::default();
        let mut enc = EncodeContext::new(&context);

        let wire = encode(Value::from(Object::new().with("n", 1)), &mut enc).unwrap();
        assert_eq!(wire, WireValue::handler(PROXY_HANDLER, json!({"transfer": 0})));
        assert_eq!(context.exports.len(), 1);

        let transfer = enc.into_transfer();
        assert_eq!(transfer.len(), 1);

        let mut dec = DecodeContext::new(&context, transfer);
        let handle = decode(wire, &mut dec).unwrap().into_proxy().unwrap();
        assert_eq!(handle.prop("n").get().await.unwrap().as_raw(), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_abandon_withdraws_exports() {
        // ---
        let context = PeerContext::default();
        let mut enc = EncodeContext::new(&context);
        let f = Function::new(|_args| async { Ok(Value::undefined()) });
        encode(Value::from(f), &mut enc).unwrap();
        assert_eq!(context.exports.len(), 1);

        enc.abandon().await;
        assert!(context.exports.is_empty());
    }

    #[test]
    fn test_transfer_used_once() {
        // ---
        let context = PeerContext::default();
        let (a, _b) = MessageChannel::new().into_ports();
        let mut dec = DecodeContext::new(&context, vec![a]);

        assert!(dec.take_transfer(0).is_ok());
        assert!(matches!(
            dec.take_transfer(0),
            Err(ProxyError::InvalidMessage(_))
        ));
        assert!(matches!(
            dec.take_transfer(3),
            Err(ProxyError::InvalidMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_finish_without_keep_releases_proxies() {
        // ---
        let context = PeerContext::default();
        let mut enc = EncodeContext::new(&context);
        let f = Function::new(|_args| async { Ok(Value::undefined()) });
        let wire = encode(Value::from(f), &mut enc).unwrap();
        assert_eq!(context.exports.len(), 1);

        let mut dec = DecodeContext::new(&context, enc.into_transfer());
        let handle = decode(wire, &mut dec).unwrap().into_proxy().unwrap();
        dec.finish().await;
        assert!(handle.is_released());

        for _ in 0..100 {
            if context.exports.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(context.exports.is_empty());
    }

    #[tokio::test]
    async fn test_finish_after_keep_leaves_values_alone() {
        // ---
        let context = PeerContext::default();
        let mut enc = EncodeContext::new(&context);
        let wire = encode(Value::from(Object::new().with("n", 1)), &mut enc).unwrap();

        let mut dec = DecodeContext::new(&context, enc.into_transfer());
        let handle = decode(wire, &mut dec).unwrap().into_proxy().unwrap();
        dec.keep();
        dec.finish().await;

        assert!(!handle.is_released());
        assert_eq!(handle.prop("n").get().await.unwrap().as_raw(), Some(&json!(1)));
        assert_eq!(context.exports.len(), 1);
    }

    #[tokio::test]
    async fn test_finish_closes_unclaimed_transfer() {
        // ---
        let context = PeerContext::default();
        let (a, b) = MessageChannel::new().into_ports();

        let mut dec = DecodeContext::new(&context, vec![a]);
        dec.keep();
        dec.finish().await;

        let late = b
            .post_message(crate::Envelope::new(bytes::Bytes::from_static(b"late")))
            .await;
        assert!(matches!(late, Err(ProxyError::EndpointClosed)));
    }
}
